//! School directory served by the bundled binary.
//!
//! An in-memory [`Directory`] of schools, classes and persons, and
//! [`register_handlers`] to expose it through a [`Router`](crate::router::Router).

pub mod error;
mod handlers;
pub mod model;
mod store;

pub use error::DirectoryError;
pub use handlers::{
    ADD_STUDENT_TO_CLASS,
    CREAT_CLASS,
    CREAT_PERSON,
    CREAT_SCHOOL,
    CREATE_CLASS,
    CREATE_PERSON,
    CREATE_SCHOOL,
    LIST_CLASSES,
    LIST_PERSONS,
    LIST_SCHOOLS,
    STUDENT_ADDED_MESSAGE,
    WHO_AM_I,
    register_handlers,
};
pub use store::Directory;
