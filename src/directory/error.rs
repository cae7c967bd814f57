//! Errors raised by directory operations.

use thiserror::Error;

/// Directory operation failures. The display text is sent to clients as the
/// response message.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The requested record does not exist.
    #[error("entity not found")]
    NotFound,
    /// A school name was empty or a school reference did not resolve.
    #[error("invalid school")]
    InvalidSchool,
    /// A class name was empty or a class reference did not resolve.
    #[error("invalid class")]
    InvalidClass,
    /// A person name was empty, or a person reference did not resolve to
    /// someone with the required role in the required school.
    #[error("invalid person")]
    InvalidPerson,
}
