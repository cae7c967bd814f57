//! Request handlers exposing the directory over the router.

use std::{future::ready, sync::Arc};

use serde::{
    Serialize,
    de::{DeserializeOwned, IgnoredAny},
};

use super::{
    Directory,
    error::DirectoryError,
    model::{AddStudentToClass, CreateClass, CreatePerson, CreateSchool, WhoAmI},
};
use crate::{
    context::Context,
    message::Payload,
    router::{HandlerResult, Router},
};

pub const CREATE_SCHOOL: &str = "create_school";
pub const LIST_SCHOOLS: &str = "list_schools";
pub const CREATE_CLASS: &str = "create_class";
pub const LIST_CLASSES: &str = "list_classes";
pub const CREATE_PERSON: &str = "create_person";
pub const LIST_PERSONS: &str = "list_persons";
pub const WHO_AM_I: &str = "who_am_i";
pub const ADD_STUDENT_TO_CLASS: &str = "add_student_to_class";

/// Earlier spelling of [`CREATE_SCHOOL`], still accepted from older clients.
pub const CREAT_SCHOOL: &str = "creat_school";
/// Earlier spelling of [`CREATE_CLASS`], still accepted from older clients.
pub const CREAT_CLASS: &str = "creat_class";
/// Earlier spelling of [`CREATE_PERSON`], still accepted from older clients.
pub const CREAT_PERSON: &str = "creat_person";

/// Data returned by a successful `add_student_to_class`.
pub const STUDENT_ADDED_MESSAGE: &str = "student added to class successfully";

/// Register every directory request type on `router`.
///
/// The `create_*` handlers are also registered under their `creat_*`
/// spellings.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use wireline::{
///     directory::{Directory, register_handlers},
///     router::Router,
/// };
///
/// let router = Router::new();
/// register_handlers(&router, &Arc::new(Directory::new()));
/// assert!(router.contains("who_am_i"));
/// ```
pub fn register_handlers(router: &Router, directory: &Arc<Directory>) {
    route(router, directory, &[CREATE_SCHOOL, CREAT_SCHOOL], |dir, req: CreateSchool| {
        dir.create_school(&req.name)
    });
    route(router, directory, &[LIST_SCHOOLS], |dir, _: IgnoredAny| {
        Ok(dir.schools())
    });
    route(router, directory, &[CREATE_CLASS, CREAT_CLASS], |dir, req: CreateClass| {
        dir.create_class(&req.name, req.school_id, req.teacher_id)
    });
    route(router, directory, &[LIST_CLASSES], |dir, _: IgnoredAny| {
        Ok(dir.classes())
    });
    route(router, directory, &[CREATE_PERSON, CREAT_PERSON], |dir, req: CreatePerson| {
        dir.create_person(&req.name, req.role, req.school_id)
    });
    route(router, directory, &[LIST_PERSONS], |dir, _: IgnoredAny| {
        Ok(dir.persons())
    });
    route(router, directory, &[WHO_AM_I], |dir, req: WhoAmI| dir.person(req.person_id));
    route(
        router,
        directory,
        &[ADD_STUDENT_TO_CLASS],
        |dir, req: AddStudentToClass| {
            dir.add_student_to_class(req.class_id, req.student_id)
                .map(|()| STUDENT_ADDED_MESSAGE)
        },
    );
}

/// Register a synchronous directory operation as a handler for each of
/// `request_types`.
///
/// The payload is decoded into `Req` and the result serialized as the
/// response data. Decode failures and [`DirectoryError`]s become the failure
/// message.
fn route<Req, Res, F>(router: &Router, directory: &Arc<Directory>, request_types: &[&str], op: F)
where
    Req: DeserializeOwned + 'static,
    Res: Serialize + 'static,
    F: Fn(&Directory, Req) -> Result<Res, DirectoryError> + Send + Sync + 'static,
{
    let op = Arc::new(op);
    for request_type in request_types {
        let directory = Arc::clone(directory);
        let op = Arc::clone(&op);
        router.register(*request_type, move |ctx: Context, payload: Payload| {
            ready(invoke(&directory, &*op, &ctx, &payload))
        });
    }
}

fn invoke<Req, Res, F>(directory: &Directory, op: &F, ctx: &Context, payload: &Payload) -> HandlerResult
where
    Req: DeserializeOwned,
    Res: Serialize,
    F: Fn(&Directory, Req) -> Result<Res, DirectoryError>,
{
    if let Some(reason) = ctx.err() {
        return Err(reason.into());
    }
    let request: Req = payload.decode()?;
    let result = op(directory, request)?;
    Ok(serde_json::to_value(result)?)
}
