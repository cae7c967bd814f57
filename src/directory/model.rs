//! Directory records and request payloads.

use serde::{Deserialize, Serialize};

/// Identifier of a school, class or person. Each table numbers from 1.
pub type Id = u64;

/// Role a person holds in their school.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Enrolled in classes.
    Student,
    /// Leads classes.
    Teacher,
}

/// A school.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: Id,
    pub name: String,
}

/// A class taught by one teacher in one school.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: Id,
    pub name: String,
    pub school_id: Id,
    pub teacher_id: Id,
    #[serde(default)]
    pub student_ids: Vec<Id>,
}

/// A student or teacher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Id,
    pub name: String,
    pub role: Role,
    pub school_id: Id,
    /// Classes the person attends or teaches.
    #[serde(default)]
    pub class_ids: Vec<Id>,
}

/// Payload of `create_school`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSchool {
    pub name: String,
}

/// Payload of `create_class`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClass {
    pub name: String,
    pub school_id: Id,
    pub teacher_id: Id,
}

/// Payload of `create_person`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePerson {
    pub name: String,
    pub role: Role,
    pub school_id: Id,
}

/// Payload of `who_am_i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmI {
    pub person_id: Id,
}

/// Payload of `add_student_to_class`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStudentToClass {
    pub class_id: Id,
    pub student_id: Id,
}
