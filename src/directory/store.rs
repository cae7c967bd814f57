//! In-memory directory store.

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::debug;

use super::{
    error::DirectoryError,
    model::{Class, Id, Person, Role, School},
};

#[derive(Debug, Default)]
struct Tables {
    schools: BTreeMap<Id, School>,
    classes: BTreeMap<Id, Class>,
    persons: BTreeMap<Id, Person>,
}

fn next_id<T>(table: &BTreeMap<Id, T>) -> Id {
    table.keys().next_back().map_or(1, |last| last + 1)
}

fn require_name(name: &str, err: DirectoryError) -> Result<&str, DirectoryError> {
    let name = name.trim();
    if name.is_empty() { Err(err) } else { Ok(name) }
}

/// Schools, classes and persons held in memory behind one lock.
///
/// Creating a school or class that matches an existing record returns the
/// existing id instead of inserting a duplicate.
#[derive(Debug, Default)]
pub struct Directory {
    tables: RwLock<Tables>,
}

impl Directory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a school, or return the id of the school with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidSchool`] if `name` is blank.
    pub fn create_school(&self, name: &str) -> Result<Id, DirectoryError> {
        let name = require_name(name, DirectoryError::InvalidSchool)?;
        let mut tables = self.write();
        if let Some(existing) = tables.schools.values().find(|school| school.name == name) {
            return Ok(existing.id);
        }
        let id = next_id(&tables.schools);
        tables.schools.insert(
            id,
            School {
                id,
                name: name.to_owned(),
            },
        );
        debug!("school created: id={id}, name={name}");
        Ok(id)
    }

    /// All schools ordered by id.
    #[must_use]
    pub fn schools(&self) -> Vec<School> { self.read().schools.values().cloned().collect() }

    /// Create a class taught by `teacher_id` in `school_id`, or return the id
    /// of an identical class.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidClass`] if `name` is blank,
    /// [`DirectoryError::InvalidSchool`] if the school does not exist, and
    /// [`DirectoryError::InvalidPerson`] if `teacher_id` is not a teacher of
    /// that school.
    pub fn create_class(&self, name: &str, school_id: Id, teacher_id: Id) -> Result<Id, DirectoryError> {
        let name = require_name(name, DirectoryError::InvalidClass)?;
        let mut tables = self.write();
        if !tables.schools.contains_key(&school_id) {
            return Err(DirectoryError::InvalidSchool);
        }
        match tables.persons.get(&teacher_id) {
            Some(person) if person.role == Role::Teacher && person.school_id == school_id => {}
            _ => return Err(DirectoryError::InvalidPerson),
        }
        if let Some(existing) = tables.classes.values().find(|class| {
            class.name == name && class.school_id == school_id && class.teacher_id == teacher_id
        }) {
            return Ok(existing.id);
        }

        let id = next_id(&tables.classes);
        tables.classes.insert(
            id,
            Class {
                id,
                name: name.to_owned(),
                school_id,
                teacher_id,
                student_ids: Vec::new(),
            },
        );
        if let Some(teacher) = tables.persons.get_mut(&teacher_id) {
            teacher.class_ids.push(id);
        }
        debug!("class created: id={id}, school_id={school_id}, teacher_id={teacher_id}");
        Ok(id)
    }

    /// All classes ordered by id.
    #[must_use]
    pub fn classes(&self) -> Vec<Class> { self.read().classes.values().cloned().collect() }

    /// Create a person in `school_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidPerson`] if `name` is blank and
    /// [`DirectoryError::InvalidSchool`] if the school does not exist.
    pub fn create_person(&self, name: &str, role: Role, school_id: Id) -> Result<Id, DirectoryError> {
        let name = require_name(name, DirectoryError::InvalidPerson)?;
        let mut tables = self.write();
        if !tables.schools.contains_key(&school_id) {
            return Err(DirectoryError::InvalidSchool);
        }
        let id = next_id(&tables.persons);
        tables.persons.insert(
            id,
            Person {
                id,
                name: name.to_owned(),
                role,
                school_id,
                class_ids: Vec::new(),
            },
        );
        debug!("person created: id={id}, role={role:?}, school_id={school_id}");
        Ok(id)
    }

    /// All persons ordered by id.
    #[must_use]
    pub fn persons(&self) -> Vec<Person> { self.read().persons.values().cloned().collect() }

    /// Look up one person.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if no person has `person_id`.
    pub fn person(&self, person_id: Id) -> Result<Person, DirectoryError> {
        self.read()
            .persons
            .get(&person_id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    /// Enrol a student in a class of their school. Enrolling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidClass`] if the class does not exist
    /// and [`DirectoryError::InvalidPerson`] if `student_id` is not a student
    /// of the class's school.
    pub fn add_student_to_class(&self, class_id: Id, student_id: Id) -> Result<(), DirectoryError> {
        let mut tables = self.write();
        let Tables {
            classes, persons, ..
        } = &mut *tables;
        let class = classes
            .get_mut(&class_id)
            .ok_or(DirectoryError::InvalidClass)?;
        let student = match persons.get_mut(&student_id) {
            Some(person) if person.role == Role::Student && person.school_id == class.school_id => {
                person
            }
            _ => return Err(DirectoryError::InvalidPerson),
        };
        if !class.student_ids.contains(&student_id) {
            class.student_ids.push(student_id);
            student.class_ids.push(class_id);
            debug!("student enrolled: class_id={class_id}, student_id={student_id}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    /// One school with a teacher (id 1) and a student (id 2).
    #[fixture]
    fn directory() -> Directory {
        let directory = Directory::new();
        let school = directory.create_school("Elm Street").expect("school");
        directory
            .create_person("Ms Frizzle", Role::Teacher, school)
            .expect("teacher");
        directory
            .create_person("Arnold", Role::Student, school)
            .expect("student");
        directory
    }

    #[test]
    fn ids_start_at_one() {
        let directory = Directory::new();
        assert_eq!(directory.create_school("A"), Ok(1));
        assert_eq!(directory.create_school("B"), Ok(2));
    }

    #[test]
    fn duplicate_school_returns_existing_id() {
        let directory = Directory::new();
        let first = directory.create_school("Elm").expect("create");
        assert_eq!(directory.create_school(" Elm "), Ok(first));
        assert_eq!(directory.schools().len(), 1);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_school_name_is_invalid(#[case] name: &str) {
        assert_eq!(
            Directory::new().create_school(name),
            Err(DirectoryError::InvalidSchool)
        );
    }

    #[rstest]
    fn class_requires_teacher_of_same_school(directory: Directory) {
        assert_eq!(
            directory.create_class("Science", 1, 2),
            Err(DirectoryError::InvalidPerson)
        );
        assert_eq!(
            directory.create_class("Science", 9, 1),
            Err(DirectoryError::InvalidSchool)
        );
        let class = directory.create_class("Science", 1, 1).expect("class");
        assert_eq!(directory.create_class("Science", 1, 1), Ok(class));
        assert_eq!(directory.person(1).expect("teacher").class_ids, vec![class]);
    }

    #[rstest]
    fn person_requires_existing_school(directory: Directory) {
        assert_eq!(
            directory.create_person("Wanda", Role::Student, 7),
            Err(DirectoryError::InvalidSchool)
        );
        assert_eq!(directory.persons().len(), 2);
    }

    #[rstest]
    fn unknown_person_is_not_found(directory: Directory) {
        assert_eq!(directory.person(42), Err(DirectoryError::NotFound));
    }

    #[rstest]
    fn enrolment_links_both_sides_once(directory: Directory) {
        let class = directory.create_class("Science", 1, 1).expect("class");
        directory.add_student_to_class(class, 2).expect("enrol");
        directory.add_student_to_class(class, 2).expect("enrol again");

        let classes = directory.classes();
        assert_eq!(classes.first().map(|c| c.student_ids.clone()), Some(vec![2]));
        assert_eq!(directory.person(2).expect("student").class_ids, vec![class]);
    }

    #[rstest]
    fn enrolment_checks_references(directory: Directory) {
        let class = directory.create_class("Science", 1, 1).expect("class");
        assert_eq!(
            directory.add_student_to_class(99, 2),
            Err(DirectoryError::InvalidClass)
        );
        assert_eq!(
            directory.add_student_to_class(class, 1),
            Err(DirectoryError::InvalidPerson)
        );
        assert_eq!(
            directory.add_student_to_class(class, 99),
            Err(DirectoryError::InvalidPerson)
        );
    }
}
