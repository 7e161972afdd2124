use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::domain::{
    Course, CourseId, CourseOffering, Department, DepartmentId, OfferingId, Program, ProgramId,
    Semester, SemesterId,
};
use crate::store::Store;
use crate::workflows::WorkflowError;

/// Departments, programs, semesters, courses, and their offerings.
pub struct CatalogService {
    store: Arc<Store>,
}

impl CatalogService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn add_department(&self, code: &str, name: &str) -> Result<Department, WorkflowError> {
        let code = normalize_code(code, "department")?;
        let name = required(name, "department name")?;

        self.store.departments.mutate_all(|rows| {
            if rows.values().any(|department| department.code == code) {
                return Err(WorkflowError::conflict(format!(
                    "department code {code} is already in use"
                )));
            }
            let department = Department {
                id: DepartmentId(self.store.departments.next_key()),
                code: code.clone(),
                name,
            };
            rows.insert(department.id.clone(), department.clone());
            info!(department_id = %department.id, code = %department.code, "department added");
            Ok(department)
        })
    }

    pub fn add_program(
        &self,
        code: &str,
        name: &str,
        department_id: &DepartmentId,
    ) -> Result<Program, WorkflowError> {
        let code = normalize_code(code, "program")?;
        let name = required(name, "program name")?;
        self.store.departments.require(department_id)?;

        self.store.programs.mutate_all(|rows| {
            if rows.values().any(|program| program.code == code) {
                return Err(WorkflowError::conflict(format!(
                    "program code {code} is already in use"
                )));
            }
            let program = Program {
                id: ProgramId(self.store.programs.next_key()),
                code: code.clone(),
                name,
                department_id: department_id.clone(),
            };
            rows.insert(program.id.clone(), program.clone());
            info!(program_id = %program.id, code = %program.code, "program added");
            Ok(program)
        })
    }

    /// New semesters start inactive; see [`CatalogService::activate_semester`].
    pub fn add_semester(
        &self,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<Semester, WorkflowError> {
        let name = required(name, "semester name")?;
        if ends_on <= starts_on {
            return Err(WorkflowError::bad_request(format!(
                "semester must end after it starts ({starts_on} .. {ends_on})"
            )));
        }

        let semester = Semester {
            id: SemesterId(self.store.semesters.next_key()),
            name,
            starts_on,
            ends_on,
            is_active: false,
        };
        self.store
            .semesters
            .insert(semester.id.clone(), semester.clone());
        info!(semester_id = %semester.id, "semester added");
        Ok(semester)
    }

    /// Makes `id` the only active semester. Every flag flips under one write
    /// lock, so no reader ever sees two active semesters or a gap where the
    /// old one was cleared but the new one not yet set.
    pub fn activate_semester(&self, id: &SemesterId) -> Result<Semester, WorkflowError> {
        self.store.semesters.mutate_all(|rows| {
            if !rows.contains_key(id) {
                return Err(WorkflowError::not_found("semester", id));
            }
            for semester in rows.values_mut() {
                semester.is_active = &semester.id == id;
            }
            let activated = rows
                .get(id)
                .cloned()
                .ok_or_else(|| WorkflowError::not_found("semester", id))?;
            info!(semester_id = %id, "semester activated");
            Ok(activated)
        })
    }

    pub fn active_semester(&self) -> Option<Semester> {
        self.store.semesters.find(|semester| semester.is_active)
    }

    pub fn add_course(
        &self,
        code: &str,
        title: &str,
        credit_hours: u8,
    ) -> Result<Course, WorkflowError> {
        let code = normalize_code(code, "course")?;
        let title = required(title, "course title")?;
        if credit_hours == 0 {
            return Err(WorkflowError::bad_request(format!(
                "course {code} must carry at least one credit hour"
            )));
        }

        self.store.courses.mutate_all(|rows| {
            if rows.values().any(|course| course.code == code) {
                return Err(WorkflowError::conflict(format!(
                    "course code {code} is already in use"
                )));
            }
            let course = Course {
                id: CourseId(self.store.courses.next_key()),
                code: code.clone(),
                title,
                credit_hours,
            };
            rows.insert(course.id.clone(), course.clone());
            info!(course_id = %course.id, code = %course.code, "course added");
            Ok(course)
        })
    }

    pub fn add_offering(
        &self,
        course_id: &CourseId,
        semester_id: &SemesterId,
        capacity: u32,
        instructor_id: Option<&str>,
    ) -> Result<CourseOffering, WorkflowError> {
        let course = self.store.courses.require(course_id)?;
        self.store.semesters.require(semester_id)?;
        if capacity == 0 {
            return Err(WorkflowError::bad_request(format!(
                "an offering of {} needs at least one seat",
                course.code
            )));
        }

        let offering = CourseOffering {
            id: OfferingId(self.store.offerings.next_key()),
            course_id: course_id.clone(),
            semester_id: semester_id.clone(),
            capacity,
            instructor_id: instructor_id
                .map(str::trim)
                .filter(|instructor| !instructor.is_empty())
                .map(str::to_string),
        };
        self.store
            .offerings
            .insert(offering.id.clone(), offering.clone());
        info!(offering_id = %offering.id, course = %course.code, capacity, "offering added");
        Ok(offering)
    }

    pub fn department(&self, id: &DepartmentId) -> Result<Department, WorkflowError> {
        self.store.departments.require(id)
    }

    pub fn program(&self, id: &ProgramId) -> Result<Program, WorkflowError> {
        self.store.programs.require(id)
    }

    pub fn course(&self, id: &CourseId) -> Result<Course, WorkflowError> {
        self.store.courses.require(id)
    }

    pub fn offering(&self, id: &OfferingId) -> Result<CourseOffering, WorkflowError> {
        self.store.offerings.require(id)
    }
}

fn normalize_code(raw: &str, what: &str) -> Result<String, WorkflowError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(WorkflowError::bad_request(format!("{what} code is required")));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(WorkflowError::bad_request(format!(
            "{what} code '{code}' may only contain letters, digits, and underscores"
        )));
    }
    Ok(code)
}

fn required(raw: &str, what: &str) -> Result<String, WorkflowError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(WorkflowError::bad_request(format!("{what} is required")))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_upper_cased() {
        assert_eq!(normalize_code(" cs ", "department").expect("valid"), "CS");
    }

    #[test]
    fn codes_reject_separators() {
        let err = normalize_code("CS-1", "department").expect_err("dash is reserved");
        assert!(matches!(err, WorkflowError::BadRequest(_)));
    }
}
