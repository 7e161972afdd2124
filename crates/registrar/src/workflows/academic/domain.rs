use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::entity_id;
use crate::workflows::admissions::domain::PersonId;

entity_id!(DepartmentId);
entity_id!(ProgramId);
entity_id!(SemesterId);
entity_id!(CourseId);
entity_id!(
    /// A scheduled instance of a course in one semester.
    OfferingId
);
entity_id!(StudentProfileId);
entity_id!(EnrollmentId);
entity_id!(RegistrationId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    /// Short code embedded in student identifiers, e.g. `CS`.
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub code: String,
    pub name: String,
    pub department_id: DepartmentId,
}

/// At most one semester is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub id: SemesterId,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub title: String,
    pub credit_hours: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOffering {
    pub id: OfferingId,
    pub course_id: CourseId,
    pub semester_id: SemesterId,
    pub capacity: u32,
    pub instructor_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Provisioned,
    Active,
    OnHold,
    Withdrawn,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Provisioned => "PROVISIONED",
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::OnHold => "ON_HOLD",
            EnrollmentStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

/// One per person. The status always mirrors the person's enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentProfileId,
    pub person_id: PersonId,
    /// `YYYY-DEPT-NNNN`, unique across the institution.
    pub student_number: String,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub profile_id: StudentProfileId,
    pub program_id: ProgramId,
    pub batch_id: String,
    pub semester_id: SemesterId,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Registered,
    Completed,
    Dropped,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "REGISTERED",
            RegistrationStatus::Completed => "COMPLETED",
            RegistrationStatus::Dropped => "DROPPED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRegistration {
    pub id: RegistrationId,
    pub enrollment_id: EnrollmentId,
    pub offering_id: OfferingId,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of provisioning: the new profile and its first enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedStudent {
    pub profile: StudentProfile,
    pub enrollment: Enrollment,
}
