//! Catalog, prerequisites, student provisioning, and course registration.

pub mod catalog;
pub mod domain;
pub mod enrollment;
pub mod identifiers;
pub mod prerequisites;
pub mod router;

pub use catalog::CatalogService;
pub use domain::{
    Course, CourseId, CourseOffering, CourseRegistration, Department, DepartmentId, Enrollment,
    EnrollmentId, EnrollmentStatus, OfferingId, Program, ProgramId, ProvisionedStudent,
    RegistrationId, RegistrationStatus, Semester, SemesterId, StudentProfile, StudentProfileId,
};
pub use enrollment::EnrollmentWorkflow;
pub use identifiers::StudentIdentifierGenerator;
pub use prerequisites::PrerequisiteGraph;
pub use router::academic_router;
