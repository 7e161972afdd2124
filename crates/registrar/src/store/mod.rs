//! In-memory persistence for the workflows.
//!
//! Every multi-step mutation runs inside [`KeyedLocks::with`] for the keys it
//! touches, validates all of its preconditions, and only then writes. Writes
//! themselves cannot fail, so a failed precondition never leaves partial state
//! behind.
//!
//! Locks nest in a single order to stay deadlock free:
//! `Inquiry` before the email keys, `Application` before `Person`, and
//! `InvoiceScope` before `Invoice` before `Enrollment` before `Offering`.
//! `Payment` is only taken with no other key held.

mod locks;
mod table;

pub use locks::KeyedLocks;
pub use table::Table;

use crate::workflows::academic::domain::{
    Course, CourseId, CourseOffering, CourseRegistration, Department, DepartmentId, Enrollment,
    EnrollmentId, OfferingId, Program, ProgramId, RegistrationId, Semester, SemesterId,
    StudentProfile, StudentProfileId,
};
use crate::workflows::admissions::domain::{
    Application, ApplicationDocument, ApplicationId, DocumentId, Inquiry, InquiryId,
    InquiryNote, NoteId, Person, PersonId,
};
use crate::workflows::finance::domain::{
    FeeSchedule, FeeScheduleId, Invoice, InvoiceId, InvoiceItem, InvoiceItemId, Payment,
    PaymentId,
};

/// Declares a string-backed identifier newtype.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

pub(crate) use entity_id;

/// Serialization keys for operations that must not interleave.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Inquiry(InquiryId),
    InquiryEmail(String),
    PersonEmail(String),
    Application(ApplicationId),
    Person(PersonId),
    InvoiceScope(EnrollmentId),
    Invoice(InvoiceId),
    Enrollment(EnrollmentId),
    Offering(OfferingId),
    Payment(PaymentId),
}

/// Shared tables behind every workflow.
pub struct Store {
    pub(crate) people: Table<PersonId, Person>,
    pub(crate) inquiries: Table<InquiryId, Inquiry>,
    pub(crate) inquiry_notes: Table<NoteId, InquiryNote>,
    pub(crate) applications: Table<ApplicationId, Application>,
    pub(crate) documents: Table<DocumentId, ApplicationDocument>,
    pub(crate) departments: Table<DepartmentId, Department>,
    pub(crate) programs: Table<ProgramId, Program>,
    pub(crate) semesters: Table<SemesterId, Semester>,
    pub(crate) courses: Table<CourseId, Course>,
    pub(crate) offerings: Table<OfferingId, CourseOffering>,
    pub(crate) profiles: Table<StudentProfileId, StudentProfile>,
    pub(crate) enrollments: Table<EnrollmentId, Enrollment>,
    pub(crate) registrations: Table<RegistrationId, CourseRegistration>,
    pub(crate) fee_schedules: Table<FeeScheduleId, FeeSchedule>,
    pub(crate) invoices: Table<InvoiceId, Invoice>,
    pub(crate) invoice_items: Table<InvoiceItemId, InvoiceItem>,
    pub(crate) payments: Table<PaymentId, Payment>,
    pub(crate) locks: KeyedLocks<LockKey>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            people: Table::new("person", "per"),
            inquiries: Table::new("inquiry", "inq"),
            inquiry_notes: Table::new("inquiry note", "note"),
            applications: Table::new("application", "app"),
            documents: Table::new("application document", "doc"),
            departments: Table::new("department", "dept"),
            programs: Table::new("program", "prog"),
            semesters: Table::new("semester", "sem"),
            courses: Table::new("course", "crs"),
            offerings: Table::new("course offering", "off"),
            profiles: Table::new("student profile", "stu"),
            enrollments: Table::new("enrollment", "enr"),
            registrations: Table::new("course registration", "reg"),
            fee_schedules: Table::new("fee schedule", "fee"),
            invoices: Table::new("invoice", "inv"),
            invoice_items: Table::new("invoice item", "item"),
            payments: Table::new("payment", "pay"),
            locks: KeyedLocks::new(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
