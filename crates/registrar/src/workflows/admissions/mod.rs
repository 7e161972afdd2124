//! Lead intake and the application review state machine.

pub mod application;
pub mod domain;
pub mod inquiry;
pub mod people;
pub mod router;

pub use application::ApplicationWorkflow;
pub use domain::{
    Application, ApplicationDocument, ApplicationId, ApplicationStatus, DocumentId,
    DocumentStatus, DocumentType, Inquiry, InquiryId, InquiryNote, InquirySource, InquiryStatus,
    Person, PersonId,
};
pub use inquiry::{InquiryWorkflow, NewInquiry};
pub use people::PeopleDirectory;
pub use router::admissions_router;
