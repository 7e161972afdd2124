//! Admissions, enrollment, and billing workflows for a single institution.
//!
//! The crate follows a lead from first contact through a paid, course-registered
//! student: inquiry intake, the application review state machine, student
//! provisioning, capacity-constrained course registration, invoicing, and the
//! append-only fund ledger.

pub mod clock;
pub mod config;
pub mod error;
pub mod integrations;
pub mod store;
pub mod telemetry;
pub mod workflows;
