//! Contracts for the collaborators that sit outside the core workflows, with
//! in-memory implementations for the demo server and tests.

mod memory;
mod outbox;

pub use memory::{MemoryBlobStore, RecordingLms, RecordingNotifier, StaticPermissions};
pub use outbox::{outbox, Outbox, OutboxWorker, SideEffect};

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflows::academic::domain::{EnrollmentId, OfferingId};

/// Answers whether an actor holds a named permission.
pub trait PermissionLookup: Send + Sync {
    fn has_permission(&self, actor_id: &str, permission: &str) -> bool;
}

/// Outbound notification hook (e-mail, SMS).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationAccepted,
    EnrollmentActivated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub template_data: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Opaque file storage. Callers keep only the returned key and URL.
pub trait BlobStore: Send + Sync {
    fn upload(&self, bytes: &[u8], key: &str) -> Result<StoredBlob, BlobError>;
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub url: String,
    pub key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob '{0}' does not exist")]
    Missing(String),
    #[error("blob storage unavailable: {0}")]
    Unavailable(String),
}

/// External learning-management system kept in step with enrollments.
pub trait LmsSync: Send + Sync {
    fn provision_student(&self, enrollment_id: &EnrollmentId) -> Result<(), LmsError>;
    fn sync_course_offering(&self, offering_id: &OfferingId) -> Result<(), LmsError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LmsError {
    #[error("lms rejected request: {0}")]
    Rejected(String),
    #[error("lms unavailable: {0}")]
    Unavailable(String),
}
