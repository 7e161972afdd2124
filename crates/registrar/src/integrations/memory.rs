use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    BlobError, BlobStore, LmsError, LmsSync, Notification, Notifier, NotifyError,
    PermissionLookup, StoredBlob,
};
use crate::workflows::academic::domain::{EnrollmentId, OfferingId};

/// Fixed actor → permission table.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, actor_id: &str, permissions: &[&str]) -> Self {
        self.grants
            .entry(actor_id.to_string())
            .or_default()
            .extend(permissions.iter().map(|permission| permission.to_string()));
        self
    }
}

impl PermissionLookup for StaticPermissions {
    fn has_permission(&self, actor_id: &str, permission: &str) -> bool {
        self.grants
            .get(actor_id)
            .is_some_and(|granted| granted.contains(permission))
    }
}

/// Keeps every notification it is handed; can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("smtp relay refused connection".to_string()));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}

/// Holds uploads in memory and hands out `memory://` URLs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(key).cloned()
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, bytes: &[u8], key: &str) -> Result<StoredBlob, BlobError> {
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        Ok(StoredBlob {
            url: format!("memory://blobs/{key}"),
            key: key.to_string(),
        })
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        if !self.blobs.lock().contains_key(key) {
            return Err(BlobError::Missing(key.to_string()));
        }
        Ok(format!("memory://blobs/{key}?expires_in={}", ttl.as_secs()))
    }
}

/// Records LMS calls; can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingLms {
    provisioned: Mutex<Vec<EnrollmentId>>,
    synced: Mutex<Vec<OfferingId>>,
    failing: AtomicBool,
}

impl RecordingLms {
    pub fn provisioned(&self) -> Vec<EnrollmentId> {
        self.provisioned.lock().clone()
    }

    pub fn synced(&self) -> Vec<OfferingId> {
        self.synced.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), LmsError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(LmsError::Unavailable("lms returned 503".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LmsSync for RecordingLms {
    fn provision_student(&self, enrollment_id: &EnrollmentId) -> Result<(), LmsError> {
        self.check()?;
        self.provisioned.lock().push(enrollment_id.clone());
        Ok(())
    }

    fn sync_course_offering(&self, offering_id: &OfferingId) -> Result<(), LmsError> {
        self.check()?;
        self.synced.lock().push(offering_id.clone());
        Ok(())
    }
}
