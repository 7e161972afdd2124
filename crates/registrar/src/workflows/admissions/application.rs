use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::domain::{
    Application, ApplicationDocument, ApplicationId, ApplicationStatus, DocumentId,
    DocumentStatus, DocumentType, PersonId,
};
use super::people::PeopleDirectory;
use crate::clock::Clock;
use crate::integrations::{BlobStore, Notification, NotificationKind, Outbox, SideEffect};
use crate::store::{LockKey, Store};
use crate::workflows::academic::domain::ProgramId;
use crate::workflows::WorkflowError;

/// Application review state machine with the approved-document gate.
///
/// `DRAFT → SUBMITTED → UNDER_REVIEW → ACCEPTED | REJECTED | WAITLISTED`, where
/// a draft may only be submitted and ACCEPTED/REJECTED are final.
pub struct ApplicationWorkflow {
    store: Arc<Store>,
    people: Arc<PeopleDirectory>,
    blobs: Arc<dyn BlobStore>,
    outbox: Outbox,
    clock: Arc<dyn Clock>,
    min_approved_documents: usize,
}

impl ApplicationWorkflow {
    pub fn new(
        store: Arc<Store>,
        people: Arc<PeopleDirectory>,
        blobs: Arc<dyn BlobStore>,
        outbox: Outbox,
        clock: Arc<dyn Clock>,
        min_approved_documents: usize,
    ) -> Self {
        Self {
            store,
            people,
            blobs,
            outbox,
            clock,
            min_approved_documents,
        }
    }

    pub fn min_approved_documents(&self) -> usize {
        self.min_approved_documents
    }

    /// Opens a draft application for an existing person.
    pub fn create(
        &self,
        person_id: &PersonId,
        program_id: &ProgramId,
        batch_id: &str,
    ) -> Result<Application, WorkflowError> {
        let batch_id = batch_id.trim();
        if batch_id.is_empty() {
            return Err(WorkflowError::bad_request("batch id is required"));
        }
        self.people.find_or_fail(person_id)?;
        self.store.programs.require(program_id)?;

        let application = Application::draft(
            ApplicationId(self.store.applications.next_key()),
            person_id.clone(),
            program_id.clone(),
            batch_id.to_string(),
            None,
            self.clock.now(),
        );
        self.store
            .applications
            .insert(application.id.clone(), application.clone());
        info!(application_id = %application.id, person_id = %person_id, "application drafted");
        Ok(application)
    }

    pub fn change_status(
        &self,
        id: &ApplicationId,
        target: ApplicationStatus,
    ) -> Result<Application, WorkflowError> {
        let application = self.store.locks.with(LockKey::Application(id.clone()), || {
            let mut application = self.store.applications.require(id)?;
            let current = application.status;

            if current.is_terminal() {
                return Err(WorkflowError::conflict(format!(
                    "application {id} is {} and can no longer change status",
                    current.label()
                )));
            }
            if current == target {
                debug!(application_id = %id, status = current.label(), "application status unchanged");
                return Ok(None);
            }
            if current == ApplicationStatus::Draft && target != ApplicationStatus::Submitted {
                return Err(WorkflowError::conflict(format!(
                    "a DRAFT application can only be SUBMITTED, not {}",
                    target.label()
                )));
            }
            if target == ApplicationStatus::Draft {
                return Err(WorkflowError::conflict(format!(
                    "application {id} cannot return to DRAFT"
                )));
            }
            if target == ApplicationStatus::Accepted {
                let approved = self.count_approved(id);
                if approved < self.min_approved_documents {
                    return Err(WorkflowError::conflict(format!(
                        "application {id} has {approved}/{} approved documents",
                        self.min_approved_documents
                    )));
                }
            }

            let now = self.clock.now();
            application.status = target;
            if target == ApplicationStatus::Submitted && application.submitted_at.is_none() {
                application.submitted_at = Some(now);
            }
            if target.is_decision() && application.reviewed_at.is_none() {
                application.reviewed_at = Some(now);
            }
            self.store
                .applications
                .insert(id.clone(), application.clone());

            info!(
                application_id = %id,
                from = current.label(),
                to = target.label(),
                "application status changed"
            );
            Ok(Some(application))
        })?;

        match application {
            Some(application) => {
                if application.status == ApplicationStatus::Accepted {
                    self.queue_acceptance_notice(&application);
                }
                Ok(application)
            }
            None => self.store.applications.require(id),
        }
    }

    pub fn submit(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.change_status(id, ApplicationStatus::Submitted)
    }

    pub fn move_to_review(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.change_status(id, ApplicationStatus::UnderReview)
    }

    pub fn accept(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.change_status(id, ApplicationStatus::Accepted)
    }

    pub fn reject(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.change_status(id, ApplicationStatus::Rejected)
    }

    pub fn waitlist(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.change_status(id, ApplicationStatus::Waitlisted)
    }

    /// Uploads a supporting file and records it as pending review.
    pub fn attach_document(
        &self,
        id: &ApplicationId,
        document_type: DocumentType,
        filename: &str,
        contents: &[u8],
    ) -> Result<ApplicationDocument, WorkflowError> {
        if contents.is_empty() {
            return Err(WorkflowError::bad_request("document is empty"));
        }
        self.ensure_open(&self.store.applications.require(id)?)?;

        let document_id = DocumentId(self.store.documents.next_key());
        let key = format!(
            "applications/{id}/{document_id}-{}-{}",
            document_type.slug(),
            sanitize_filename(filename)
        );
        // Upload happens before taking the application lock.
        let stored = self
            .blobs
            .upload(contents, &key)
            .map_err(|err| WorkflowError::Unavailable(err.to_string()))?;

        self.store.locks.with(LockKey::Application(id.clone()), || {
            let application = self.store.applications.require(id)?;
            if let Err(err) = self.ensure_open(&application) {
                warn!(application_id = %id, key = %stored.key, "orphaned upload after decision");
                return Err(err);
            }

            let document = ApplicationDocument {
                id: document_id.clone(),
                application_id: id.clone(),
                document_type,
                file_key: stored.key.clone(),
                file_url: stored.url.clone(),
                status: DocumentStatus::PendingReview,
                uploaded_at: self.clock.now(),
            };
            self.store
                .documents
                .insert(document.id.clone(), document.clone());
            info!(application_id = %id, document_id = %document.id, "document attached");
            Ok(document)
        })
    }

    /// Records a reviewer's verdict. Runs under the application lock so a
    /// concurrent acceptance always sees a settled document count.
    pub fn review_document(
        &self,
        document_id: &DocumentId,
        verdict: DocumentStatus,
    ) -> Result<ApplicationDocument, WorkflowError> {
        if verdict == DocumentStatus::PendingReview {
            return Err(WorkflowError::bad_request(
                "a review must approve or reject the document",
            ));
        }
        let application_id = self.store.documents.require(document_id)?.application_id;

        self.store
            .locks
            .with(LockKey::Application(application_id.clone()), || {
                let application = self.store.applications.require(&application_id)?;
                self.ensure_open(&application)?;

                let document = self
                    .store
                    .documents
                    .update(document_id, |document| {
                        document.status = verdict;
                        document.clone()
                    })
                    .ok_or_else(|| WorkflowError::not_found("application document", document_id))?;
                info!(
                    application_id = %application_id,
                    document_id = %document_id,
                    verdict = ?verdict,
                    "document reviewed"
                );
                Ok(document)
            })
    }

    pub fn document_url(
        &self,
        document_id: &DocumentId,
        ttl: Duration,
    ) -> Result<String, WorkflowError> {
        let document = self.store.documents.require(document_id)?;
        self.blobs
            .signed_url(&document.file_key, ttl)
            .map_err(|err| WorkflowError::Unavailable(err.to_string()))
    }

    pub fn documents(&self, id: &ApplicationId) -> Result<Vec<ApplicationDocument>, WorkflowError> {
        self.store.applications.require(id)?;
        Ok(self
            .store
            .documents
            .filter(|document| &document.application_id == id))
    }

    pub fn approved_document_count(&self, id: &ApplicationId) -> Result<usize, WorkflowError> {
        self.store.applications.require(id)?;
        Ok(self.count_approved(id))
    }

    pub fn find_or_fail(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.store.applications.require(id)
    }

    fn count_approved(&self, id: &ApplicationId) -> usize {
        self.store.documents.count(|document| {
            &document.application_id == id && document.status == DocumentStatus::Approved
        })
    }

    fn ensure_open(&self, application: &Application) -> Result<(), WorkflowError> {
        if application.status.is_terminal() {
            Err(WorkflowError::conflict(format!(
                "application {} is {} and its documents are frozen",
                application.id,
                application.status.label()
            )))
        } else {
            Ok(())
        }
    }

    fn queue_acceptance_notice(&self, application: &Application) {
        let recipient = match self.people.find_or_fail(&application.person_id) {
            Ok(person) => {
                let name = person.full_name();
                person.email.map(|email| (name, email))
            }
            Err(_) => None,
        };
        let Some((name, email)) = recipient else {
            warn!(application_id = %application.id, "accepted applicant has no e-mail on file");
            return;
        };

        let mut template_data = BTreeMap::new();
        template_data.insert("name".to_string(), name);
        template_data.insert("application_id".to_string(), application.id.to_string());
        template_data.insert("program_id".to_string(), application.program_id.to_string());
        template_data.insert("batch_id".to_string(), application.batch_id.clone());
        self.outbox.enqueue(SideEffect::Notify(Notification {
            kind: NotificationKind::ApplicationAccepted,
            recipient: email,
            template_data,
        }));
    }
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
