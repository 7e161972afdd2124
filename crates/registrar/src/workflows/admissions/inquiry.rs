use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::domain::{
    Application, ApplicationId, Inquiry, InquiryId, InquiryNote, InquirySource, InquiryStatus,
    NoteId,
};
use super::people::{normalize_email, PeopleDirectory};
use crate::clock::Clock;
use crate::store::{LockKey, Store};
use crate::workflows::academic::domain::ProgramId;
use crate::workflows::WorkflowError;

/// Public lead intake payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInquiry {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub program_id: ProgramId,
    pub source: InquirySource,
}

/// Lead intake, staff follow-up, and conversion into an application.
pub struct InquiryWorkflow {
    store: Arc<Store>,
    people: Arc<PeopleDirectory>,
    clock: Arc<dyn Clock>,
}

impl InquiryWorkflow {
    pub fn new(store: Arc<Store>, people: Arc<PeopleDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            people,
            clock,
        }
    }

    pub fn submit(&self, request: NewInquiry) -> Result<Inquiry, WorkflowError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(WorkflowError::bad_request("name is required"));
        }
        let email = normalize_email(&request.email);
        if !email.contains('@') {
            return Err(WorkflowError::bad_request(format!(
                "'{email}' is not a valid e-mail address"
            )));
        }
        self.store.programs.require(&request.program_id)?;

        self.store
            .locks
            .with(LockKey::InquiryEmail(email.clone()), || {
                if self.store.inquiries.any(|inquiry| inquiry.email == email) {
                    return Err(WorkflowError::conflict(format!(
                        "an inquiry for {email} already exists"
                    )));
                }

                let now = self.clock.now();
                let inquiry = Inquiry {
                    id: InquiryId(self.store.inquiries.next_key()),
                    name,
                    email: email.clone(),
                    phone: request
                        .phone
                        .map(|phone| phone.trim().to_string())
                        .filter(|phone| !phone.is_empty()),
                    program_id: request.program_id,
                    source: request.source,
                    status: InquiryStatus::New,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .inquiries
                    .insert(inquiry.id.clone(), inquiry.clone());
                info!(inquiry_id = %inquiry.id, source = ?inquiry.source, "inquiry received");
                Ok(inquiry)
            })
    }

    /// Moves an inquiry to `status`, recording the move in the audit trail.
    pub fn change_status(
        &self,
        id: &InquiryId,
        status: InquiryStatus,
        actor_id: &str,
    ) -> Result<Inquiry, WorkflowError> {
        self.store.locks.with(LockKey::Inquiry(id.clone()), || {
            let mut inquiry = self.store.inquiries.require(id)?;
            let previous = inquiry.status;

            if previous == status {
                debug!(inquiry_id = %id, status = previous.label(), "inquiry status unchanged");
                return Ok(inquiry);
            }
            if previous == InquiryStatus::Converted {
                return Err(WorkflowError::conflict(format!(
                    "inquiry {id} is already CONVERTED and can no longer change status"
                )));
            }
            if status == InquiryStatus::Converted {
                return Err(WorkflowError::bad_request(
                    "inquiries become CONVERTED only through conversion to an application",
                ));
            }

            inquiry.status = status;
            inquiry.updated_at = self.clock.now();
            self.store.inquiries.insert(id.clone(), inquiry.clone());
            self.append_note(
                id,
                actor_id,
                format!(
                    "Status changed from {} to {}",
                    previous.label(),
                    status.label()
                ),
                true,
            );

            info!(
                inquiry_id = %id,
                from = previous.label(),
                to = status.label(),
                actor_id,
                "inquiry status changed"
            );
            Ok(inquiry)
        })
    }

    pub fn add_note(
        &self,
        id: &InquiryId,
        actor_id: &str,
        text: &str,
    ) -> Result<Inquiry, WorkflowError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkflowError::bad_request("note text is required"));
        }

        self.store.locks.with(LockKey::Inquiry(id.clone()), || {
            let inquiry = self.store.inquiries.require(id)?;
            self.append_note(id, actor_id, text.to_string(), false);
            Ok(inquiry)
        })
    }

    /// Turns a lead into a draft application for the matching (or a new)
    /// person. The person lookup, the application, the status change, and the
    /// audit note commit together.
    pub fn convert(
        &self,
        id: &InquiryId,
        program_id: &ProgramId,
        batch_id: &str,
        actor_id: &str,
    ) -> Result<Application, WorkflowError> {
        let batch_id = batch_id.trim();
        if batch_id.is_empty() {
            return Err(WorkflowError::bad_request("batch id is required"));
        }

        self.store.locks.with(LockKey::Inquiry(id.clone()), || {
            let mut inquiry = self.store.inquiries.require(id)?;
            if matches!(
                inquiry.status,
                InquiryStatus::Converted | InquiryStatus::Closed
            ) {
                return Err(WorkflowError::conflict(format!(
                    "inquiry {id} is {} and cannot be converted",
                    inquiry.status.label()
                )));
            }
            self.store.programs.require(program_id)?;

            let person = self.people.find_or_create(&inquiry.name, &inquiry.email);
            let now = self.clock.now();
            let application = Application::draft(
                ApplicationId(self.store.applications.next_key()),
                person.id.clone(),
                program_id.clone(),
                batch_id.to_string(),
                Some(id.clone()),
                now,
            );
            self.store
                .applications
                .insert(application.id.clone(), application.clone());

            inquiry.status = InquiryStatus::Converted;
            inquiry.updated_at = now;
            self.store.inquiries.insert(id.clone(), inquiry);
            self.append_note(
                id,
                actor_id,
                format!("Converted to application {}", application.id),
                true,
            );

            info!(
                inquiry_id = %id,
                application_id = %application.id,
                person_id = %person.id,
                "inquiry converted"
            );
            Ok(application)
        })
    }

    pub fn find_or_fail(&self, id: &InquiryId) -> Result<Inquiry, WorkflowError> {
        self.store.inquiries.require(id)
    }

    /// Audit trail in the order it was written.
    pub fn notes(&self, id: &InquiryId) -> Result<Vec<InquiryNote>, WorkflowError> {
        self.store.locks.with(LockKey::Inquiry(id.clone()), || {
            self.store.inquiries.require(id)?;
            Ok(self
                .store
                .inquiry_notes
                .filter(|note| &note.inquiry_id == id))
        })
    }

    fn append_note(&self, inquiry_id: &InquiryId, actor_id: &str, text: String, system: bool) {
        let note = InquiryNote {
            id: NoteId(self.store.inquiry_notes.next_key()),
            inquiry_id: inquiry_id.clone(),
            actor_id: actor_id.to_string(),
            text,
            system_generated: system,
            created_at: self.clock.now(),
        };
        self.store.inquiry_notes.insert(note.id.clone(), note);
    }
}
