use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::entity_id;
use crate::workflows::academic::domain::ProgramId;

entity_id!(
    /// Identifier for a person known to the institution.
    PersonId
);
entity_id!(InquiryId);
entity_id!(NoteId);
entity_id!(
    /// Identifier wrapper for admission applications.
    ApplicationId
);
entity_id!(DocumentId);

/// Anyone who has applied or been converted from an inquiry.
///
/// Deleting a person only stamps `deleted_at`; every read filters on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Person {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// Channel through which a lead first reached the institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquirySource {
    Website,
    Referral,
    Event,
    SocialMedia,
    WalkIn,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryStatus {
    New,
    Contacted,
    InProgress,
    Converted,
    Closed,
}

impl InquiryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InquiryStatus::New => "NEW",
            InquiryStatus::Contacted => "CONTACTED",
            InquiryStatus::InProgress => "IN_PROGRESS",
            InquiryStatus::Converted => "CONVERTED",
            InquiryStatus::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: InquiryId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub program_id: ProgramId,
    pub source: InquirySource,
    pub status: InquiryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit trail entry. Notes are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryNote {
    pub id: NoteId,
    pub inquiry_id: InquiryId,
    pub actor_id: String,
    pub text: String,
    pub system_generated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
    Waitlisted,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::UnderReview => "UNDER_REVIEW",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Waitlisted => "WAITLISTED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }

    /// Statuses that record a review decision.
    pub const fn is_decision(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Waitlisted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub person_id: PersonId,
    pub program_id: ProgramId,
    pub batch_id: String,
    pub inquiry_id: Option<InquiryId>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn draft(
        id: ApplicationId,
        person_id: PersonId,
        program_id: ProgramId,
        batch_id: String,
        inquiry_id: Option<InquiryId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            person_id,
            program_id,
            batch_id,
            inquiry_id,
            status: ApplicationStatus::Draft,
            created_at: now,
            submitted_at: None,
            reviewed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Transcript,
    IdentityDocument,
    Recommendation,
    Photo,
    Other,
}

impl DocumentType {
    pub const fn slug(self) -> &'static str {
        match self {
            DocumentType::Transcript => "transcript",
            DocumentType::IdentityDocument => "identity",
            DocumentType::Recommendation => "recommendation",
            DocumentType::Photo => "photo",
            DocumentType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    PendingReview,
    Approved,
    Rejected,
}

/// Supporting file for an application; the bytes live in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub document_type: DocumentType,
    pub file_key: String,
    pub file_url: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
}
