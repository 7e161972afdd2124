use axum::http::StatusCode;

/// Failure taxonomy shared by every workflow.
///
/// Each message carries enough context for the caller to act on it: current
/// versus required counts, the unmet prerequisite, or the remaining balance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// An external collaborator the operation cannot proceed without failed.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
            WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WorkflowError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WorkflowError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
