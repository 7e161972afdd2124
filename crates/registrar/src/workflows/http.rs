use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::finance::PaymentWebhook;
use super::{Registrar, WorkflowError};
use crate::integrations::PermissionLookup;

/// Header naming the staff member behind a request.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Shared state behind every workflow route.
#[derive(Clone)]
pub struct ApiState {
    pub registrar: Arc<Registrar>,
    pub permissions: Arc<dyn PermissionLookup>,
    pub webhook: Arc<PaymentWebhook>,
}

impl ApiState {
    /// Resolves the acting user and checks that they hold `permission`.
    pub(crate) fn authorize(
        &self,
        headers: &HeaderMap,
        permission: &str,
    ) -> Result<String, WorkflowError> {
        let actor = headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|actor| !actor.is_empty())
            .ok_or_else(|| WorkflowError::unauthorized(format!("missing {ACTOR_HEADER} header")))?;
        if !self.permissions.has_permission(actor, permission) {
            debug!(actor, permission, "permission denied");
            return Err(WorkflowError::unauthorized(format!(
                "{actor} lacks {permission}"
            )));
        }
        Ok(actor.to_string())
    }
}

pub(crate) fn respond<T: Serialize>(status: StatusCode, result: Result<T, WorkflowError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) fn error_response(err: &WorkflowError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (err.status_code(), axum::Json(payload)).into_response()
}
