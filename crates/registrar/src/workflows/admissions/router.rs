use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::domain::{
    ApplicationId, ApplicationStatus, DocumentId, DocumentStatus, DocumentType, InquiryId,
    InquiryStatus, PersonId,
};
use super::inquiry::NewInquiry;
use crate::workflows::academic::domain::ProgramId;
use crate::workflows::http::{respond, ApiState};

const WRITE: &str = "admissions.write";
const READ: &str = "admissions.read";

#[derive(Debug, Deserialize)]
pub(crate) struct InquiryStatusChange {
    status: InquiryStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NoteRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversionRequest {
    program_id: ProgramId,
    batch_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewApplication {
    person_id: PersonId,
    program_id: ProgramId,
    batch_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplicationStatusChange {
    status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    document_type: DocumentType,
    filename: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    status: DocumentStatus,
}

/// Inquiry intake and application review routes.
pub fn admissions_router() -> Router<ApiState> {
    Router::new()
        .route("/api/v1/inquiries", post(submit_inquiry))
        .route("/api/v1/inquiries/:id", get(get_inquiry))
        .route("/api/v1/inquiries/:id/status", post(change_inquiry_status))
        .route("/api/v1/inquiries/:id/notes", get(list_notes).post(add_note))
        .route("/api/v1/inquiries/:id/convert", post(convert_inquiry))
        .route("/api/v1/applications", post(create_application))
        .route("/api/v1/applications/:id", get(get_application))
        .route(
            "/api/v1/applications/:id/status",
            post(change_application_status),
        )
        .route(
            "/api/v1/applications/:id/documents",
            get(list_documents).post(upload_document),
        )
        .route("/api/v1/documents/:id/review", post(review_document))
}

/// Public: prospective students are not signed in.
pub(crate) async fn submit_inquiry(
    State(state): State<ApiState>,
    axum::Json(request): axum::Json<NewInquiry>,
) -> Response {
    respond(StatusCode::CREATED, state.registrar.inquiries.submit(request))
}

pub(crate) async fn get_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, READ)
        .and_then(|_| state.registrar.inquiries.find_or_fail(&InquiryId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn change_inquiry_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<InquiryStatusChange>,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|actor| {
        state
            .registrar
            .inquiries
            .change_status(&InquiryId(id), request.status, &actor)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn list_notes(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, READ)
        .and_then(|_| state.registrar.inquiries.notes(&InquiryId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_note(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<NoteRequest>,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|actor| {
        state
            .registrar
            .inquiries
            .add_note(&InquiryId(id), &actor, &request.text)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn convert_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<ConversionRequest>,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|actor| {
        state.registrar.inquiries.convert(
            &InquiryId(id),
            &request.program_id,
            &request.batch_id,
            &actor,
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn create_application(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewApplication>,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|_| {
        state.registrar.applications.create(
            &request.person_id,
            &request.program_id,
            &request.batch_id,
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn get_application(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, READ)
        .and_then(|_| state.registrar.applications.find_or_fail(&ApplicationId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn change_application_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<ApplicationStatusChange>,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|_| {
        state
            .registrar
            .applications
            .change_status(&ApplicationId(id), request.status)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn list_documents(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, READ)
        .and_then(|_| state.registrar.applications.documents(&ApplicationId(id)));
    respond(StatusCode::OK, result)
}

/// Raw file bytes in the body; type and name in the query string.
pub(crate) async fn upload_document(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|_| {
        state.registrar.applications.attach_document(
            &ApplicationId(id),
            params.document_type,
            &params.filename,
            &body,
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn review_document(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response {
    let result = state.authorize(&headers, WRITE).and_then(|_| {
        state
            .registrar
            .applications
            .review_document(&DocumentId(id), request.status)
    });
    respond(StatusCode::OK, result)
}
