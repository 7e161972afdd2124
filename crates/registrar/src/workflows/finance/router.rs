use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::billing::PaymentRequest;
use super::domain::{FundId, InvoiceId, Money};
use super::webhook::SIGNATURE_HEADER;
use crate::workflows::academic::domain::{EnrollmentId, ProgramId, SemesterId};
use crate::workflows::http::{respond, ApiState};

const FINANCE: &str = "finance.write";

#[derive(Debug, Deserialize)]
pub(crate) struct NewFee {
    program_id: ProgramId,
    semester_id: SemesterId,
    label: String,
    amount: Money,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewFund {
    name: String,
}

/// Invoicing, payment, ledger, and processor webhook routes.
pub fn finance_router() -> Router<ApiState> {
    Router::new()
        .route("/api/v1/fees", post(add_fee))
        .route("/api/v1/enrollments/:id/invoice", post(generate_invoice))
        .route("/api/v1/invoices/:id", get(get_invoice))
        .route("/api/v1/invoices/:id/payments", post(record_payment))
        .route("/api/v1/invoices/:id/void", post(void_invoice))
        .route("/api/v1/funds", post(create_fund))
        .route("/api/v1/funds/:id/reconciliation", get(reconcile_fund))
        .route("/api/v1/ledger/reconcile", post(reconcile_ledger))
        .route("/api/v1/webhooks/payments", post(payment_webhook))
}

pub(crate) async fn add_fee(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewFee>,
) -> Response {
    let result = state.authorize(&headers, FINANCE).and_then(|_| {
        state.registrar.billing.add_fee(
            &request.program_id,
            &request.semester_id,
            &request.label,
            request.amount,
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn generate_invoice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.billing.generate_invoice(&EnrollmentId(id)));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn get_invoice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.billing.find_invoice_or_fail(&InvoiceId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn record_payment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<PaymentRequest>,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.billing.record_payment(&InvoiceId(id), request));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn void_invoice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.billing.void_invoice(&InvoiceId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_fund(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewFund>,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.ledger.create_fund(&request.name));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn reconcile_fund(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.ledger.reconcile(&FundId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn reconcile_ledger(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Response {
    let result = state
        .authorize(&headers, FINANCE)
        .and_then(|_| state.registrar.billing.reconcile_ledger());
    respond(StatusCode::OK, result)
}

/// Public: authenticated by the body signature instead of an actor.
pub(crate) async fn payment_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    respond(StatusCode::OK, state.webhook.handle(&body, signature))
}
