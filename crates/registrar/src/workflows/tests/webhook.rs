use std::sync::Arc;

use serde_json::json;

use super::common::*;
use crate::workflows::finance::domain::{InvoiceStatus, Money};
use crate::workflows::finance::webhook::sign;
use crate::workflows::finance::{PaymentWebhook, WebhookOutcome};
use crate::workflows::WorkflowError;

const SECRET: &str = "whsec_test";

fn webhook(harness: &Harness) -> PaymentWebhook {
    PaymentWebhook::new(Arc::clone(&harness.registrar.billing), Some(SECRET))
}

fn body(invoice_id: &str, amount: i64, status: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "invoice_id": invoice_id,
        "amount": amount,
        "status": status,
        "method": "card",
        "reference": "ch_3PzQ",
    }))
    .expect("json")
}

#[test]
fn signed_success_records_payment() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    let payload = body(invoice.id.as_str(), 175_000, "success");
    let signature = format!("sha256={}", sign(SECRET, &payload));

    match webhook(&harness)
        .handle(&payload, Some(&signature))
        .expect("accepted")
    {
        WebhookOutcome::Recorded { receipt } => {
            assert_eq!(receipt.payment.amount, Money(175_000));
            assert_eq!(receipt.payment.reference.as_deref(), Some("ch_3PzQ"));
            assert_eq!(receipt.invoice.status, InvoiceStatus::Paid);
        }
        other => panic!("expected recorded payment, got {other:?}"),
    }
}

#[test]
fn non_success_status_is_acknowledged_without_side_effects() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    let payload = body(invoice.id.as_str(), 175_000, "failed");
    let signature = sign(SECRET, &payload);

    let outcome = webhook(&harness)
        .handle(&payload, Some(&signature))
        .expect("acknowledged");
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            status: "failed".to_string()
        }
    );
    assert!(harness
        .registrar
        .billing
        .payments(&invoice.id)
        .expect("payments")
        .is_empty());
}

#[test]
fn bad_signatures_are_rejected_before_processing() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    let payload = body(invoice.id.as_str(), 175_000, "success");
    let webhook = webhook(&harness);

    let forged = sign("wrong-secret", &payload);
    for signature in [None, Some(""), Some("not-hex"), Some(forged.as_str())] {
        assert!(matches!(
            webhook.handle(&payload, signature),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    let mut tampered = payload.clone();
    tampered.extend_from_slice(b" ");
    let signature = sign(SECRET, &payload);
    assert!(matches!(
        webhook.handle(&tampered, Some(&signature)),
        Err(WorkflowError::Unauthorized(_))
    ));

    assert!(harness
        .registrar
        .billing
        .payments(&invoice.id)
        .expect("payments")
        .is_empty());
}

#[test]
fn unconfigured_secret_rejects_everything() {
    let harness = harness();
    let webhook = PaymentWebhook::new(Arc::clone(&harness.registrar.billing), None);
    let payload = body("inv-000001", 100, "success");
    assert!(matches!(
        webhook.handle(&payload, Some(&sign(SECRET, &payload))),
        Err(WorkflowError::Unauthorized(_))
    ));
}

#[test]
fn malformed_body_is_a_bad_request() {
    let harness = harness();
    let payload = b"{\"invoice_id\": 12".to_vec();
    let signature = sign(SECRET, &payload);
    assert!(matches!(
        webhook(&harness).handle(&payload, Some(&signature)),
        Err(WorkflowError::BadRequest(_))
    ));
}
