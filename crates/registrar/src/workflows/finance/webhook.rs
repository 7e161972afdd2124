use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use super::billing::{BillingWorkflow, PaymentReceipt, PaymentRequest};
use super::domain::{InvoiceId, Money, PaymentMethod};
use crate::workflows::WorkflowError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

const SUCCESS_STATUS: &str = "success";

/// Body posted by the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub status: String,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Recorded { receipt: Box<PaymentReceipt> },
    Ignored { status: String },
}

/// Verifies processor callbacks and turns successful ones into payments.
pub struct PaymentWebhook {
    billing: Arc<BillingWorkflow>,
    secret: Option<Vec<u8>>,
}

impl PaymentWebhook {
    pub fn new(billing: Arc<BillingWorkflow>, secret: Option<&str>) -> Self {
        Self {
            billing,
            secret: secret
                .filter(|secret| !secret.is_empty())
                .map(|secret| secret.as_bytes().to_vec()),
        }
    }

    /// The signature is checked before the body is parsed.
    pub fn handle(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WorkflowError> {
        self.verify(raw_body, signature)?;

        let notification: PaymentNotification = serde_json::from_slice(raw_body)
            .map_err(|err| WorkflowError::bad_request(format!("malformed payment webhook: {err}")))?;
        if !notification.status.eq_ignore_ascii_case(SUCCESS_STATUS) {
            info!(
                invoice_id = %notification.invoice_id,
                status = %notification.status,
                "payment webhook acknowledged without action"
            );
            return Ok(WebhookOutcome::Ignored {
                status: notification.status,
            });
        }

        let receipt = self.billing.record_payment(
            &notification.invoice_id,
            PaymentRequest {
                amount: notification.amount,
                method: notification.method,
                reference: notification.reference,
                notes: Some("payment processor webhook".to_string()),
            },
        )?;
        Ok(WebhookOutcome::Recorded {
            receipt: Box::new(receipt),
        })
    }

    fn verify(&self, raw_body: &[u8], signature: Option<&str>) -> Result<(), WorkflowError> {
        let Some(secret) = self.secret.as_deref() else {
            warn!("payment webhook received but no signing secret is configured");
            return Err(WorkflowError::unauthorized("payment webhooks are not configured"));
        };
        let signature = signature
            .map(str::trim)
            .filter(|signature| !signature.is_empty())
            .ok_or_else(|| WorkflowError::unauthorized("missing payment signature"))?;
        let provided = hex::decode(signature.strip_prefix("sha256=").unwrap_or(signature))
            .map_err(|_| WorkflowError::unauthorized("payment signature is not valid hex"))?;

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|_| WorkflowError::unauthorized("payment signing key rejected"))?;
        mac.update(raw_body);
        mac.verify_slice(&provided).map_err(|_| {
            warn!("payment webhook signature mismatch");
            WorkflowError::unauthorized("payment signature mismatch")
        })
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`, as a processor would send it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::sign;

    #[test]
    fn signature_matches_reference_vector() {
        // RFC 4231 test case 2.
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
