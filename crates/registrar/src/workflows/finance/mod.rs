//! Invoicing, payments, the fund ledger, and processor webhooks.

pub mod billing;
pub mod domain;
pub mod ledger;
pub mod router;
pub mod webhook;

pub use billing::{BillingWorkflow, PaymentReceipt, PaymentRequest};
pub use domain::{
    FeeSchedule, FeeScheduleId, FinancialTransaction, Fund, FundId, Invoice, InvoiceId,
    InvoiceItem, InvoiceStatus, LedgerReference, Money, Payment, PaymentId, PaymentMethod,
    PaymentStatus, TransactionCategory, TransactionKind,
};
pub use ledger::{FundReconciliation, LedgerEngine, Posting};
pub use router::finance_router;
pub use webhook::{PaymentNotification, PaymentWebhook, WebhookOutcome, SIGNATURE_HEADER};
