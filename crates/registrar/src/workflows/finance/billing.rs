use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    FeeSchedule, FeeScheduleId, FinancialTransaction, Invoice, InvoiceId, InvoiceItem,
    InvoiceItemId, InvoiceStatus, LedgerReference, Money, Payment, PaymentId, PaymentMethod,
    PaymentStatus, TransactionCategory,
};
use super::ledger::{LedgerEngine, Posting};
use crate::clock::Clock;
use crate::config::PolicyConfig;
use crate::store::{LockKey, Store};
use crate::workflows::academic::domain::{EnrollmentId, ProgramId, SemesterId};
use crate::workflows::academic::EnrollmentWorkflow;
use crate::workflows::WorkflowError;

/// Payment as reported by a cashier or a processor.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What a successful payment changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub invoice: Invoice,
    pub enrollment_activated: bool,
    /// `None` when the ledger posting failed; `reconcile_ledger` recovers it.
    pub ledger_transaction: Option<FinancialTransaction>,
}

/// Invoice generation from fee schedules and payment recording.
pub struct BillingWorkflow {
    store: Arc<Store>,
    enrollments: Arc<EnrollmentWorkflow>,
    ledger: Arc<LedgerEngine>,
    clock: Arc<dyn Clock>,
    invoice_due_days: i64,
    tuition_fund: String,
}

impl BillingWorkflow {
    pub fn new(
        store: Arc<Store>,
        enrollments: Arc<EnrollmentWorkflow>,
        ledger: Arc<LedgerEngine>,
        clock: Arc<dyn Clock>,
        policy: &PolicyConfig,
    ) -> Self {
        Self {
            store,
            enrollments,
            ledger,
            clock,
            invoice_due_days: policy.invoice_due_days,
            tuition_fund: policy.tuition_fund.clone(),
        }
    }

    pub fn add_fee(
        &self,
        program_id: &ProgramId,
        semester_id: &SemesterId,
        label: &str,
        amount: Money,
    ) -> Result<FeeSchedule, WorkflowError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(WorkflowError::bad_request("fee label is required"));
        }
        if !amount.is_positive() {
            return Err(WorkflowError::bad_request(format!(
                "fee amount must be positive, got {amount}"
            )));
        }
        self.store.programs.require(program_id)?;
        self.store.semesters.require(semester_id)?;

        let fee = FeeSchedule {
            id: FeeScheduleId(self.store.fee_schedules.next_key()),
            program_id: program_id.clone(),
            semester_id: semester_id.clone(),
            label: label.to_string(),
            amount,
        };
        self.store.fee_schedules.insert(fee.id.clone(), fee.clone());
        info!(fee_id = %fee.id, amount = %fee.amount, "fee schedule added");
        Ok(fee)
    }

    /// Bills the enrollment for every fee of its program and semester.
    pub fn generate_invoice(&self, enrollment_id: &EnrollmentId) -> Result<Invoice, WorkflowError> {
        self.store
            .locks
            .with(LockKey::InvoiceScope(enrollment_id.clone()), || {
                let enrollment = self.store.enrollments.require(enrollment_id)?;
                if let Some(existing) = self.store.invoices.find(|invoice| {
                    &invoice.enrollment_id == enrollment_id
                        && invoice.status != InvoiceStatus::Void
                }) {
                    return Err(WorkflowError::conflict(format!(
                        "enrollment {enrollment_id} already has invoice {} ({})",
                        existing.id,
                        existing.status.label()
                    )));
                }

                let fees = self.store.fee_schedules.filter(|fee| {
                    fee.program_id == enrollment.program_id
                        && fee.semester_id == enrollment.semester_id
                });
                if fees.is_empty() {
                    return Err(WorkflowError::not_found(
                        "fee schedule",
                        format!("{}/{}", enrollment.program_id, enrollment.semester_id),
                    ));
                }

                let now = self.clock.now();
                let total = Money::checked_sum(fees.iter().map(|fee| fee.amount)).ok_or_else(
                    || {
                        WorkflowError::bad_request(format!(
                            "fees for {}/{} total more than an invoice can hold",
                            enrollment.program_id, enrollment.semester_id
                        ))
                    },
                )?;
                let invoice = Invoice {
                    id: InvoiceId(self.store.invoices.next_key()),
                    enrollment_id: enrollment_id.clone(),
                    total_amount: total,
                    paid_amount: Money::ZERO,
                    status: InvoiceStatus::derive(Money::ZERO, total, false),
                    due_date: self.clock.today() + Duration::days(self.invoice_due_days),
                    created_at: now,
                    voided_at: None,
                };
                for fee in &fees {
                    let item = InvoiceItem {
                        id: InvoiceItemId(self.store.invoice_items.next_key()),
                        invoice_id: invoice.id.clone(),
                        fee_schedule_id: fee.id.clone(),
                        label: fee.label.clone(),
                        amount: fee.amount,
                    };
                    self.store.invoice_items.insert(item.id.clone(), item);
                }
                self.store.invoices.insert(invoice.id.clone(), invoice.clone());

                info!(
                    invoice_id = %invoice.id,
                    enrollment_id = %enrollment_id,
                    total = %invoice.total_amount,
                    items = fees.len(),
                    due = %invoice.due_date,
                    "invoice generated"
                );
                Ok(invoice)
            })
    }

    /// Applies a payment to an invoice.
    ///
    /// A payment that settles the invoice also activates a PROVISIONED
    /// enrollment before the payment is written. The tuition-fund inflow is
    /// posted afterwards; a posting failure is logged and leaves the payment
    /// intact.
    pub fn record_payment(
        &self,
        invoice_id: &InvoiceId,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt, WorkflowError> {
        if !request.amount.is_positive() {
            return Err(WorkflowError::bad_request(format!(
                "payment amount must be positive, got {}",
                request.amount
            )));
        }

        let (payment, invoice, enrollment_activated) =
            self.store.locks.with(LockKey::Invoice(invoice_id.clone()), || {
                let mut invoice = self.store.invoices.require(invoice_id)?;
                match invoice.status {
                    InvoiceStatus::Void | InvoiceStatus::Paid => {
                        return Err(WorkflowError::bad_request(format!(
                            "invoice {invoice_id} is {} and cannot take payments",
                            invoice.status.label()
                        )))
                    }
                    InvoiceStatus::Unpaid | InvoiceStatus::Partial => {}
                }
                let remaining = invoice.remaining();
                if request.amount > remaining {
                    return Err(WorkflowError::bad_request(format!(
                        "payment of {} exceeds the remaining balance of {remaining} on invoice {invoice_id}",
                        request.amount
                    )));
                }
                self.store.enrollments.require(&invoice.enrollment_id)?;

                invoice.apply_payment(request.amount).ok_or_else(|| {
                    WorkflowError::bad_request(format!(
                        "payment of {} overflows invoice {invoice_id}",
                        request.amount
                    ))
                })?;
                let enrollment_activated = if invoice.status == InvoiceStatus::Paid {
                    self.enrollments
                        .activate_if_provisioned(&invoice.enrollment_id)?
                } else {
                    false
                };

                let payment = Payment {
                    id: PaymentId(self.store.payments.next_key()),
                    invoice_id: invoice_id.clone(),
                    amount: request.amount,
                    method: request.method,
                    reference: request.reference.clone(),
                    notes: request.notes.clone(),
                    status: PaymentStatus::Success,
                    paid_at: self.clock.now(),
                };
                self.store.payments.insert(payment.id.clone(), payment.clone());
                self.store.invoices.insert(invoice_id.clone(), invoice.clone());

                info!(
                    invoice_id = %invoice_id,
                    payment_id = %payment.id,
                    amount = %payment.amount,
                    paid = %invoice.paid_amount,
                    total = %invoice.total_amount,
                    status = invoice.status.label(),
                    enrollment_activated,
                    "payment recorded"
                );
                Ok((payment, invoice, enrollment_activated))
            })?;

        let ledger_transaction = match self.post_payment(&payment) {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(
                    payment_id = %payment.id,
                    error = %err,
                    "ledger posting failed; payment kept, run ledger reconciliation"
                );
                None
            }
        };

        Ok(PaymentReceipt {
            payment,
            invoice,
            enrollment_activated,
            ledger_transaction,
        })
    }

    /// Voids an invoice that has not taken any money, freeing the enrollment
    /// for a fresh invoice.
    pub fn void_invoice(&self, id: &InvoiceId) -> Result<Invoice, WorkflowError> {
        let enrollment_id = self.store.invoices.require(id)?.enrollment_id;
        let locks = &self.store.locks;

        locks.with(LockKey::InvoiceScope(enrollment_id), || {
            locks.with(LockKey::Invoice(id.clone()), || {
                let mut invoice = self.store.invoices.require(id)?;
                if invoice.status != InvoiceStatus::Unpaid {
                    return Err(WorkflowError::conflict(format!(
                        "invoice {id} is {}; only UNPAID invoices can be voided",
                        invoice.status.label()
                    )));
                }
                invoice.void(self.clock.now());
                self.store.invoices.insert(id.clone(), invoice.clone());
                info!(invoice_id = %id, "invoice voided");
                Ok(invoice)
            })
        })
    }

    /// Posts the tuition inflow for every successful payment the ledger has
    /// not seen, returning the new transactions.
    pub fn reconcile_ledger(&self) -> Result<Vec<FinancialTransaction>, WorkflowError> {
        let fund = self
            .ledger
            .fund_by_name(&self.tuition_fund)
            .ok_or_else(|| WorkflowError::not_found("fund", &self.tuition_fund))?;

        let mut posted = Vec::new();
        for payment in self
            .store
            .payments
            .filter(|payment| payment.status == PaymentStatus::Success)
        {
            if let Some(transaction) = self.post_payment(&payment)? {
                posted.push(transaction);
            }
        }
        info!(fund = %fund.name, posted = posted.len(), "ledger reconciled against payments");
        Ok(posted)
    }

    /// Posts the inflow for `payment` unless one already references it.
    fn post_payment(
        &self,
        payment: &Payment,
    ) -> Result<Option<FinancialTransaction>, WorkflowError> {
        let reference = LedgerReference::payment(&payment.id);
        // The reference check and the posting share the payment's lock.
        self.store.locks.with(LockKey::Payment(payment.id.clone()), || {
            if !self
                .ledger
                .transactions_referencing(&reference.reference_type, &reference.reference_id)
                .is_empty()
            {
                return Ok(None);
            }

            let fund = self
                .ledger
                .fund_by_name(&self.tuition_fund)
                .ok_or_else(|| WorkflowError::not_found("fund", &self.tuition_fund))?;
            let transaction = self.ledger.record_inflow(
                &fund.id,
                Posting {
                    amount: payment.amount,
                    category: TransactionCategory::StudentPayment,
                    description: format!(
                        "Payment {} for invoice {}",
                        payment.id, payment.invoice_id
                    ),
                    reference: Some(reference),
                },
            )?;
            Ok(Some(transaction))
        })
    }

    pub fn find_invoice_or_fail(&self, id: &InvoiceId) -> Result<Invoice, WorkflowError> {
        self.store.invoices.require(id)
    }

    pub fn invoice_items(&self, id: &InvoiceId) -> Result<Vec<InvoiceItem>, WorkflowError> {
        self.store.invoices.require(id)?;
        Ok(self.store.invoice_items.filter(|item| &item.invoice_id == id))
    }

    pub fn payments(&self, id: &InvoiceId) -> Result<Vec<Payment>, WorkflowError> {
        self.store.invoices.require(id)?;
        Ok(self.store.payments.filter(|payment| &payment.invoice_id == id))
    }

    pub fn invoices_for(&self, enrollment_id: &EnrollmentId) -> Vec<Invoice> {
        self.store
            .invoices
            .filter(|invoice| &invoice.enrollment_id == enrollment_id)
    }
}
