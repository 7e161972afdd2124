use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::entity_id;
use crate::workflows::academic::domain::{EnrollmentId, ProgramId, SemesterId};

entity_id!(FeeScheduleId);
entity_id!(InvoiceId);
entity_id!(InvoiceItemId);
entity_id!(PaymentId);
entity_id!(FundId);
entity_id!(TransactionId);

/// Amount in minor currency units (cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(units: i64) -> Self {
        Self(units)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn checked_add(self, rhs: Money) -> Option<Money> {
        match self.0.checked_add(rhs.0) {
            Some(units) => Some(Money(units)),
            None => None,
        }
    }

    pub const fn checked_sub(self, rhs: Money) -> Option<Money> {
        match self.0.checked_sub(rhs.0) {
            Some(units) => Some(Money(units)),
            None => None,
        }
    }

    /// `None` when the total leaves the representable range.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let units = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", units / 100, units % 100)
    }
}

/// Charge applied to every enrollment in a program for a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub id: FeeScheduleId,
    pub program_id: ProgramId,
    pub semester_id: SemesterId,
    pub label: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
    Void,
}

impl InvoiceStatus {
    /// The only way an invoice status is computed.
    pub fn derive(paid: Money, total: Money, voided: bool) -> Self {
        if voided {
            InvoiceStatus::Void
        } else if paid >= total {
            InvoiceStatus::Paid
        } else if paid.is_positive() {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Unpaid
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Void => "VOID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub enrollment_id: EnrollmentId,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn remaining(&self) -> Money {
        self.total_amount
            .checked_sub(self.paid_amount)
            .unwrap_or(Money::ZERO)
    }

    pub(crate) fn apply_payment(&mut self, amount: Money) -> Option<Money> {
        let paid = self.paid_amount.checked_add(amount)?;
        self.paid_amount = paid;
        self.status = InvoiceStatus::derive(self.paid_amount, self.total_amount, false);
        Some(paid)
    }

    pub(crate) fn void(&mut self, at: DateTime<Utc>) {
        self.voided_at = Some(at);
        self.status = InvoiceStatus::derive(self.paid_amount, self.total_amount, true);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    pub fee_schedule_id: FeeScheduleId,
    pub label: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Cash,
    Online,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Success,
}

/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

/// A named pool of money. `balance` is a cached projection of its journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fund {
    pub id: FundId,
    pub name: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Inflow,
    Outflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    StudentPayment,
    Refund,
    Payroll,
    Operations,
    Adjustment,
}

/// Points a ledger entry back at the record that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReference {
    pub reference_type: String,
    pub reference_id: String,
}

impl LedgerReference {
    pub fn payment(payment_id: &PaymentId) -> Self {
        Self {
            reference_type: "PAYMENT".to_string(),
            reference_id: payment_id.to_string(),
        }
    }
}

/// Ledger entry. Never edited; corrections are new entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialTransaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub fund_id: FundId,
    pub amount: Money,
    pub category: TransactionCategory,
    pub description: String,
    pub reference: Option<LedgerReference>,
    pub created_at: DateTime<Utc>,
}

impl FinancialTransaction {
    /// Effect on the fund balance.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Inflow => self.amount,
            TransactionKind::Outflow => Money(-self.amount.0),
        }
    }
}
