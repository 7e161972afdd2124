use std::thread;

use chrono::NaiveDate;

use super::common::*;
use crate::workflows::academic::domain::EnrollmentStatus;
use crate::workflows::finance::domain::{
    InvoiceStatus, Money, PaymentMethod, TransactionCategory,
};
use crate::workflows::finance::PaymentRequest;
use crate::workflows::WorkflowError;

fn payment(amount: i64) -> PaymentRequest {
    PaymentRequest {
        amount: Money(amount),
        method: PaymentMethod::BankTransfer,
        reference: Some("BT-2291".to_string()),
        notes: None,
    }
}

#[test]
fn invoice_sums_fee_schedule() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");

    assert_eq!(invoice.total_amount, Money(175_000));
    assert_eq!(invoice.paid_amount, Money::ZERO);
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(
        invoice.due_date,
        NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid date")
    );

    let items = harness
        .registrar
        .billing
        .invoice_items(&invoice.id)
        .expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(
        Money::checked_sum(items.iter().map(|item| item.amount)),
        Some(invoice.total_amount)
    );
}

#[test]
fn fee_totals_beyond_the_money_range_are_refused() {
    let harness = harness();
    let billing = &harness.registrar.billing;
    billing
        .add_fee(&harness.program.id, &harness.semester.id, "Tuition", Money(i64::MAX))
        .expect("tuition fee");
    billing
        .add_fee(&harness.program.id, &harness.semester.id, "Lab fee", Money(i64::MAX))
        .expect("lab fee");
    let enrollment = harness.provisioned_enrollment("alice@example.com");

    assert!(matches!(
        billing.generate_invoice(&enrollment.id),
        Err(WorkflowError::BadRequest(_))
    ));
    assert!(billing.invoices_for(&enrollment.id).is_empty());
}

#[test]
fn one_open_invoice_per_enrollment() {
    let harness = harness();
    let (enrollment, invoice) = harness.invoiced_enrollment("alice@example.com");
    let billing = &harness.registrar.billing;

    assert!(matches!(
        billing.generate_invoice(&enrollment.id),
        Err(WorkflowError::Conflict(_))
    ));

    let voided = billing.void_invoice(&invoice.id).expect("voided");
    assert_eq!(voided.status, InvoiceStatus::Void);
    assert!(voided.voided_at.is_some());

    let replacement = billing.generate_invoice(&enrollment.id).expect("new invoice");
    assert_ne!(replacement.id, invoice.id);
    assert_eq!(billing.invoices_for(&enrollment.id).len(), 2);
}

#[test]
fn missing_fee_schedule_is_not_found() {
    let harness = harness();
    let enrollment = harness.provisioned_enrollment("alice@example.com");
    assert!(matches!(
        harness.registrar.billing.generate_invoice(&enrollment.id),
        Err(WorkflowError::NotFound { entity: "fee schedule", .. })
    ));
}

#[test]
fn partial_then_full_payment_activates_enrollment_and_posts_inflow() {
    let harness = harness();
    let (enrollment, invoice) = harness.invoiced_enrollment("alice@example.com");
    let billing = &harness.registrar.billing;

    let first = billing
        .record_payment(&invoice.id, payment(50_000))
        .expect("partial");
    assert_eq!(first.invoice.status, InvoiceStatus::Partial);
    assert!(!first.enrollment_activated);
    assert_eq!(
        harness
            .registrar
            .enrollments
            .find_enrollment_or_fail(&enrollment.id)
            .expect("enrollment")
            .status,
        EnrollmentStatus::Provisioned
    );

    let settled = billing
        .record_payment(&invoice.id, payment(125_000))
        .expect("settled");
    assert_eq!(settled.invoice.status, InvoiceStatus::Paid);
    assert_eq!(settled.invoice.paid_amount, settled.invoice.total_amount);
    assert!(settled.enrollment_activated);
    assert_eq!(
        harness
            .registrar
            .enrollments
            .find_enrollment_or_fail(&enrollment.id)
            .expect("enrollment")
            .status,
        EnrollmentStatus::Active
    );

    let inflow = settled.ledger_transaction.expect("ledger inflow");
    assert_eq!(inflow.amount, Money(125_000));
    assert_eq!(inflow.category, TransactionCategory::StudentPayment);
    assert_eq!(
        inflow.reference.as_ref().map(|reference| reference.reference_id.as_str()),
        Some(settled.payment.id.as_str())
    );

    let fund = harness
        .registrar
        .ledger
        .fund_by_name("TUITION_POOL")
        .expect("fund");
    assert_eq!(fund.balance, Money(175_000));
    assert_eq!(billing.payments(&invoice.id).expect("payments").len(), 2);
}

#[test]
fn payment_validation() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    let billing = &harness.registrar.billing;

    assert!(matches!(
        billing.record_payment(&invoice.id, payment(0)),
        Err(WorkflowError::BadRequest(_))
    ));
    match billing.record_payment(&invoice.id, payment(175_001)) {
        Err(WorkflowError::BadRequest(message)) => {
            assert!(message.contains("1750.01"));
            assert!(message.contains("1750.00"));
        }
        other => panic!("expected overpayment rejection, got {other:?}"),
    }

    billing
        .record_payment(&invoice.id, payment(175_000))
        .expect("paid in full");
    assert!(matches!(
        billing.record_payment(&invoice.id, payment(1)),
        Err(WorkflowError::BadRequest(_))
    ));
    assert!(matches!(
        billing.void_invoice(&invoice.id),
        Err(WorkflowError::Conflict(_))
    ));
}

#[test]
fn void_invoices_take_no_payments() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    let billing = &harness.registrar.billing;
    billing.void_invoice(&invoice.id).expect("voided");

    assert!(matches!(
        billing.record_payment(&invoice.id, payment(100)),
        Err(WorkflowError::BadRequest(_))
    ));
}

#[test]
fn paying_an_already_active_enrollment_leaves_it_alone() {
    let harness = harness();
    let (enrollment, invoice) = harness.invoiced_enrollment("alice@example.com");
    harness
        .registrar
        .enrollments
        .activate_enrollment(&enrollment.id)
        .expect("activated early");

    let receipt = harness
        .registrar
        .billing
        .record_payment(&invoice.id, payment(175_000))
        .expect("paid");
    assert!(!receipt.enrollment_activated);
}

#[test]
fn ledger_failure_keeps_payment_and_reconciliation_recovers() {
    let harness = harness_without_tuition_fund(policy());
    let billing = &harness.registrar.billing;
    let ledger = &harness.registrar.ledger;
    let (enrollment, invoice) = harness.invoiced_enrollment("alice@example.com");

    let receipt = billing
        .record_payment(&invoice.id, payment(175_000))
        .expect("payment survives the ledger failure");
    assert!(receipt.ledger_transaction.is_none());
    assert_eq!(receipt.invoice.status, InvoiceStatus::Paid);
    assert!(receipt.enrollment_activated);
    assert_eq!(
        harness
            .registrar
            .enrollments
            .find_enrollment_or_fail(&enrollment.id)
            .expect("enrollment")
            .status,
        EnrollmentStatus::Active
    );

    assert!(matches!(
        billing.reconcile_ledger(),
        Err(WorkflowError::NotFound { entity: "fund", .. })
    ));

    let fund = ledger.create_fund(&harness.tuition_fund).expect("fund");
    let posted = billing.reconcile_ledger().expect("reconciled");
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].amount, Money(175_000));
    assert_eq!(
        ledger.find_fund_or_fail(&fund.id).expect("fund").balance,
        Money(175_000)
    );

    assert!(billing.reconcile_ledger().expect("second pass").is_empty());
    assert!(ledger.reconcile(&fund.id).expect("books").is_balanced());
}

#[test]
fn concurrent_reconciliation_posts_each_payment_once() {
    let harness = harness_without_tuition_fund(policy());
    let billing = &harness.registrar.billing;
    let ledger = &harness.registrar.ledger;
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    for amount in [50_000, 125_000] {
        let receipt = billing
            .record_payment(&invoice.id, payment(amount))
            .expect("payment");
        assert!(receipt.ledger_transaction.is_none());
    }
    let fund = ledger.create_fund(&harness.tuition_fund).expect("fund");

    let posted: usize = thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| billing.reconcile_ledger().expect("reconciled").len()))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker"))
            .sum()
    });

    assert_eq!(posted, 2);
    assert_eq!(ledger.transactions(&fund.id).expect("journal").len(), 2);
    assert_eq!(
        ledger.find_fund_or_fail(&fund.id).expect("fund").balance,
        Money(175_000)
    );
}
