use crate::infra::build_registrar;
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use registrar::clock::FixedClock;
use registrar::config::PolicyConfig;
use registrar::error::AppError;
use registrar::integrations::{MemoryBlobStore, RecordingLms, RecordingNotifier};
use registrar::workflows::admissions::{
    DocumentStatus, DocumentType, InquirySource, InquiryStatus, NewInquiry,
};
use registrar::workflows::finance::{Money, PaymentMethod, PaymentRequest};
use registrar::workflows::{Collaborators, Registrar, WorkflowError};
use std::sync::Arc;

const OFFICER: &str = "admissions-officer";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date (YYYY-MM-DD); sets the identifier year. Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let policy = PolicyConfig::default();
    let notifier = Arc::new(RecordingNotifier::default());
    let lms = Arc::new(RecordingLms::default());
    let (registrar, worker) = build_registrar(
        &policy,
        Collaborators {
            notifier: notifier.clone(),
            blobs: Arc::new(MemoryBlobStore::default()),
            lms: lms.clone(),
            clock: Arc::new(FixedClock::at_date(today)),
        },
    )?;

    println!("Registrar demo ({today})");
    let catalog = seed_catalog(&registrar, today)?;

    println!("\n1. Inquiry intake");
    let inquiry = registrar.inquiries.submit(NewInquiry {
        name: "Alice Liddell".to_string(),
        email: "alice@example.com".to_string(),
        phone: None,
        program_id: catalog.program.clone(),
        source: InquirySource::Website,
    })?;
    println!("- {} received from {} ({})", inquiry.id, inquiry.email, inquiry.status.label());
    let duplicate = registrar.inquiries.submit(NewInquiry {
        name: "Alice L.".to_string(),
        email: "Alice@Example.com".to_string(),
        phone: None,
        program_id: catalog.program.clone(),
        source: InquirySource::Referral,
    });
    report_refusal("second inquiry for the same address", duplicate);

    println!("\n2. Conversion");
    registrar
        .inquiries
        .change_status(&inquiry.id, InquiryStatus::Contacted, OFFICER)?;
    let batch = format!("FALL-{}", today.year() + 1);
    let application = registrar
        .inquiries
        .convert(&inquiry.id, &catalog.program, &batch, OFFICER)?;
    println!(
        "- {} converted into application {} ({}, batch {})",
        inquiry.id,
        application.id,
        application.status.label(),
        application.batch_id
    );
    for note in registrar.inquiries.notes(&inquiry.id)? {
        println!("  note by {}: {}", note.actor_id, note.text);
    }

    println!("\n3. Review and acceptance");
    let applications = &registrar.applications;
    applications.submit(&application.id)?;
    applications.move_to_review(&application.id)?;
    let transcript = applications.attach_document(
        &application.id,
        DocumentType::Transcript,
        "transcript.pdf",
        b"%PDF-1.7 transcript",
    )?;
    applications.review_document(&transcript.id, DocumentStatus::Approved)?;
    report_refusal("accept with one approved document", applications.accept(&application.id));
    let passport = applications.attach_document(
        &application.id,
        DocumentType::IdentityDocument,
        "passport.pdf",
        b"%PDF-1.7 passport",
    )?;
    applications.review_document(&passport.id, DocumentStatus::Approved)?;
    let accepted = applications.accept(&application.id)?;
    println!("- {} is {}", accepted.id, accepted.status.label());

    println!("\n4. Provisioning");
    report_refusal(
        "provision before a semester is active",
        registrar.enrollments.provision_student(&application.id),
    );
    registrar.catalog.activate_semester(&catalog.semester)?;
    let provisioned = registrar.enrollments.provision_student(&application.id)?;
    println!(
        "- student {} provisioned with enrollment {}",
        provisioned.profile.student_number, provisioned.enrollment.id
    );
    report_refusal(
        "provision the same person twice",
        registrar.enrollments.provision_student(&application.id),
    );

    println!("\n5. Billing");
    registrar.billing.add_fee(
        &catalog.program,
        &catalog.semester,
        "Tuition",
        Money(150_000),
    )?;
    registrar
        .billing
        .add_fee(&catalog.program, &catalog.semester, "Lab fee", Money(25_000))?;
    let invoice = registrar
        .billing
        .generate_invoice(&provisioned.enrollment.id)?;
    println!(
        "- invoice {} for {} due {}",
        invoice.id, invoice.total_amount, invoice.due_date
    );
    for amount in [Money(50_000), Money(125_000)] {
        let receipt = registrar.billing.record_payment(
            &invoice.id,
            PaymentRequest {
                amount,
                method: PaymentMethod::BankTransfer,
                reference: None,
                notes: None,
            },
        )?;
        println!(
            "- paid {}: invoice {} ({} of {})",
            amount,
            receipt.invoice.status.label(),
            receipt.invoice.paid_amount,
            receipt.invoice.total_amount
        );
    }
    let enrollment = registrar
        .enrollments
        .find_enrollment_or_fail(&provisioned.enrollment.id)?;
    println!("- enrollment is now {}", enrollment.status.label());
    if let Some(fund) = registrar.ledger.fund_by_name(&policy.tuition_fund) {
        let reconciliation = registrar.ledger.reconcile(&fund.id)?;
        println!(
            "- {} balance {} across {} transactions (balanced: {})",
            fund.name,
            fund.balance,
            reconciliation.transaction_count,
            reconciliation.is_balanced()
        );
    }

    println!("\n6. Registration");
    let rival = second_active_student(&registrar, &catalog, &batch)?;
    let seminar = registrar
        .enrollments
        .register_for_courses(&enrollment.id, &[catalog.seminar.clone()])?;
    println!("- {} holds the only seminar seat", seminar[0].enrollment_id);
    report_refusal(
        "second student takes the seminar",
        registrar
            .enrollments
            .register_for_courses(&rival, &[catalog.seminar.clone()]),
    );

    let delivered = worker.drain();
    println!(
        "\nSide effects: {delivered} delivered | {} notifications | {} LMS students | {} LMS offerings",
        notifier.sent().len(),
        lms.provisioned().len(),
        lms.synced().len()
    );
    Ok(())
}

struct DemoCatalog {
    program: registrar::workflows::academic::ProgramId,
    semester: registrar::workflows::academic::SemesterId,
    seminar: registrar::workflows::academic::OfferingId,
}

fn seed_catalog(registrar: &Registrar, today: NaiveDate) -> Result<DemoCatalog, WorkflowError> {
    let catalog = &registrar.catalog;
    let department = catalog.add_department("CS", "Computer Science")?;
    let program = catalog.add_program("BSCS", "BSc Computer Science", &department.id)?;
    let semester = catalog.add_semester(
        &format!("Fall {}", today.year()),
        today,
        today + chrono::Duration::days(110),
    )?;
    let course = catalog.add_course("CS150", "First-year seminar", 2)?;
    let seminar = catalog.add_offering(&course.id, &semester.id, 1, Some("faculty-12"))?;
    println!(
        "- seeded {} / {} / {} with {} ({} seat)",
        department.code, program.code, semester.name, course.code, seminar.capacity
    );
    Ok(DemoCatalog {
        program: program.id,
        semester: semester.id,
        seminar: seminar.id,
    })
}

/// A second applicant, fast-tracked to an active enrollment.
fn second_active_student(
    registrar: &Registrar,
    catalog: &DemoCatalog,
    batch: &str,
) -> Result<registrar::workflows::academic::EnrollmentId, WorkflowError> {
    let person = registrar
        .people
        .register("Bob", "Hatter", Some("bob@example.com"))?;
    let applications = &registrar.applications;
    let application = applications.create(&person.id, &catalog.program, batch)?;
    applications.submit(&application.id)?;
    applications.move_to_review(&application.id)?;
    for filename in ["transcript.pdf", "passport.pdf"] {
        let document = applications.attach_document(
            &application.id,
            DocumentType::Transcript,
            filename,
            b"%PDF-1.7",
        )?;
        applications.review_document(&document.id, DocumentStatus::Approved)?;
    }
    applications.accept(&application.id)?;
    let provisioned = registrar.enrollments.provision_student(&application.id)?;
    let enrollment = registrar
        .enrollments
        .activate_enrollment(&provisioned.enrollment.id)?;
    Ok(enrollment.id)
}

fn report_refusal<T>(attempt: &str, outcome: Result<T, WorkflowError>) {
    match outcome {
        Ok(_) => println!("- {attempt}: unexpectedly allowed"),
        Err(err) => println!("- {attempt}: refused ({err})"),
    }
}
