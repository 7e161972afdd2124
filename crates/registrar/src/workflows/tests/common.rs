use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::FixedClock;
use crate::config::PolicyConfig;
use crate::integrations::{MemoryBlobStore, OutboxWorker, RecordingLms, RecordingNotifier};
use crate::workflows::academic::domain::{
    Course, CourseOffering, Department, Enrollment, Program, Semester,
};
use crate::workflows::admissions::domain::{
    Application, DocumentStatus, DocumentType, InquirySource,
};
use crate::workflows::admissions::NewInquiry;
use crate::workflows::finance::domain::{Invoice, Money};
use crate::workflows::{Collaborators, Registrar};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid date")
}

pub(super) fn policy() -> PolicyConfig {
    PolicyConfig::default()
}

pub(super) struct Harness {
    pub registrar: Registrar,
    pub worker: OutboxWorker,
    pub notifier: Arc<RecordingNotifier>,
    pub blobs: Arc<MemoryBlobStore>,
    pub lms: Arc<RecordingLms>,
    pub department: Department,
    pub program: Program,
    pub semester: Semester,
    pub tuition_fund: String,
}

/// A registrar on a fixed clock with one department, program, and (inactive)
/// semester, plus the tuition fund.
pub(super) fn harness() -> Harness {
    harness_with(policy())
}

pub(super) fn harness_with(policy: PolicyConfig) -> Harness {
    let harness = harness_without_tuition_fund(policy);
    harness
        .registrar
        .ledger
        .create_fund(&harness.tuition_fund)
        .expect("tuition fund");
    harness
}

/// Same seed, but payments have no fund to post to until the test opens one.
pub(super) fn harness_without_tuition_fund(policy: PolicyConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let blobs = Arc::new(MemoryBlobStore::default());
    let lms = Arc::new(RecordingLms::default());
    let (registrar, worker) = Registrar::new(
        &policy,
        Collaborators {
            notifier: notifier.clone(),
            blobs: blobs.clone(),
            lms: lms.clone(),
            clock: Arc::new(FixedClock::at_date(today())),
        },
    );

    let department = registrar
        .catalog
        .add_department("CS", "Computer Science")
        .expect("department");
    let program = registrar
        .catalog
        .add_program("BSCS", "BSc Computer Science", &department.id)
        .expect("program");
    let semester = registrar
        .catalog
        .add_semester(
            "Fall 2025",
            today(),
            NaiveDate::from_ymd_opt(2025, 12, 19).expect("valid date"),
        )
        .expect("semester");

    Harness {
        registrar,
        worker,
        notifier,
        blobs,
        lms,
        department,
        program,
        semester,
        tuition_fund: policy.tuition_fund,
    }
}

pub(super) fn new_inquiry(harness: &Harness, email: &str) -> NewInquiry {
    NewInquiry {
        name: "Alice Liddell".to_string(),
        email: email.to_string(),
        phone: Some("+44 20 7946 0000".to_string()),
        program_id: harness.program.id.clone(),
        source: InquirySource::Website,
    }
}

impl Harness {
    pub fn activate_semester(&self) {
        self.registrar
            .catalog
            .activate_semester(&self.semester.id)
            .expect("semester activates");
    }

    /// A submitted application, under review, for a freshly registered person.
    pub fn application_under_review(&self, email: &str) -> Application {
        let person = self
            .registrar
            .people
            .register("Alice", "Liddell", Some(email))
            .expect("person");
        let applications = &self.registrar.applications;
        let application = applications
            .create(&person.id, &self.program.id, "FALL-2025")
            .expect("draft");
        applications.submit(&application.id).expect("submitted");
        applications
            .move_to_review(&application.id)
            .expect("under review")
    }

    /// Attaches and approves `count` documents.
    pub fn approve_documents(&self, application: &Application, count: usize) {
        for index in 0..count {
            let document = self
                .registrar
                .applications
                .attach_document(
                    &application.id,
                    DocumentType::Transcript,
                    &format!("transcript-{index}.pdf"),
                    b"%PDF-1.7",
                )
                .expect("attached");
            self.registrar
                .applications
                .review_document(&document.id, DocumentStatus::Approved)
                .expect("approved");
        }
    }

    pub fn accepted_application(&self, email: &str) -> Application {
        let application = self.application_under_review(email);
        self.approve_documents(&application, policy().min_approved_documents);
        self.registrar
            .applications
            .accept(&application.id)
            .expect("accepted")
    }

    /// Accepted, provisioned, but not yet paid.
    pub fn provisioned_enrollment(&self, email: &str) -> Enrollment {
        self.activate_semester();
        let application = self.accepted_application(email);
        self.registrar
            .enrollments
            .provision_student(&application.id)
            .expect("provisioned")
            .enrollment
    }

    pub fn active_enrollment(&self, email: &str) -> Enrollment {
        let enrollment = self.provisioned_enrollment(email);
        self.registrar
            .enrollments
            .activate_enrollment(&enrollment.id)
            .expect("activated")
    }

    pub fn course(&self, code: &str, capacity: u32) -> (Course, CourseOffering) {
        let course = self
            .registrar
            .catalog
            .add_course(code, &format!("{code} lecture"), 3)
            .expect("course");
        let offering = self
            .registrar
            .catalog
            .add_offering(&course.id, &self.semester.id, capacity, Some("staff-7"))
            .expect("offering");
        (course, offering)
    }

    /// Tuition of 1,500.00 and a 250.00 lab fee for the seeded program.
    pub fn seed_fees(&self) {
        let billing = &self.registrar.billing;
        billing
            .add_fee(&self.program.id, &self.semester.id, "Tuition", Money(150_000))
            .expect("tuition fee");
        billing
            .add_fee(&self.program.id, &self.semester.id, "Lab fee", Money(25_000))
            .expect("lab fee");
    }

    pub fn invoiced_enrollment(&self, email: &str) -> (Enrollment, Invoice) {
        self.seed_fees();
        let enrollment = self.provisioned_enrollment(email);
        let invoice = self
            .registrar
            .billing
            .generate_invoice(&enrollment.id)
            .expect("invoice");
        (enrollment, invoice)
    }
}
