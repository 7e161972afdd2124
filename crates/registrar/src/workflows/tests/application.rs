use std::time::Duration;

use super::common::*;
use crate::config::PolicyConfig;
use crate::integrations::NotificationKind;
use crate::workflows::admissions::domain::{ApplicationStatus, DocumentStatus, DocumentType};
use crate::workflows::WorkflowError;

#[test]
fn draft_can_only_be_submitted() {
    let harness = harness();
    let person = harness
        .registrar
        .people
        .register("Dana", "Scully", Some("dana@example.com"))
        .expect("person");
    let applications = &harness.registrar.applications;
    let draft = applications
        .create(&person.id, &harness.program.id, "FALL-2025")
        .expect("draft");
    assert_eq!(draft.status, ApplicationStatus::Draft);

    for target in [
        ApplicationStatus::UnderReview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Waitlisted,
    ] {
        assert!(matches!(
            applications.change_status(&draft.id, target),
            Err(WorkflowError::Conflict(_))
        ));
    }

    let submitted = applications.submit(&draft.id).expect("submitted");
    assert_eq!(submitted.status, ApplicationStatus::Submitted);
    assert!(submitted.submitted_at.is_some());
    assert!(submitted.reviewed_at.is_none());
}

#[test]
fn applications_never_return_to_draft() {
    let harness = harness();
    let application = harness.application_under_review("dana@example.com");
    assert!(matches!(
        harness
            .registrar
            .applications
            .change_status(&application.id, ApplicationStatus::Draft),
        Err(WorkflowError::Conflict(_))
    ));
}

#[test]
fn acceptance_requires_approved_documents() {
    let harness = harness();
    let applications = &harness.registrar.applications;
    let application = harness.application_under_review("alice@example.com");
    harness.approve_documents(&application, 1);

    let err = applications.accept(&application.id).expect_err("gate holds");
    match err {
        WorkflowError::Conflict(message) => assert!(
            message.contains("1/2 approved documents"),
            "unexpected message: {message}"
        ),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(
        applications.find_or_fail(&application.id).expect("app").status,
        ApplicationStatus::UnderReview
    );

    harness.approve_documents(&application, 1);
    let accepted = applications.accept(&application.id).expect("accepted");
    assert_eq!(accepted.status, ApplicationStatus::Accepted);
    assert!(accepted.reviewed_at.is_some());
}

#[test]
fn rejected_documents_do_not_count() {
    let harness = harness();
    let applications = &harness.registrar.applications;
    let application = harness.application_under_review("alice@example.com");
    harness.approve_documents(&application, 1);
    let rejected = applications
        .attach_document(&application.id, DocumentType::Photo, "me.jpg", b"jpeg")
        .expect("attached");
    applications
        .review_document(&rejected.id, DocumentStatus::Rejected)
        .expect("reviewed");

    assert_eq!(
        applications
            .approved_document_count(&application.id)
            .expect("count"),
        1
    );
    assert!(applications.accept(&application.id).is_err());
}

#[test]
fn threshold_follows_policy() {
    let harness = harness_with(PolicyConfig {
        min_approved_documents: 3,
        ..PolicyConfig::default()
    });
    let application = harness.application_under_review("alice@example.com");
    harness.approve_documents(&application, 2);

    let err = harness
        .registrar
        .applications
        .accept(&application.id)
        .expect_err("three required");
    assert!(err.to_string().contains("2/3"));
}

#[test]
fn terminal_statuses_are_final() {
    let harness = harness();
    let applications = &harness.registrar.applications;

    let accepted = harness.accepted_application("alice@example.com");
    for target in [
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Waitlisted,
        ApplicationStatus::UnderReview,
    ] {
        assert!(matches!(
            applications.change_status(&accepted.id, target),
            Err(WorkflowError::Conflict(_))
        ));
    }

    let rejected = harness.application_under_review("bob@example.com");
    applications.reject(&rejected.id).expect("rejected");
    assert!(matches!(
        applications.accept(&rejected.id),
        Err(WorkflowError::Conflict(_))
    ));
}

#[test]
fn waitlisted_applications_can_still_be_decided() {
    let harness = harness();
    let applications = &harness.registrar.applications;
    let application = harness.application_under_review("alice@example.com");

    let waitlisted = applications.waitlist(&application.id).expect("waitlisted");
    let reviewed_at = waitlisted.reviewed_at.expect("reviewed");

    harness.approve_documents(&application, 2);
    let accepted = applications.accept(&application.id).expect("accepted");
    assert_eq!(accepted.reviewed_at, Some(reviewed_at));
}

#[test]
fn same_status_is_a_no_op() {
    let harness = harness();
    let application = harness.application_under_review("alice@example.com");
    let again = harness
        .registrar
        .applications
        .move_to_review(&application.id)
        .expect("no-op");
    assert_eq!(again, application);
}

#[test]
fn acceptance_queues_notification_after_commit() {
    let harness = harness();
    let application = harness.accepted_application("alice@example.com");

    assert!(harness.notifier.sent().is_empty());
    harness.worker.drain();

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::ApplicationAccepted);
    assert_eq!(sent[0].recipient, "alice@example.com");
    assert_eq!(
        sent[0].template_data.get("name").map(String::as_str),
        Some("Alice Liddell")
    );
    assert_eq!(
        sent[0].template_data.get("application_id").map(String::as_str),
        Some(application.id.as_str())
    );
}

#[test]
fn notification_failure_keeps_acceptance() {
    let harness = harness();
    harness.notifier.set_failing(true);
    let application = harness.accepted_application("alice@example.com");
    harness.worker.drain();

    assert_eq!(
        harness
            .registrar
            .applications
            .find_or_fail(&application.id)
            .expect("app")
            .status,
        ApplicationStatus::Accepted
    );
}

#[test]
fn documents_are_stored_in_blob_storage() {
    let harness = harness();
    let applications = &harness.registrar.applications;
    let application = harness.application_under_review("alice@example.com");

    let document = applications
        .attach_document(
            &application.id,
            DocumentType::IdentityDocument,
            "passport scan.png",
            b"png-bytes",
        )
        .expect("attached");
    assert_eq!(document.status, DocumentStatus::PendingReview);
    assert!(document.file_key.ends_with("passport_scan.png"));
    assert_eq!(
        harness.blobs.contents(&document.file_key),
        Some(b"png-bytes".to_vec())
    );

    let url = applications
        .document_url(&document.id, Duration::from_secs(300))
        .expect("signed url");
    assert!(url.contains("expires_in=300"));
    assert_eq!(applications.documents(&application.id).expect("docs").len(), 1);
}

#[test]
fn document_rules() {
    let harness = harness();
    let applications = &harness.registrar.applications;
    let application = harness.application_under_review("alice@example.com");

    assert!(matches!(
        applications.attach_document(&application.id, DocumentType::Other, "empty.txt", b""),
        Err(WorkflowError::BadRequest(_))
    ));

    let document = applications
        .attach_document(&application.id, DocumentType::Other, "cv.pdf", b"pdf")
        .expect("attached");
    assert!(matches!(
        applications.review_document(&document.id, DocumentStatus::PendingReview),
        Err(WorkflowError::BadRequest(_))
    ));

    harness.approve_documents(&application, 2);
    applications.accept(&application.id).expect("accepted");
    assert!(matches!(
        applications.attach_document(&application.id, DocumentType::Other, "late.pdf", b"pdf"),
        Err(WorkflowError::Conflict(_))
    ));
    assert!(matches!(
        applications.review_document(&document.id, DocumentStatus::Rejected),
        Err(WorkflowError::Conflict(_))
    ));
}
