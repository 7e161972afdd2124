use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::integrations::StaticPermissions;
use crate::workflows::finance::webhook::sign;
use crate::workflows::finance::{PaymentWebhook, SIGNATURE_HEADER};
use crate::workflows::{router, Registrar, ACTOR_HEADER};

const SECRET: &str = "whsec_routes";

struct Api {
    router: Router,
    registrar: Arc<Registrar>,
    program_id: String,
    semester_id: String,
    department_id: String,
}

fn api(harness: Harness) -> Api {
    let program_id = harness.program.id.to_string();
    let semester_id = harness.semester.id.to_string();
    let department_id = harness.department.id.to_string();
    let registrar = Arc::new(harness.registrar);
    let permissions = StaticPermissions::new()
        .grant("admissions-officer", &["admissions.write", "admissions.read"])
        .grant("registrar-clerk", &["academic.write", "academic.enrollment.write"])
        .grant("bursar", &["finance.write"]);
    let webhook = PaymentWebhook::new(Arc::clone(&registrar.billing), Some(SECRET));
    Api {
        router: router(
            Arc::clone(&registrar),
            Arc::new(permissions),
            Arc::new(webhook),
        ),
        registrar,
        program_id,
        semester_id,
        department_id,
    }
}

fn json_request(method: &str, uri: &str, actor: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("json")))
        .expect("request")
}

fn get(uri: &str, actor: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder.body(Body::empty()).expect("request")
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn inquiry_body(api: &Api, email: &str) -> Value {
    json!({
        "name": "Alice Liddell",
        "email": email,
        "program_id": api.program_id,
        "source": "WEBSITE",
    })
}

#[tokio::test]
async fn public_inquiry_intake_rejects_duplicates() {
    let api = api(harness());

    let created = api
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/inquiries",
            None,
            inquiry_body(&api, "alice@example.com"),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let inquiry = body_json(created).await;
    assert_eq!(inquiry["status"], "NEW");

    let duplicate = api
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/inquiries",
            None,
            inquiry_body(&api, "ALICE@example.com"),
        ))
        .await
        .expect("response");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let error = body_json(duplicate).await;
    assert!(error["error"]
        .as_str()
        .is_some_and(|message| message.contains("alice@example.com")));
}

#[tokio::test]
async fn staff_routes_check_the_actor_and_permission() {
    let api = api(harness());
    let inquiry = api
        .registrar
        .inquiries
        .submit(new_inquiry_for(&api, "alice@example.com"))
        .expect("inquiry");
    let uri = format!("/api/v1/inquiries/{}", inquiry.id);

    let anonymous = api
        .router
        .clone()
        .oneshot(get(&uri, None))
        .await
        .expect("response");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let bursar = api
        .router
        .clone()
        .oneshot(get(&uri, Some("bursar")))
        .await
        .expect("response");
    assert_eq!(bursar.status(), StatusCode::UNAUTHORIZED);

    let officer = api
        .router
        .clone()
        .oneshot(get(&uri, Some("admissions-officer")))
        .await
        .expect("response");
    assert_eq!(officer.status(), StatusCode::OK);
    assert_eq!(body_json(officer).await["email"], "alice@example.com");

    let missing = api
        .router
        .clone()
        .oneshot(get("/api/v1/inquiries/inq-999999", Some("admissions-officer")))
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notes_record_the_acting_staff_member() {
    let api = api(harness());
    let inquiry = api
        .registrar
        .inquiries
        .submit(new_inquiry_for(&api, "alice@example.com"))
        .expect("inquiry");

    let response = api
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/inquiries/{}/notes", inquiry.id),
            Some("admissions-officer"),
            json!({ "text": "Called back, interested in the spring intake" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["id"], inquiry.id.to_string());

    let listing = api
        .router
        .clone()
        .oneshot(get(
            &format!("/api/v1/inquiries/{}/notes", inquiry.id),
            Some("admissions-officer"),
        ))
        .await
        .expect("response");
    assert_eq!(listing.status(), StatusCode::OK);
    let notes = body_json(listing).await;
    let note = notes
        .as_array()
        .and_then(|notes| notes.last())
        .expect("note listed");
    assert_eq!(note["actor_id"], "admissions-officer");
    assert_eq!(note["text"], "Called back, interested in the spring intake");
    assert_eq!(note["system_generated"], false);
}

#[tokio::test]
async fn catalog_routes_validate_input() {
    let api = api(harness());

    let program = api
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/programs",
            Some("registrar-clerk"),
            json!({
                "code": "MSCS",
                "name": "MSc Computer Science",
                "department_id": api.department_id,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(program.status(), StatusCode::CREATED);

    let activated = api
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/semesters/{}/activate", api.semester_id),
            Some("registrar-clerk"),
            json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(activated.status(), StatusCode::OK);
    assert_eq!(body_json(activated).await["is_active"], true);

    let duplicate = api
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/departments",
            Some("registrar-clerk"),
            json!({ "code": "cs", "name": "Computing" }),
        ))
        .await
        .expect("response");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn payment_webhook_requires_a_valid_signature() {
    let harness = harness();
    let (_, invoice) = harness.invoiced_enrollment("alice@example.com");
    let api = api(harness);
    let payload = serde_json::to_vec(&json!({
        "invoice_id": invoice.id,
        "amount": 175_000,
        "status": "success",
        "method": "card",
    }))
    .expect("json");

    let webhook = |signature: String| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/webhooks/payments")
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(payload.clone()))
            .expect("request")
    };

    let forged = api
        .router
        .clone()
        .oneshot(webhook(sign("guess", &payload)))
        .await
        .expect("response");
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let accepted = api
        .router
        .clone()
        .oneshot(webhook(sign(SECRET, &payload)))
        .await
        .expect("response");
    assert_eq!(accepted.status(), StatusCode::OK);
    let outcome = body_json(accepted).await;
    assert_eq!(outcome["outcome"], "recorded");
    assert_eq!(outcome["receipt"]["invoice"]["status"], "PAID");
    assert_eq!(outcome["receipt"]["enrollment_activated"], true);
}

fn new_inquiry_for(api: &Api, email: &str) -> crate::workflows::admissions::NewInquiry {
    serde_json::from_value(inquiry_body(api, email)).expect("inquiry request")
}
