use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{delete, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CourseId, DepartmentId, EnrollmentId, EnrollmentStatus, OfferingId, RegistrationId,
    SemesterId,
};
use crate::workflows::admissions::domain::ApplicationId;
use crate::workflows::http::{respond, ApiState};

const CATALOG: &str = "academic.write";
const ENROLLMENT: &str = "academic.enrollment.write";

#[derive(Debug, Deserialize)]
pub(crate) struct NewDepartment {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewProgram {
    code: String,
    name: String,
    department_id: DepartmentId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewSemester {
    name: String,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewCourse {
    code: String,
    title: String,
    credit_hours: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewOffering {
    course_id: CourseId,
    semester_id: SemesterId,
    capacity: u32,
    #[serde(default)]
    instructor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewPrerequisite {
    prerequisite_id: CourseId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollmentStatusChange {
    status: EnrollmentStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationRequest {
    offering_ids: Vec<OfferingId>,
}

/// Catalog maintenance, provisioning, and course registration routes.
pub fn academic_router() -> Router<ApiState> {
    Router::new()
        .route("/api/v1/departments", post(add_department))
        .route("/api/v1/programs", post(add_program))
        .route("/api/v1/semesters", post(add_semester))
        .route("/api/v1/semesters/:id/activate", post(activate_semester))
        .route("/api/v1/courses", post(add_course))
        .route("/api/v1/courses/:id/prerequisites", post(add_prerequisite))
        .route(
            "/api/v1/courses/:id/prerequisites/:prerequisite_id",
            delete(remove_prerequisite),
        )
        .route("/api/v1/offerings", post(add_offering))
        .route("/api/v1/applications/:id/provision", post(provision_student))
        .route("/api/v1/enrollments/:id/activate", post(activate_enrollment))
        .route("/api/v1/enrollments/:id/status", post(update_enrollment_status))
        .route(
            "/api/v1/enrollments/:id/registrations",
            post(register_for_courses).get(list_registrations),
        )
        .route("/api/v1/registrations/:id/drop", post(drop_registration))
        .route("/api/v1/registrations/:id/complete", post(complete_registration))
}

pub(crate) async fn add_department(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewDepartment>,
) -> Response {
    let result = state
        .authorize(&headers, CATALOG)
        .and_then(|_| state.registrar.catalog.add_department(&request.code, &request.name));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn add_program(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewProgram>,
) -> Response {
    let result = state.authorize(&headers, CATALOG).and_then(|_| {
        state
            .registrar
            .catalog
            .add_program(&request.code, &request.name, &request.department_id)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn add_semester(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewSemester>,
) -> Response {
    let result = state.authorize(&headers, CATALOG).and_then(|_| {
        state
            .registrar
            .catalog
            .add_semester(&request.name, request.starts_on, request.ends_on)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn activate_semester(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, CATALOG)
        .and_then(|_| state.registrar.catalog.activate_semester(&SemesterId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_course(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewCourse>,
) -> Response {
    let result = state.authorize(&headers, CATALOG).and_then(|_| {
        state
            .registrar
            .catalog
            .add_course(&request.code, &request.title, request.credit_hours)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn add_prerequisite(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<NewPrerequisite>,
) -> Response {
    let course = CourseId(id);
    let result = state.authorize(&headers, CATALOG).and_then(|_| {
        state
            .registrar
            .prerequisites
            .add_edge(&course, &request.prerequisite_id)?;
        Ok(json!({
            "course_id": course,
            "prerequisites": state.registrar.prerequisites.prerequisites_of(&course),
        }))
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn remove_prerequisite(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((id, prerequisite_id)): Path<(String, String)>,
) -> Response {
    let course = CourseId(id);
    let result = state.authorize(&headers, CATALOG).map(|_| {
        state
            .registrar
            .prerequisites
            .remove_edge(&course, &CourseId(prerequisite_id));
        json!({
            "course_id": course,
            "prerequisites": state.registrar.prerequisites.prerequisites_of(&course),
        })
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_offering(
    State(state): State<ApiState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewOffering>,
) -> Response {
    let result = state.authorize(&headers, CATALOG).and_then(|_| {
        state.registrar.catalog.add_offering(
            &request.course_id,
            &request.semester_id,
            request.capacity,
            request.instructor_id.as_deref(),
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn provision_student(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, ENROLLMENT)
        .and_then(|_| state.registrar.enrollments.provision_student(&ApplicationId(id)));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn activate_enrollment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, ENROLLMENT)
        .and_then(|_| state.registrar.enrollments.activate_enrollment(&EnrollmentId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn update_enrollment_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<EnrollmentStatusChange>,
) -> Response {
    let result = state.authorize(&headers, ENROLLMENT).and_then(|_| {
        state
            .registrar
            .enrollments
            .update_status(&EnrollmentId(id), request.status)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn register_for_courses(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<RegistrationRequest>,
) -> Response {
    let result = state.authorize(&headers, ENROLLMENT).and_then(|_| {
        state
            .registrar
            .enrollments
            .register_for_courses(&EnrollmentId(id), &request.offering_ids)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_registrations(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, ENROLLMENT)
        .and_then(|_| state.registrar.enrollments.registrations(&EnrollmentId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn drop_registration(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, ENROLLMENT)
        .and_then(|_| state.registrar.enrollments.drop_registration(&RegistrationId(id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn complete_registration(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .authorize(&headers, ENROLLMENT)
        .and_then(|_| state.registrar.enrollments.complete_registration(&RegistrationId(id)));
    respond(StatusCode::OK, result)
}
