use std::sync::{Arc, OnceLock};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::access::{AccessDecision, AccessPolicy, RouteTable, SessionContext};
use super::domain::{
    ActivityAward, ApplicationId, ApplicationRequest, EventDraft, MediaUpload,
    RegistrationRequest, Role, UserId,
};
use super::repository::{
    ApplicationRepository, BlobStore, EventRepository, ModerationNotifier, RepositoryError,
    UserRepository,
};
use super::service::{CommunityService, IntakeError, ModerationError};
use super::status::{ApplicationDecision, VerificationDecision};

pub const SESSION_USER_HEADER: &str = "x-session-user";
pub const SESSION_ROLE_HEADER: &str = "x-session-role";
const PENDING_PAGE_SIZE: usize = 50;

/// Router builder exposing the member and admin endpoints behind the API access policy.
pub fn community_router<S, B, N>(service: Arc<CommunityService<S, B, N>>) -> Router
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    let policy = Arc::new(AccessPolicy::new(RouteTable::api()));

    Router::new()
        .route("/api/v1/access/decide", post(access_decide_handler))
        .route("/api/v1/register", post(register_handler::<S, B, N>))
        .route("/api/v1/me/eligibility", get(eligibility_handler::<S, B, N>))
        .route("/api/v1/me/verification", post(resubmit_handler::<S, B, N>))
        .route("/api/v1/me/events", get(discover_events_handler::<S, B, N>))
        .route(
            "/api/v1/ambassador/applications",
            post(submit_application_handler::<S, B, N>),
        )
        .route(
            "/api/v1/admin/verifications",
            get(pending_verifications_handler::<S, B, N>),
        )
        .route(
            "/api/v1/admin/verifications/:user_id",
            post(resolve_verification_handler::<S, B, N>),
        )
        .route(
            "/api/v1/admin/ambassadors",
            get(pending_applications_handler::<S, B, N>),
        )
        .route(
            "/api/v1/admin/ambassadors/:application_id",
            post(resolve_application_handler::<S, B, N>),
        )
        .route(
            "/api/v1/admin/ambassadors/:application_id/reconcile",
            post(reconcile_handler::<S, B, N>),
        )
        .route(
            "/api/v1/admin/activity/:user_id",
            post(record_activity_handler::<S, B, N>),
        )
        .route("/api/v1/admin/events", post(publish_event_handler::<S, B, N>))
        .route_layer(middleware::from_fn_with_state(policy, enforce_access))
        .with_state(service)
}

/// Session context as forwarded by the identity provider in front of the API.
/// An unknown role string is treated as a plain member.
pub fn session_from_headers(headers: &HeaderMap) -> SessionContext {
    let user_id = headers
        .get(SESSION_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()));
    let role = headers
        .get(SESSION_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or_default();

    SessionContext { user_id, role }
}

pub(crate) async fn enforce_access(
    State(policy): State<Arc<AccessPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let session = session_from_headers(request.headers());
    match policy.decide_for(request.uri().path(), &session) {
        AccessDecision::Allow => next.run(request).await,
        decision => decision_response(decision),
    }
}

/// HTTP rendering of a non-allow decision.
pub fn decision_response(decision: AccessDecision) -> Response {
    match decision.redirect_target() {
        Some(target) => (StatusCode::SEE_OTHER, [(header::LOCATION, target)]).into_response(),
        None if decision == AccessDecision::Deny => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin role required" })),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessQuery {
    pub(crate) path: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AccessDecisionView {
    pub(crate) path: String,
    pub(crate) decision: AccessDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) redirect: Option<&'static str>,
}

fn page_policy() -> &'static AccessPolicy {
    static POLICY: OnceLock<AccessPolicy> = OnceLock::new();
    POLICY.get_or_init(|| AccessPolicy::new(RouteTable::web()))
}

/// Decision for a frontend page path, evaluated fresh per navigation.
pub(crate) async fn access_decide_handler(
    headers: HeaderMap,
    Json(query): Json<AccessQuery>,
) -> Json<AccessDecisionView> {
    let session = session_from_headers(&headers);
    let decision = page_policy().decide_for(&query.path, &session);
    Json(AccessDecisionView {
        path: query.path,
        decision,
        redirect: decision.redirect_target(),
    })
}

fn session_user(headers: &HeaderMap) -> Result<UserId, Response> {
    session_from_headers(headers)
        .user_id
        .ok_or_else(|| decision_response(AccessDecision::RedirectToLogin))
}

pub(crate) async fn register_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    headers: HeaderMap,
    Json(request): Json<RegistrationRequest>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    let user_id = match session_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match service.register(&user_id, request) {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn eligibility_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    let user_id = match session_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match service.eligibility(&user_id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resubmit_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    headers: HeaderMap,
    Json(college_id): Json<MediaUpload>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    let user_id = match session_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match service.resubmit_verification(&user_id, college_id) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn submit_application_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    headers: HeaderMap,
    Json(request): Json<ApplicationRequest>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    let user_id = match session_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match service.submit_application(&user_id, request) {
        Ok(application) => (StatusCode::ACCEPTED, Json(application)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn discover_events_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    let user_id = match session_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match service.discover_events(&user_id, Utc::now()) {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn publish_event_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    Json(draft): Json<EventDraft>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.publish_event(draft) {
        Ok(event) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationDecisionBody {
    pub(crate) decision: VerificationDecision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplicationDecisionBody {
    pub(crate) decision: ApplicationDecision,
}

pub(crate) async fn pending_verifications_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.pending_verifications(PENDING_PAGE_SIZE) {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resolve_verification_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    Path(user_id): Path<String>,
    Json(body): Json<VerificationDecisionBody>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.resolve_verification(&UserId(user_id), body.decision) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn pending_applications_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.pending_applications(PENDING_PAGE_SIZE) {
        Ok(applications) => (StatusCode::OK, Json(applications)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resolve_application_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    Path(application_id): Path<String>,
    Json(body): Json<ApplicationDecisionBody>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.resolve_application(&ApplicationId(application_id), body.decision) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn reconcile_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.reconcile_role_grant(&ApplicationId(application_id)) {
        Ok(grant) => (StatusCode::OK, Json(json!({ "role_grant": grant }))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn record_activity_handler<S, B, N>(
    State(service): State<Arc<CommunityService<S, B, N>>>,
    Path(user_id): Path<String>,
    Json(award): Json<ActivityAward>,
) -> Response
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    match service.record_activity(&UserId(user_id), award) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::Conflict => StatusCode::CONFLICT,
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let (status, payload) = match &self {
            ModerationError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            ModerationError::InvalidTransition(err) => (
                StatusCode::CONFLICT,
                json!({
                    "error": self.to_string(),
                    "record_id": err.record_id,
                    "current": err.current,
                    "attempted": err.attempted,
                }),
            ),
            ModerationError::NotApproved { .. } => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            ModerationError::PartialFailure {
                application_id,
                failed_write,
                ..
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": self.to_string(),
                    "application_id": application_id,
                    "failed_write": failed_write,
                }),
            ),
            ModerationError::Repository(err) => {
                (repository_status(err), json!({ "error": self.to_string() }))
            }
        };
        (status, Json(payload)).into_response()
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let (status, payload) = match &self {
            IntakeError::Invalid(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string() }),
            ),
            IntakeError::NotEligible(report) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string(), "eligibility": report }),
            ),
            IntakeError::UserNotFound(_) => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            IntakeError::Conflict { reason, .. } => (
                StatusCode::CONFLICT,
                json!({ "error": self.to_string(), "reason": reason }),
            ),
            IntakeError::InvalidTransition(_) => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            IntakeError::IdsExhausted { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": self.to_string() }),
            ),
            IntakeError::Repository(err) => {
                (repository_status(err), json!({ "error": self.to_string() }))
            }
            IntakeError::Blob(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": self.to_string() }),
            ),
        };
        (status, Json(payload)).into_response()
    }
}
