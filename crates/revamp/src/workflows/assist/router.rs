use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::{
    extract_luma_event, suggest_security_rules, AssistError, GenerationError,
    SecurityRulesRequest, TextGenerator,
};
use crate::workflows::membership::access::{AccessPolicy, RouteTable};
use crate::workflows::membership::router::enforce_access;

/// Admin-only assist endpoints. Generation runs on the blocking pool.
pub fn assist_router<G>(generator: Arc<G>) -> Router
where
    G: TextGenerator + 'static,
{
    let policy = Arc::new(AccessPolicy::new(RouteTable::api()));

    Router::new()
        .route(
            "/api/v1/admin/assist/security-rules",
            post(security_rules_handler::<G>),
        )
        .route("/api/v1/admin/assist/luma-event", post(luma_event_handler::<G>))
        .route_layer(middleware::from_fn_with_state(policy, enforce_access))
        .with_state(generator)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LumaEventQuery {
    pub(crate) url: String,
}

async fn security_rules_handler<G>(
    State(generator): State<Arc<G>>,
    Json(payload): Json<SecurityRulesRequest>,
) -> Response
where
    G: TextGenerator + 'static,
{
    let outcome =
        tokio::task::spawn_blocking(move || suggest_security_rules(generator.as_ref(), &payload))
            .await;
    match outcome {
        Ok(Ok(suggestion)) => (StatusCode::OK, Json(suggestion)).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join) => worker_failed(join),
    }
}

async fn luma_event_handler<G>(
    State(generator): State<Arc<G>>,
    Json(payload): Json<LumaEventQuery>,
) -> Response
where
    G: TextGenerator + 'static,
{
    let outcome =
        tokio::task::spawn_blocking(move || extract_luma_event(generator.as_ref(), &payload.url))
            .await;
    match outcome {
        Ok(Ok(details)) => (StatusCode::OK, Json(details)).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join) => worker_failed(join),
    }
}

fn worker_failed(join: tokio::task::JoinError) -> Response {
    error!(error = %join, "assist worker did not complete");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "assist worker did not complete" })),
    )
        .into_response()
}

impl IntoResponse for AssistError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssistError::TooShort { .. } | AssistError::InvalidUrl(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AssistError::MalformedOutput { .. } => StatusCode::BAD_GATEWAY,
            AssistError::Generation(GenerationError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AssistError::Generation(GenerationError::Refused(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
