//! Mutating Admission Webhook
//!
//! HTTP surface of the injector. `POST /mutate` accepts an `AdmissionReview`
//! and answers with the review response; `GET /live` is the liveness probe.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kube::core::{
    admission::{AdmissionRequest, AdmissionReview},
    DynamicObject,
};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, error, Level};

use crate::error::InjectionError;
use crate::mutate::AgentInjector;

const JSON_CONTENT_TYPE: &str = "application/json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for webhook handlers
#[derive(Debug, Clone)]
pub struct WebhookState {
    pub injector: AgentInjector,
}

impl WebhookState {
    #[must_use]
    pub fn new(injector: AgentInjector) -> Self {
        Self { injector }
    }
}

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The request carried no body
    #[error("empty body")]
    EmptyBody,

    /// The request was not `application/json`
    #[error("invalid Content-Type: {0}")]
    UnsupportedContentType(String),

    /// The admission review request was invalid or malformed
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// The pod embedded in the review could not be decoded
    #[error(transparent)]
    Injection(#[from] InjectionError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::EmptyBody | WebhookError::InvalidReview(_) => StatusCode::BAD_REQUEST,
            WebhookError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WebhookError::Injection(InjectionError::Decode { .. }) => StatusCode::BAD_REQUEST,
            WebhookError::Injection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Create the webhook router
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(mutate_handler))
        .route("/live", get(liveness_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
}

async fn liveness_handler() -> &'static str {
    "alive"
}

/// Handle a mutating admission review for pods
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    if body.is_empty() {
        return Err(WebhookError::EmptyBody);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !is_json_content_type(content_type) {
        error!(content_type = %content_type, "Invalid Content-Type");
        return Err(WebhookError::UnsupportedContentType(content_type.to_string()));
    }

    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "Unable to deserialize admission review");
        WebhookError::InvalidReview(e.to_string())
    })?;
    let request: AdmissionRequest<DynamicObject> = review.try_into().map_err(
        |e: kube::core::admission::ConvertAdmissionReviewError| {
            error!(error = %e, "Admission review has no request");
            WebhookError::InvalidReview(e.to_string())
        },
    )?;

    debug!(uid = %request.uid, operation = ?request.operation, "Received admission request");
    let response = state.injector.review(&request)?;
    Ok(Json(response.into_review()))
}

fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}
