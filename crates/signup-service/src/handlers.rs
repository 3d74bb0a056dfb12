//! API handlers for the signup service

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use provisioner::{ProvisionJob, SignupError, SignupOrchestrator, SignupOutcome, SignupRequest, TenantStatusReport};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::SignupResponse;

/// Shared application state
pub struct AppState {
    pub orchestrator: Arc<SignupOrchestrator>,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

fn error_status(error: &SignupError) -> StatusCode {
    match error {
        SignupError::Validation(_) => StatusCode::BAD_REQUEST,
        SignupError::ProvisioningLaunch(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "signup-service"
    }))
}

/// Run a signup and hand back the redirect, setting session cookies when the
/// user was signed in on the new site
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Response {
    info!("Signup request for company: {}", payload.company_name);

    match state.orchestrator.signup(&payload).await {
        SignupOutcome::Redirect(redirect) => {
            let mut headers = HeaderMap::new();
            if let Some(session) = &redirect.session {
                let secure = state.orchestrator.config().production;
                for cookie in session.set_cookie_headers(secure) {
                    match HeaderValue::from_str(&cookie) {
                        Ok(value) => {
                            headers.append(header::SET_COOKIE, value);
                        }
                        Err(_) => warn!("Dropping unencodable session cookie for {}", redirect.subdomain),
                    }
                }
            }

            (StatusCode::OK, headers, Json(SignupResponse::redirect(&redirect))).into_response()
        }
        SignupOutcome::Failed { stage, error } => {
            (error_status(&error), Json(SignupResponse::failed(stage, &error))).into_response()
        }
    }
}

/// Background provisioning job by ID
pub async fn get_job_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<ProvisionJob>, ApiError> {
    match state.orchestrator.jobs().get(&job_id).await {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("Job not found: {}", job_id),
        }),
    }
}

/// Current state of a tenant, repairing registry drift on the way
pub async fn tenant_status_handler(
    State(state): State<Arc<AppState>>,
    Path(subdomain): Path<String>,
) -> Json<TenantStatusReport> {
    Json(state.orchestrator.tenant_status(&subdomain).await)
}
