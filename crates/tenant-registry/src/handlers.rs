//! API request handlers for the tenant registry
//!
//! Documents are wrapped as `{"data": ...}`. A create that collides with an
//! existing key answers 409 so callers can treat it as "already there".

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tenancy_common::{CreateTenantRequest, CreateUserRequest, RegistryUser, TenantRecord};
use tracing::{info, warn};

use crate::storage::RegistryStore;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn RegistryStore>,
    pub api_token: Option<String>,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Rejects requests whose `Authorization` is not `token <key>:<secret>`
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("token "));

    if presented != Some(expected) {
        warn!("Rejected unauthenticated request to {}", request.uri().path());
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid or missing API token"));
    }

    Ok(next.run(request).await)
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tenant-registry"
    }))
}

pub async fn create_tenant_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<DocumentResponse<TenantRecord>>), ApiError> {
    if payload.subdomain.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "subdomain is required"));
    }
    info!("Registering tenant: {}", payload.subdomain);

    let record = TenantRecord::from(payload);
    if !state.store.insert_tenant(&record).await? {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("Tenant already exists: {}", record.subdomain),
        ));
    }

    Ok((StatusCode::CREATED, Json(DocumentResponse { data: record })))
}

pub async fn get_tenant_handler(
    State(state): State<Arc<AppState>>,
    Path(subdomain): Path<String>,
) -> Result<Json<DocumentResponse<TenantRecord>>, ApiError> {
    match state.store.get_tenant(&subdomain).await? {
        Some(record) => Ok(Json(DocumentResponse { data: record })),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Tenant not found: {}", subdomain),
        )),
    }
}

pub async fn list_tenants_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentResponse<Vec<TenantRecord>>>, ApiError> {
    let tenants = state.store.list_tenants().await?;
    Ok(Json(DocumentResponse { data: tenants }))
}

pub async fn delete_tenant_handler(
    State(state): State<Arc<AppState>>,
    Path(subdomain): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("Deleting tenant: {}", subdomain);

    if state.store.delete_tenant(&subdomain).await? {
        Ok(Json(MessageResponse {
            message: format!("Tenant deleted: {}", subdomain),
        }))
    } else {
        Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Tenant not found: {}", subdomain),
        ))
    }
}

/// The password is accepted for wire compatibility but never stored here;
/// credentials live on the tenant site.
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<DocumentResponse<RegistryUser>>), ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "email is required"));
    }
    info!("Registering user: {}", payload.email);

    let user = RegistryUser {
        email: payload.email,
        company_name: payload.company_name,
        enabled: true,
    };
    if !state.store.insert_user(&user).await? {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("User already exists: {}", user.email),
        ));
    }

    Ok((StatusCode::CREATED, Json(DocumentResponse { data: user })))
}

pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<DocumentResponse<RegistryUser>>, ApiError> {
    match state.store.get_user(&email).await? {
        Some(user) => Ok(Json(DocumentResponse { data: user })),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("User not found: {}", email),
        )),
    }
}
