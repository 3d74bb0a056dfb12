//! Integration tests for the tenant registry API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tenant_registry::{create_router, AppState, MemoryStore};
use tower::ServiceExt;

const TOKEN: &str = "token reg:secret";

fn app() -> Router {
    create_router(AppState {
        store: Arc::new(MemoryStore::new()),
        api_token: Some("reg:secret".to_string()),
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, TOKEN)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, TOKEN)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn acme_tenant() -> Value {
    json!({
        "subdomain": "acme-corp",
        "company_name": "Acme Corp",
        "owner_email": "a@acme.com",
        "site_url": "http://acme-corp.localhost",
        "site_config": {"site_name": "acme-corp.localhost"}
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_resources_require_token() {
    let missing = app()
        .oneshot(Request::builder().uri("/api/resource/Tenant/acme-corp").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app()
        .oneshot(
            Request::builder()
                .uri("/api/resource/Tenant/acme-corp")
                .header(header::AUTHORIZATION, "token reg:wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_open_registry_without_token() {
    let app = create_router(AppState {
        store: Arc::new(MemoryStore::new()),
        api_token: None,
    });

    let response = app
        .oneshot(Request::builder().uri("/api/resource/Tenant").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"], json!([]));
}

#[tokio::test]
async fn test_tenant_lifecycle() {
    let app = app();

    let created = app.clone().oneshot(post("/api/resource/Tenant", acme_tenant())).await.unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = json_body(created).await;
    assert_eq!(created["data"]["status"], "active");
    assert_eq!(created["data"]["site_config"]["site_name"], "acme-corp.localhost");

    let duplicate = app.clone().oneshot(post("/api/resource/Tenant", acme_tenant())).await.unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert!(json_body(duplicate).await["error"].as_str().unwrap().contains("acme-corp"));

    let fetched = app.clone().oneshot(request("GET", "/api/resource/Tenant/acme-corp")).await.unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json_body(fetched).await["data"]["company_name"], "Acme Corp");

    let listed = app.clone().oneshot(request("GET", "/api/resource/Tenant")).await.unwrap();
    assert_eq!(json_body(listed).await["data"].as_array().unwrap().len(), 1);

    let deleted = app.clone().oneshot(request("DELETE", "/api/resource/Tenant/acme-corp")).await.unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app.clone().oneshot(request("GET", "/api/resource/Tenant/acme-corp")).await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let deleted_again = app.oneshot(request("DELETE", "/api/resource/Tenant/acme-corp")).await.unwrap();
    assert_eq!(deleted_again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tenant_requires_subdomain() {
    let mut body = acme_tenant();
    body["subdomain"] = json!("  ");

    let response = app().oneshot(post("/api/resource/Tenant", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_registration_hides_password() {
    let app = app();
    let user = json!({
        "email": "a@acme.com",
        "company_name": "Acme Corp",
        "password": "longenough1"
    });

    let created = app.clone().oneshot(post("/api/resource/User", user.clone())).await.unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = json_body(created).await;
    assert_eq!(created["data"]["enabled"], true);
    assert!(created["data"].get("password").is_none());

    let duplicate = app.clone().oneshot(post("/api/resource/User", user)).await.unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let fetched = app.clone().oneshot(request("GET", "/api/resource/User/a@acme.com")).await.unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json_body(fetched).await["data"]["email"], "a@acme.com");

    let missing = app.oneshot(request("GET", "/api/resource/User/b@acme.com")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
