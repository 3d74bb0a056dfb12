//! Integration tests for the signup API against in-memory backends

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use provisioner::mock::{wait_for_job, MemoryAccountStore, MemoryRegistry, MockSiteController};
use provisioner::{JobBoard, JobStatus, ProvisioningConfig, SignupOrchestrator};
use serde_json::{json, Value};
use signup_service::{create_router, AppState};
use std::sync::Arc;
use tenancy_common::TenantStatus;
use tower::ServiceExt;

struct Harness {
    app: Router,
    orchestrator: Arc<SignupOrchestrator>,
    controller: Arc<MockSiteController>,
    registry: Arc<MemoryRegistry>,
}

fn harness(production: bool) -> Harness {
    let config = Arc::new(ProvisioningConfig {
        production,
        ..Default::default()
    });
    let controller = Arc::new(MockSiteController::new());
    let registry = Arc::new(MemoryRegistry::new());
    let accounts = Arc::new(MemoryAccountStore::new());

    let orchestrator = Arc::new(SignupOrchestrator::new(
        config,
        controller.clone(),
        registry.clone(),
        accounts,
        JobBoard::new(),
    ));
    let app = create_router(AppState {
        orchestrator: orchestrator.clone(),
    });

    Harness {
        app,
        orchestrator,
        controller,
        registry,
    }
}

fn signup(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn acme() -> Value {
    json!({
        "company_name": "Acme Corp",
        "email": "a@acme.com",
        "password": "longenough1"
    })
}

#[tokio::test]
async fn test_health_check() {
    let h = harness(false);
    let response = h.app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "signup-service");
}

#[tokio::test]
async fn test_signup_existing_site_sets_session_cookies() {
    let h = harness(false);
    h.controller.add_live_site("acme-corp.localhost");

    let response = h.app.oneshot(signup(acme())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 3);
    assert!(cookies[0].starts_with("sid=mock-sid-acme-corp.localhost; HttpOnly"));
    assert!(cookies.iter().all(|c| !c.contains("Secure")));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["is_background"], false);
    assert_eq!(body["redirect_to"], "http://acme-corp.localhost/app");
    assert_eq!(h.registry.tenant("acme-corp").unwrap().status, TenantStatus::Active);
}

#[tokio::test]
async fn test_signup_into_someone_elses_site_sets_no_cookies() {
    let h = harness(false);
    h.controller.add_live_site("acme-corp.localhost");
    h.registry.insert_tenant("acme-corp", TenantStatus::Active);

    let response = h
        .app
        .oneshot(signup(json!({
            "company_name": "ACME CORP",
            "email": "mallory@evil.com",
            "password": "longenough1"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = json_body(response).await;
    assert_eq!(body["redirect_to"], "http://acme-corp.localhost/app");
    assert_eq!(h.controller.login_count(), 0);
}

#[tokio::test]
async fn test_production_cookies_are_secure() {
    let h = harness(true);
    h.controller.add_live_site("acme-corp.localhost");

    let response = h.app.oneshot(signup(acme())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .all(|v| v.to_str().unwrap().ends_with("; Secure")));
}

#[tokio::test]
async fn test_signup_new_site_runs_in_background() {
    let h = harness(false);

    let response = h.app.clone().oneshot(signup(acme())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = json_body(response).await;
    assert_eq!(body["is_background"], true);
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert!(body["redirect_to"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:8090/signup/provisioning?"));

    let job = wait_for_job(h.orchestrator.jobs(), &job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let job = h
        .app
        .clone()
        .oneshot(get(&format!("/api/signup/jobs/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(job.status(), StatusCode::OK);
    assert_eq!(json_body(job).await["status"], "completed");

    let status = h.app.oneshot(get("/api/tenants/acme-corp/status")).await.unwrap();
    let status = json_body(status).await;
    assert_eq!(status["state"], "ready");
    assert_eq!(status["site_live"], true);
    assert_eq!(status["registered"], true);
}

#[tokio::test]
async fn test_validation_failure_is_bad_request() {
    let h = harness(false);

    let response = h
        .app
        .oneshot(signup(json!({
            "company_name": "Acme Corp",
            "email": "a@acme.com",
            "password": "short"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["stage"], "validating");
    assert!(body["error"].as_str().unwrap().contains("8"));
    assert_eq!(h.controller.provision_count(), 0);
}

#[tokio::test]
async fn test_missing_fields_are_bad_request() {
    let h = harness(false);

    let response = h.app.oneshot(signup(json!({"company_name": "Acme Corp"}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_launch_failure_is_service_unavailable() {
    let h = harness(false);
    h.controller.fail_launch(true);

    let response = h.app.oneshot(signup(acme())).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["stage"], "provisioning");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let h = harness(false);

    let response = h.app.oneshot(get("/api/signup/jobs/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_status_drops_stale_record() {
    let h = harness(false);
    h.registry.insert_tenant("ghost-co", TenantStatus::Active);

    let response = h.app.oneshot(get("/api/tenants/ghost-co/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["state"], "stale");
    assert_eq!(body["site_live"], false);
    assert!(h.registry.tenant("ghost-co").is_none());
}
