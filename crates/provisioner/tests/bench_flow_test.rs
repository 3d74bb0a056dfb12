//! End-to-end signup against a scripted bench and mocked HTTP backends
//!
//! The provisioning command is a shell script that lays out a site directory,
//! so the verifier, process spawning and background completion all run for real.

use provisioner::mock::wait_for_job;
use provisioner::{
    ApiCredentials, BenchSiteController, JobBoard, JobStatus, ProvisioningConfig, RegistryClient,
    SignupOrchestrator, SignupOutcome, SignupRequest, SiteAccountClient, TenantState,
};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROVISION_SCRIPT: &str = r#"#!/bin/sh
# provision-tenant <subdomain> <email> <company> <password> <company>
mkdir -p "sites/$1.localhost"
echo '{"db_name": "_test"}' > "sites/$1.localhost/site_config.json"
echo "created $1 for $3"
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let script = dir.join(name);
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script.to_str().unwrap().to_string()
}

async fn mount_registry(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/resource/Tenant/acme-corp"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/resource/Tenant"))
        .and(header("authorization", "token reg:secret"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/resource/User/a@acme.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/resource/User"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .mount(server)
        .await;
}

fn orchestrator(bench: &Path, provision_command: String, backend: &MockServer, registry: &MockServer) -> SignupOrchestrator {
    let config = Arc::new(ProvisioningConfig {
        bench_path: bench.to_path_buf(),
        bench_command: "true".to_string(),
        provision_command,
        backend_url: backend.uri(),
        probe_timeout: Duration::from_secs(5),
        login_timeout: Duration::from_secs(5),
        ..Default::default()
    });

    let controller = Arc::new(BenchSiteController::new(config.clone()));
    let registry = Arc::new(
        RegistryClient::new(registry.uri(), ApiCredentials::new("reg", "secret"), Duration::from_secs(5)).unwrap(),
    );
    let accounts = Arc::new(SiteAccountClient::new(config.clone(), Duration::from_secs(5)).unwrap());

    SignupOrchestrator::new(config, controller, registry, accounts, JobBoard::new())
}

fn acme() -> SignupRequest {
    SignupRequest {
        company_name: "Acme Corp".to_string(),
        email: "a@acme.com".to_string(),
        password: "longenough1".to_string(),
    }
}

#[tokio::test]
async fn test_background_provisioning_creates_and_registers_site() {
    init_tracing();
    let bench = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(bench.path().join("sites")).unwrap();
    let script = write_script(bench.path(), "provision-tenant", PROVISION_SCRIPT);

    let backend = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_site(&backend).await;
    mount_registry(&registry).await;

    let orchestrator = orchestrator(bench.path(), script, &backend, &registry);

    let redirect = match orchestrator.signup(&acme()).await {
        SignupOutcome::Redirect(redirect) => redirect,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert!(redirect.is_background());
    assert!(redirect.location.contains("job_id="));

    let job = wait_for_job(orchestrator.jobs(), redirect.job_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
    assert!(bench
        .path()
        .join("sites/acme-corp.localhost/site_config.json")
        .exists());
}

#[tokio::test]
async fn test_existing_site_signs_in_directly() {
    init_tracing();
    let bench = tempfile::tempdir().unwrap();
    let site_dir = bench.path().join("sites/acme-corp.localhost");
    std::fs::create_dir_all(&site_dir).unwrap();
    std::fs::write(site_dir.join("site_config.json"), "{}").unwrap();

    let backend = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_site(&backend).await;
    mount_registry(&registry).await;
    Mock::given(method("GET"))
        .and(path("/api/resource/User/a@acme.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&registry)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/resource/User"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {}})))
        .mount(&registry)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/method/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=live-session; Path=/"))
        .mount(&backend)
        .await;

    // Never spawned on the fast path
    let orchestrator = orchestrator(bench.path(), "false".to_string(), &backend, &registry);

    let redirect = match orchestrator.signup(&acme()).await {
        SignupOutcome::Redirect(redirect) => redirect,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert!(!redirect.is_background());
    assert_eq!(redirect.location, "http://acme-corp.localhost/app");
    assert_eq!(redirect.session.unwrap().session_token, "live-session");
    assert!(orchestrator.jobs().latest_for("acme-corp").await.is_none());
}

#[tokio::test]
async fn test_failed_process_leaves_registry_untouched() {
    init_tracing();
    let bench = tempfile::tempdir().unwrap();
    let script = write_script(bench.path(), "broken-provisioner", "#!/bin/sh\necho 'db down' >&2\nexit 1\n");

    let backend = MockServer::start().await;
    let registry = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resource/Tenant"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&registry)
        .await;

    let orchestrator = orchestrator(bench.path(), script, &backend, &registry);

    let job_id = match orchestrator.signup(&acme()).await {
        SignupOutcome::Redirect(redirect) => redirect.job_id.unwrap(),
        other => panic!("unexpected outcome: {:?}", other),
    };

    let job = wait_for_job(orchestrator.jobs(), &job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("db down"));

    Mock::given(method("GET"))
        .and(path("/api/resource/Tenant/acme-corp"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&registry)
        .await;
    let report = orchestrator.tenant_status("acme-corp").await;
    assert_eq!(report.state, TenantState::Failed);
}
