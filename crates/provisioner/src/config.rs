//! Provisioning configuration
//!
//! Built once at process start and handed to every component. Nothing in this
//! crate reads the environment.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Static service credential for the registry and tenant site APIs
#[derive(Clone, Default)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("token {}:{}", self.api_key, self.api_secret)
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty() || self.api_secret.is_empty()
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Settings shared by the verifier, provisioner and orchestrator
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    /// Bench root; sites live under `<bench_path>/sites/<site_name>`
    pub bench_path: PathBuf,

    /// Bench CLI used for the database liveness probe
    pub bench_command: String,

    /// External site creation command
    pub provision_command: String,

    /// Site names are `<subdomain>.<site_domain>`
    pub site_domain: String,

    /// Backend web server; the target site is picked by routing header
    pub backend_url: String,

    /// Public URL of this console, used for the provisioning status page
    pub app_url: String,

    /// Path of the provisioning status page under `app_url`
    pub status_page_path: String,

    /// Role the site administrator must hold
    pub admin_role: String,

    /// Per-probe bound for the existence checks
    pub probe_timeout: Duration,

    /// Bound for the post-signup login request
    pub login_timeout: Duration,

    /// Credential for the tenant sites' document API
    pub site_credentials: ApiCredentials,

    /// Secure cookies and https site URLs
    pub production: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            bench_path: PathBuf::from("./frappe-bench"),
            bench_command: "bench".to_string(),
            provision_command: "provision-tenant".to_string(),
            site_domain: "localhost".to_string(),
            backend_url: "http://127.0.0.1:8000".to_string(),
            app_url: "http://localhost:8090".to_string(),
            status_page_path: "/signup/provisioning".to_string(),
            admin_role: "System Manager".to_string(),
            probe_timeout: Duration::from_secs(12),
            login_timeout: Duration::from_secs(12),
            site_credentials: ApiCredentials::default(),
            production: false,
        }
    }
}

impl ProvisioningConfig {
    /// Host/site name for a tenant
    pub fn site_name(&self, subdomain: &str) -> String {
        format!("{}.{}", subdomain, self.site_domain)
    }

    /// Public URL of a tenant's site
    pub fn site_url(&self, subdomain: &str) -> String {
        let scheme = if self.production { "https" } else { "http" };
        format!("{}://{}", scheme, self.site_name(subdomain))
    }

    /// Landing page inside a tenant's site
    pub fn tenant_home(&self, subdomain: &str) -> String {
        format!("{}/app", self.site_url(subdomain))
    }

    pub fn sites_dir(&self) -> PathBuf {
        self.bench_path.join("sites")
    }

    /// Absolute URL of the provisioning status page
    pub fn status_page_url(&self) -> String {
        format!(
            "{}{}",
            self.app_url.trim_end_matches('/'),
            self.status_page_path
        )
    }

    /// Reject settings that would only fail once a signup is under way
    pub fn validate(&self) -> Result<()> {
        if self.provision_command.trim().is_empty() {
            bail!("provision command must not be empty");
        }
        if self.site_domain.trim().is_empty() || self.site_domain.starts_with('.') {
            bail!("site domain must be a bare domain, got {:?}", self.site_domain);
        }
        if self.probe_timeout.is_zero() || self.login_timeout.is_zero() {
            bail!("probe and login timeouts must be greater than zero");
        }
        if !self.status_page_path.starts_with('/') {
            bail!("status page path must start with '/'");
        }

        let backend = reqwest::Url::parse(&self.backend_url)
            .with_context(|| format!("Invalid backend URL {:?}", self.backend_url))?;
        if backend.cannot_be_a_base() {
            bail!("backend URL {} is not a web address", backend);
        }

        let status_page = reqwest::Url::parse(&self.status_page_url())
            .with_context(|| format!("Invalid status page URL {:?}", self.status_page_url()))?;
        if status_page.cannot_be_a_base() {
            bail!("status page URL {} is not a web address", status_page);
        }
        if self.production && status_page.scheme() != "https" {
            bail!("app URL must use https in production");
        }
        Ok(())
    }
}
