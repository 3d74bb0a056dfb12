//! Process-backed site controller
//!
//! Probes go through [`SiteVerifier`], creation spawns the provisioning
//! command, and login posts to the backend with a site routing header.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ProvisioningConfig;
use crate::site::{ProvisionCompletion, ProvisionRequest, SiteController, SiteError};
use crate::verifier::SiteVerifier;

/// Header the backend uses to pick a site
pub const SITE_ROUTING_HEADER: &str = "X-Frappe-Site-Name";

static SID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[;,\s])sid=([^;,\s]+)").expect("sid pattern is valid")
});

/// How much stderr to keep in a failed job's error
const STDERR_TAIL_BYTES: usize = 2048;

pub struct BenchSiteController {
    config: Arc<ProvisioningConfig>,
    verifier: SiteVerifier,
    http_client: reqwest::Client,
}

impl BenchSiteController {
    pub fn new(config: Arc<ProvisioningConfig>) -> Self {
        let verifier = SiteVerifier::new(&config);
        Self {
            config,
            verifier,
            http_client: reqwest::Client::new(),
        }
    }

    fn provision_command(&self, request: &ProvisionRequest) -> Command {
        let mut cmd = Command::new(&self.config.provision_command);
        // provision-tenant <subdomain> <adminEmail> <companyName> <adminPassword> <companyName>
        cmd.arg(&request.subdomain)
            .arg(&request.admin_email)
            .arg(&request.company_name)
            .arg(&request.admin_password)
            .arg(&request.company_name)
            .current_dir(&self.config.bench_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        cmd
    }
}

#[async_trait]
impl SiteController for BenchSiteController {
    async fn exists(&self, site_name: &str) -> bool {
        self.verifier.verify_site_exists(site_name).await
    }

    async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionCompletion, SiteError> {
        let child = self
            .provision_command(request)
            .spawn()
            .map_err(|e| SiteError::Launch(format!("{}: {}", self.config.provision_command, e)))?;

        info!(
            "Launched {} for site {} (pid {:?})",
            self.config.provision_command,
            request.site_name,
            child.id()
        );

        let site_name = request.site_name.clone();
        Ok(Box::pin(async move {
            let output = child.wait_with_output().await?;

            for line in String::from_utf8_lossy(&output.stdout).lines() {
                debug!("[{}] {}", site_name, line);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            for line in stderr.lines() {
                warn!("[{}] {}", site_name, line);
            }

            if output.status.success() {
                info!("Provisioning process for {} finished", site_name);
                Ok(())
            } else {
                Err(SiteError::ProcessFailed {
                    code: output.status.code(),
                    stderr: tail(&stderr, STDERR_TAIL_BYTES),
                })
            }
        }))
    }

    async fn login(&self, site_name: &str, email: &str, password: &str) -> Result<String, SiteError> {
        let url = format!("{}/api/method/login", self.config.backend_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .header(SITE_ROUTING_HEADER, site_name)
            .form(&[("usr", email), ("pwd", password)])
            .timeout(self.config.login_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SiteError::Timeout(format!("login to {}", site_name))
                } else {
                    SiteError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(SiteError::LoginRejected(format!(
                "{} returned {}",
                site_name,
                response.status()
            )));
        }

        extract_session_token(response.headers())
            .ok_or_else(|| SiteError::LoginRejected(format!("{} set no session cookie", site_name)))
    }
}

/// Pull the `sid` value out of the `Set-Cookie` headers.
///
/// An anonymous `Guest` session is not a login.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| SID_PATTERN.captures(cookie))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .find(|sid| sid != "Guest")
}

fn tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.trim().to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].trim().to_string()
}
