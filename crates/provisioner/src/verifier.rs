//! Site existence verification
//!
//! Ground truth about a site comes from the bench itself, never from the
//! registry. Three probes run in order, each bounded by the probe timeout:
//! 1. the site's data directory exists
//! 2. its `site_config.json` exists
//! 3. `bench --site <name> list-apps` exits successfully (database reachable)

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProvisioningConfig;

const SITE_CONFIG_FILE: &str = "site_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Directory,
    Config,
    Database,
}

/// Why a site failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbeFailure {
    InvalidName,
    Failed(Probe),
    TimedOut(Probe),
}

/// Probes a bench for live sites
#[derive(Debug, Clone)]
pub struct SiteVerifier {
    sites_dir: PathBuf,
    bench_path: PathBuf,
    bench_command: String,
    probe_timeout: Duration,
}

impl SiteVerifier {
    pub fn new(config: &ProvisioningConfig) -> Self {
        Self {
            sites_dir: config.sites_dir(),
            bench_path: config.bench_path.clone(),
            bench_command: config.bench_command.clone(),
            probe_timeout: config.probe_timeout,
        }
    }

    /// Returns `true` only if all three probes pass. Never errors, never retries.
    pub async fn verify_site_exists(&self, site_name: &str) -> bool {
        match self.run_probes(site_name).await {
            Ok(()) => {
                debug!("Site {} verified live", site_name);
                true
            }
            Err(failure) => {
                debug!("Site {} not live: {:?}", site_name, failure);
                false
            }
        }
    }

    async fn run_probes(&self, site_name: &str) -> Result<(), ProbeFailure> {
        if !is_valid_site_name(site_name) {
            return Err(ProbeFailure::InvalidName);
        }

        let site_dir = self.sites_dir.join(site_name);

        let dir = site_dir.clone();
        self.bounded(Probe::Directory, async move {
            tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false)
        })
        .await?;

        let config_file = site_dir.join(SITE_CONFIG_FILE);
        self.bounded(Probe::Config, async move {
            tokio::fs::metadata(&config_file)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
        })
        .await?;

        let mut list_apps = Command::new(&self.bench_command);
        list_apps
            .arg("--site")
            .arg(site_name)
            .arg("list-apps")
            .current_dir(&self.bench_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // A hung probe must not outlive its timeout
            .kill_on_drop(true);

        self.bounded(Probe::Database, async move {
            match list_apps.status().await {
                Ok(status) => status.success(),
                Err(e) => {
                    debug!("Database probe could not run: {}", e);
                    false
                }
            }
        })
        .await
    }

    async fn bounded<F>(&self, probe: Probe, check: F) -> Result<(), ProbeFailure>
    where
        F: Future<Output = bool>,
    {
        match tokio::time::timeout(self.probe_timeout, check).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProbeFailure::Failed(probe)),
            Err(_) => Err(ProbeFailure::TimedOut(probe)),
        }
    }
}

/// Site names become path components and CLI arguments
fn is_valid_site_name(site_name: &str) -> bool {
    !site_name.is_empty()
        && !site_name.starts_with('.')
        && !site_name.starts_with('-')
        && site_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !site_name.contains("..")
}
