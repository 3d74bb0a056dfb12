//! The boundary to the hosting environment
//!
//! Everything slow and non-portable (probing the bench, spawning the creation
//! process, logging into a site) sits behind [`SiteController`].

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from the hosting environment
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to launch provisioning process: {0}")]
    Launch(String),

    #[error("Provisioning process exited with {code:?}: {stderr}")]
    ProcessFailed { code: Option<i32>, stderr: String },

    #[error("Site did not verify as live after provisioning: {0}")]
    NotLive(String),

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Site API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves when a launched provisioning process exits
pub type ProvisionCompletion = Pin<Box<dyn Future<Output = Result<(), SiteError>> + Send>>;

/// Everything the creation process needs
#[derive(Clone)]
pub struct ProvisionRequest {
    pub subdomain: String,
    pub site_name: String,
    pub site_url: String,
    pub admin_email: String,
    pub company_name: String,
    pub admin_password: String,
}

impl std::fmt::Debug for ProvisionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionRequest")
            .field("subdomain", &self.subdomain)
            .field("site_name", &self.site_name)
            .field("site_url", &self.site_url)
            .field("admin_email", &self.admin_email)
            .field("company_name", &self.company_name)
            .finish_non_exhaustive()
    }
}

/// Site lifecycle operations
#[async_trait]
pub trait SiteController: Send + Sync {
    /// Ground-truth liveness. Any failure or timeout is `false`.
    async fn exists(&self, site_name: &str) -> bool;

    /// Start creating a site.
    ///
    /// Returns once the process is launched; `Err` here means it could not be
    /// started at all. The returned future tracks the process to exit and may
    /// be dropped without stopping it.
    async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionCompletion, SiteError>;

    /// Log into a site and return the session token
    async fn login(&self, site_name: &str, email: &str, password: &str) -> Result<String, SiteError>;
}
