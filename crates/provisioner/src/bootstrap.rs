//! Administrative account bootstrapping
//!
//! Fresh sites do not reliably ship the signup user in a usable state (wrong
//! default role, disabled, website-only). [`UserBootstrapper`] forces the
//! account to one canonical state and can run any number of times.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tenancy_common::{AdminAccount, UserType};
use tracing::{debug, info};

use crate::bench::SITE_ROUTING_HEADER;
use crate::config::ProvisioningConfig;
use crate::site::SiteError;

/// A site's user table
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, site_name: &str, email: &str) -> Result<Option<AdminAccount>, SiteError>;

    async fn create_account(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError>;

    async fn update_account(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError>;
}

/// What a bootstrap run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapReport {
    /// Account was already in the target state
    Unchanged,
    Updated,
    Created,
}

pub struct UserBootstrapper {
    store: Arc<dyn AccountStore>,
    admin_role: String,
}

impl UserBootstrapper {
    pub fn new(store: Arc<dyn AccountStore>, admin_role: impl Into<String>) -> Self {
        Self {
            store,
            admin_role: admin_role.into(),
        }
    }

    /// Converge the account to: System User, enabled, holding the admin role
    /// exactly once, with the signup password.
    ///
    /// Passwords are write-only on the site API, so an account whose grants
    /// already match is left alone; the password is written together with any
    /// grant change and on create.
    pub async fn ensure_user_permissions(
        &self,
        site_name: &str,
        email: &str,
        password: &str,
    ) -> Result<BootstrapReport, SiteError> {
        let current = self.store.get_account(site_name, email).await?;
        let target = reconcile(current.as_ref(), email, password, &self.admin_role);

        match current {
            None => {
                self.store.create_account(site_name, &target).await?;
                info!("Created admin account {} on {}", email, site_name);
                Ok(BootstrapReport::Created)
            }
            Some(existing) if grants_match(&existing, &target) => {
                debug!("Admin account {} on {} already bootstrapped", email, site_name);
                Ok(BootstrapReport::Unchanged)
            }
            Some(_) => {
                self.store.update_account(site_name, &target).await?;
                info!("Bootstrapped admin account {} on {}", email, site_name);
                Ok(BootstrapReport::Updated)
            }
        }
    }
}

fn grants_match(current: &AdminAccount, target: &AdminAccount) -> bool {
    current.user_type == target.user_type && current.enabled == target.enabled && current.roles == target.roles
}

/// Target state for an account, keeping any roles it already holds
pub fn reconcile(current: Option<&AdminAccount>, email: &str, password: &str, admin_role: &str) -> AdminAccount {
    let mut roles: Vec<String> = Vec::new();
    for role in current.map(|a| a.roles.as_slice()).unwrap_or_default() {
        if !roles.contains(role) {
            roles.push(role.clone());
        }
    }
    if !roles.iter().any(|r| r == admin_role) {
        roles.push(admin_role.to_string());
    }

    AdminAccount {
        email: current.map(|a| a.email.clone()).unwrap_or_else(|| email.to_string()),
        user_type: UserType::SystemUser,
        roles,
        enabled: true,
        password: Some(password.to_string()),
    }
}

/// User document as the site's resource API speaks it
#[derive(Debug, Serialize, Deserialize)]
struct SiteUserDoc {
    email: String,
    user_type: UserType,
    #[serde(default)]
    enabled: u8,
    #[serde(default)]
    roles: Vec<HasRole>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    new_password: Option<String>,
    #[serde(default)]
    send_welcome_email: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct HasRole {
    role: String,
}

#[derive(Debug, Deserialize)]
struct SiteDocResponse {
    data: SiteUserDoc,
}

impl From<SiteUserDoc> for AdminAccount {
    fn from(doc: SiteUserDoc) -> Self {
        AdminAccount {
            email: doc.email,
            user_type: doc.user_type,
            roles: doc.roles.into_iter().map(|r| r.role).collect(),
            enabled: doc.enabled != 0,
            password: None,
        }
    }
}

impl From<&AdminAccount> for SiteUserDoc {
    fn from(account: &AdminAccount) -> Self {
        SiteUserDoc {
            email: account.email.clone(),
            user_type: account.user_type,
            enabled: u8::from(account.enabled),
            roles: account
                .roles
                .iter()
                .map(|role| HasRole { role: role.clone() })
                .collect(),
            new_password: account.password.clone(),
            send_welcome_email: 0,
        }
    }
}

/// [`AccountStore`] over a site's document API
pub struct SiteAccountClient {
    config: Arc<ProvisioningConfig>,
    client: reqwest::Client,
}

impl SiteAccountClient {
    pub fn new(config: Arc<ProvisioningConfig>, timeout: Duration) -> Result<Self, SiteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    /// The email is one encoded path segment
    fn user_url(&self, email: Option<&str>) -> Result<reqwest::Url, SiteError> {
        let invalid = || SiteError::InvalidUrl(self.config.backend_url.clone());
        let mut url = reqwest::Url::parse(&self.config.backend_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["api", "resource", "User"])
            .extend(email);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url, site_name: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(SITE_ROUTING_HEADER, site_name)
            .header(
                reqwest::header::AUTHORIZATION,
                self.config.site_credentials.authorization(),
            )
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SiteError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(SiteError::Api { status, body })
}

#[async_trait]
impl AccountStore for SiteAccountClient {
    async fn get_account(&self, site_name: &str, email: &str) -> Result<Option<AdminAccount>, SiteError> {
        let response = self
            .request(reqwest::Method::GET, self.user_url(Some(email))?, site_name)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: SiteDocResponse = ensure_success(response).await?.json().await?;
        Ok(Some(doc.data.into()))
    }

    async fn create_account(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError> {
        let response = self
            .request(reqwest::Method::POST, self.user_url(None)?, site_name)
            .json(&SiteUserDoc::from(account))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn update_account(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError> {
        let response = self
            .request(reqwest::Method::PUT, self.user_url(Some(&account.email))?, site_name)
            .json(&SiteUserDoc::from(account))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
