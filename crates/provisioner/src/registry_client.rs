//! Client for the central tenant registry

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenancy_common::{CreateOutcome, CreateTenantRequest, CreateUserRequest, RegistryUser, TenantRecord, TenantStatus};
use thiserror::Error;
use tracing::debug;

use crate::config::ApiCredentials;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),

    #[error("Tenant record {subdomain} is stuck in status {status}")]
    StaleRecord { subdomain: String, status: TenantStatus },
}

/// Document-style CRUD against the registry's Tenant and User types
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_tenant(&self, subdomain: &str) -> Result<Option<TenantRecord>, RegistryError>;

    /// Duplicate keys come back as `AlreadyExists`, not as an error
    async fn create_tenant(&self, request: &CreateTenantRequest) -> Result<CreateOutcome, RegistryError>;

    /// `Ok(false)` when there was nothing to delete
    async fn delete_tenant(&self, subdomain: &str) -> Result<bool, RegistryError>;

    async fn get_user(&self, email: &str) -> Result<Option<RegistryUser>, RegistryError>;

    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreateOutcome, RegistryError>;
}

/// Response envelope used by every registry endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse<T> {
    pub data: T,
}

pub struct RegistryClient {
    base_url: reqwest::Url,
    credentials: ApiCredentials,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(registry_url: String, credentials: ApiCredentials, timeout: Duration) -> Result<Self, RegistryError> {
        let base_url = reqwest::Url::parse(&registry_url)
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", registry_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl(registry_url));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            credentials,
            client,
        })
    }

    /// Keys go in as single path segments, so `/`, `#` and `?` in an email
    /// cannot reach another resource.
    fn resource_url(&self, doctype: &str, key: Option<&str>) -> Result<reqwest::Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "resource", doctype])
            .extend(key);
        Ok(url)
    }

    async fn get_document<T: DeserializeOwned>(&self, doctype: &str, key: &str) -> Result<Option<T>, RegistryError> {
        let url = self.resource_url(doctype, Some(key))?;
        debug!("Fetching {} from registry: {}", doctype, url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.credentials.authorization())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        let document: DocumentResponse<T> = response.json().await?;
        Ok(Some(document.data))
    }

    async fn create_document<B: Serialize + Sync>(&self, doctype: &str, body: &B) -> Result<CreateOutcome, RegistryError> {
        let url = self.resource_url(doctype, None)?;
        debug!("Creating {} in registry", doctype);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, self.credentials.authorization())
            .json(body)
            .send()
            .await?;

        // The registry's uniqueness constraint is the race arbiter
        if response.status() == StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }

        check_status(response).await?;
        Ok(CreateOutcome::Created)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(RegistryError::Status { status, body })
}

#[async_trait]
impl Registry for RegistryClient {
    async fn get_tenant(&self, subdomain: &str) -> Result<Option<TenantRecord>, RegistryError> {
        self.get_document("Tenant", subdomain).await
    }

    async fn create_tenant(&self, request: &CreateTenantRequest) -> Result<CreateOutcome, RegistryError> {
        self.create_document("Tenant", request).await
    }

    async fn delete_tenant(&self, subdomain: &str) -> Result<bool, RegistryError> {
        let url = self.resource_url("Tenant", Some(subdomain))?;
        let response = self
            .client
            .delete(url)
            .header(reqwest::header::AUTHORIZATION, self.credentials.authorization())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    async fn get_user(&self, email: &str) -> Result<Option<RegistryUser>, RegistryError> {
        self.get_document("User", email).await
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreateOutcome, RegistryError> {
        self.create_document("User", request).await
    }
}
