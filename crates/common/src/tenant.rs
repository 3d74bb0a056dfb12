//! Tenant registry records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Lifecycle state of a tenant as recorded in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// The tenant's site has been verified live
    Active,
    /// A background job is still creating the site
    Provisioning,
    /// Provisioning failed
    Error,
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TenantStatus::Active => "active",
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for TenantStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "provisioning" => Ok(TenantStatus::Provisioning),
            "error" => Ok(TenantStatus::Error),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// A tenant row in the central registry.
///
/// The registry is a separate system of record from the site itself, so an
/// `Active` record is only authoritative while the site verifies as live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Unique key, the derived DNS label
    pub subdomain: String,

    pub company_name: String,

    pub owner_email: String,

    pub site_url: String,

    pub status: TenantStatus,

    /// Opaque per-tenant settings (may embed API credentials)
    #[serde(default)]
    pub site_config: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Create a new active tenant record
    pub fn new(
        subdomain: String,
        company_name: String,
        owner_email: String,
        site_url: String,
    ) -> Self {
        Self {
            subdomain,
            company_name,
            owner_email,
            site_url,
            status: TenantStatus::Active,
            site_config: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    /// Whether this record can be trusted given the verifier's verdict
    pub fn is_authoritative(&self, site_live: bool) -> bool {
        self.status == TenantStatus::Active && site_live
    }
}

/// Body of a tenant create call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    pub subdomain: String,
    pub company_name: String,
    pub owner_email: String,
    pub site_url: String,
    #[serde(default = "default_status")]
    pub status: TenantStatus,
    #[serde(default)]
    pub site_config: serde_json::Value,
}

fn default_status() -> TenantStatus {
    TenantStatus::Active
}

impl From<CreateTenantRequest> for TenantRecord {
    fn from(req: CreateTenantRequest) -> Self {
        let mut record = TenantRecord::new(
            req.subdomain,
            req.company_name,
            req.owner_email,
            req.site_url,
        );
        record.status = req.status;
        if !req.site_config.is_null() {
            record.site_config = req.site_config;
        }
        record
    }
}

/// Result of a duplicate-tolerant create.
///
/// `AlreadyExists` means another writer won the uniqueness race, which callers
/// treat as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}
