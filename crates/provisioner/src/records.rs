//! Tenant record lifecycle against the registry
//!
//! The registry can drift from the sites it describes (a row left behind after
//! a site is destroyed out-of-band). Nothing here trusts earlier writes: every
//! write is preceded by a read and is safe to repeat, and the registry's
//! uniqueness constraint settles concurrent creates.

use std::sync::Arc;
use tenancy_common::{CreateOutcome, CreateTenantRequest, CreateUserRequest, TenantRecord, TenantStatus};
use tracing::{info, warn};

use crate::registry_client::{Registry, RegistryError};

pub struct TenantRecordManager {
    registry: Arc<dyn Registry>,
}

impl TenantRecordManager {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// Lookup failures read as "absent"
    pub async fn tenant(&self, subdomain: &str) -> Option<TenantRecord> {
        match self.registry.get_tenant(subdomain).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Tenant lookup for {} failed: {}", subdomain, e);
                None
            }
        }
    }

    pub async fn tenant_exists(&self, subdomain: &str) -> bool {
        self.tenant(subdomain).await.is_some()
    }

    /// Create a tenant row; losing a duplicate-key race is success
    pub async fn create_tenant(
        &self,
        subdomain: &str,
        company_name: &str,
        owner_email: &str,
        site_url: &str,
    ) -> Result<CreateOutcome, RegistryError> {
        if self.tenant_exists(subdomain).await {
            info!("Tenant {} already registered", subdomain);
            return Ok(CreateOutcome::AlreadyExists);
        }

        let request = CreateTenantRequest {
            subdomain: subdomain.to_string(),
            company_name: company_name.to_string(),
            owner_email: owner_email.to_string(),
            site_url: site_url.to_string(),
            status: TenantStatus::Active,
            site_config: serde_json::json!({
                "site_name": site_url.split("://").nth(1).unwrap_or(site_url),
            }),
        };

        let outcome = self.registry.create_tenant(&request).await?;
        match outcome {
            CreateOutcome::Created => info!("Registered tenant {}", subdomain),
            CreateOutcome::AlreadyExists => info!("Tenant {} already registered", subdomain),
        }
        Ok(outcome)
    }

    /// Best-effort; failures are logged and swallowed
    pub async fn delete_tenant(&self, subdomain: &str) {
        match self.registry.delete_tenant(subdomain).await {
            Ok(true) => info!("Deleted tenant record {}", subdomain),
            Ok(false) => {}
            Err(e) => warn!("Failed to delete tenant record {}: {}", subdomain, e),
        }
    }

    pub async fn user_exists(&self, email: &str) -> bool {
        match self.registry.get_user(email).await {
            Ok(user) => user.is_some(),
            Err(e) => {
                warn!("User lookup for {} failed: {}", email, e);
                false
            }
        }
    }

    /// Create a registry user; duplicates are success
    pub async fn create_user(
        &self,
        email: &str,
        company_name: &str,
        password: &str,
    ) -> Result<CreateOutcome, RegistryError> {
        if self.user_exists(email).await {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let request = CreateUserRequest {
            email: email.to_string(),
            company_name: company_name.to_string(),
            password: password.to_string(),
        };
        self.registry.create_user(&request).await
    }

    /// Make sure an active record exists for a site the caller has verified live.
    ///
    /// A record in any other state is stale metadata: it is deleted and recreated.
    pub async fn ensure_active_tenant(
        &self,
        subdomain: &str,
        company_name: &str,
        owner_email: &str,
        site_url: &str,
    ) -> Result<CreateOutcome, RegistryError> {
        match self.registry.get_tenant(subdomain).await? {
            Some(record) if record.is_authoritative(true) => {
                return Ok(CreateOutcome::AlreadyExists);
            }
            Some(record) => {
                info!(
                    "Repairing tenant record {} (status {})",
                    subdomain, record.status
                );
                self.delete_tenant(subdomain).await;

                // The delete is best-effort; a record that survived it would
                // make the create below look like a success
                if let Some(left) = self.registry.get_tenant(subdomain).await? {
                    if left.status != TenantStatus::Active {
                        return Err(RegistryError::StaleRecord {
                            subdomain: subdomain.to_string(),
                            status: left.status,
                        });
                    }
                }
            }
            None => {}
        }

        self.create_tenant(subdomain, company_name, owner_email, site_url).await
    }

    /// Owner of the active record for a subdomain, if there is one.
    ///
    /// Unlike [`Self::tenant`], lookup failures are returned: callers use this
    /// to decide whether to grant access.
    pub async fn active_owner(&self, subdomain: &str) -> Result<Option<String>, RegistryError> {
        let record = self.registry.get_tenant(subdomain).await?;
        Ok(record
            .filter(|r| r.status == TenantStatus::Active)
            .map(|r| r.owner_email))
    }

    /// Drop a record whose site failed verification.
    ///
    /// Returns whether a record was there to drop.
    pub async fn repair_stale(&self, subdomain: &str) -> bool {
        if !self.tenant_exists(subdomain).await {
            return false;
        }
        warn!("Tenant record {} has no live site, removing", subdomain);
        self.delete_tenant(subdomain).await;
        true
    }
}
