//! Provisioning status surface
//!
//! A background job reports nothing to the request that started it. Pollers
//! use this instead: it reads the job board and the registry, and trusts only
//! the verifier about whether a site exists. Registry drift found along the
//! way is repaired.

use serde::Serialize;
use tenancy_common::TenantStatus;
use tracing::info;

use crate::jobs::{JobStatus, ProvisionJob};
use crate::orchestrator::SignupOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantState {
    /// Site verified live
    Ready,
    /// Site creation still running
    Provisioning,
    /// Creation failed; signing up again starts a new job
    Failed,
    /// Registry said active but the site is gone; the record was dropped
    Stale,
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantStatusReport {
    pub subdomain: String,
    pub state: TenantState,
    pub site_live: bool,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<ProvisionJob>,
}

impl SignupOrchestrator {
    /// Settle what is true about a tenant right now
    pub async fn tenant_status(&self, subdomain: &str) -> TenantStatusReport {
        let site_name = self.config.site_name(subdomain);
        let site_live = self.controller.exists(&site_name).await;
        let job = self.jobs().latest_for(subdomain).await;
        let record = self.records.tenant(subdomain).await;

        let report = |state: TenantState, registered: bool, job: Option<ProvisionJob>| TenantStatusReport {
            subdomain: subdomain.to_string(),
            state,
            site_live,
            registered,
            job,
        };

        if site_live {
            if let Some(record) = record.as_ref().filter(|r| r.is_authoritative(true)) {
                info!("Tenant {} ready ({})", subdomain, record.site_url);
                return report(TenantState::Ready, true, job);
            }

            // Live site without an active record: register it from whatever
            // owner details we have
            let owner = record
                .as_ref()
                .map(|r| (r.company_name.clone(), r.owner_email.clone(), r.site_url.clone()))
                .or_else(|| {
                    job.as_ref()
                        .map(|j| (j.company_name.clone(), j.owner_email.clone(), j.site_url.clone()))
                });

            let registered = match owner {
                Some((company_name, owner_email, site_url)) => self
                    .records
                    .ensure_active_tenant(subdomain, &company_name, &owner_email, &site_url)
                    .await
                    .is_ok(),
                None => false,
            };
            return report(TenantState::Ready, registered, job);
        }

        if let Some(job) = job.as_ref().filter(|j| j.status.is_active()) {
            return report(TenantState::Provisioning, record.is_some(), Some(job.clone()));
        }

        match record {
            Some(record) if record.status == TenantStatus::Active => {
                self.records.repair_stale(subdomain).await;
                report(TenantState::Stale, false, job)
            }
            Some(record) if record.status == TenantStatus::Provisioning => {
                report(TenantState::Provisioning, true, job)
            }
            Some(_) => report(TenantState::Failed, true, job),
            None => match job {
                Some(job) if job.status == JobStatus::Failed => report(TenantState::Failed, false, Some(job)),
                job => report(TenantState::NotFound, false, job),
            },
        }
    }
}
