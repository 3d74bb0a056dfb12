//! Site provisioning: fast path or background job
//!
//! Creating a site takes minutes, longer than any request may block. A live
//! site is handled inline; anything else is handed to a background task and
//! the caller gets a job id to poll.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bootstrap::UserBootstrapper;
use crate::jobs::{JobBoard, Reservation};
use crate::records::TenantRecordManager;
use crate::site::{ProvisionCompletion, ProvisionRequest, SiteController, SiteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Site is live; nothing was spawned
    Ready,
    /// Site is live but the signer is not its registered owner, or ownership
    /// could not be checked. No account was touched.
    NotOwner,
    /// Site creation continues in the background
    Background { job_id: String },
}

impl ProvisionOutcome {
    pub fn is_background(&self) -> bool {
        matches!(self, ProvisionOutcome::Background { .. })
    }
}

pub struct SiteProvisioner {
    controller: Arc<dyn SiteController>,
    bootstrapper: Arc<UserBootstrapper>,
    records: Arc<TenantRecordManager>,
    jobs: JobBoard,
}

impl SiteProvisioner {
    pub fn new(
        controller: Arc<dyn SiteController>,
        bootstrapper: Arc<UserBootstrapper>,
        records: Arc<TenantRecordManager>,
        jobs: JobBoard,
    ) -> Self {
        Self {
            controller,
            bootstrapper,
            records,
            jobs,
        }
    }

    pub fn jobs(&self) -> &JobBoard {
        &self.jobs
    }

    /// Make sure a site exists or is being created.
    ///
    /// The only error is failing to launch the creation process.
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionOutcome, SiteError> {
        if self.controller.exists(&request.site_name).await {
            info!("Site {} already live, taking fast path", request.site_name);
            if !self.signer_owns_site(request).await {
                return Ok(ProvisionOutcome::NotOwner);
            }
            if let Err(e) = self
                .bootstrapper
                .ensure_user_permissions(&request.site_name, &request.admin_email, &request.admin_password)
                .await
            {
                warn!("Bootstrap of {} on {} failed: {}", request.admin_email, request.site_name, e);
            }
            return Ok(ProvisionOutcome::Ready);
        }

        let job_id = match self.jobs.reserve(request).await {
            Reservation::Existing(job_id) => {
                info!("Site {} already provisioning as job {}", request.site_name, job_id);
                return Ok(ProvisionOutcome::Background { job_id });
            }
            Reservation::New(job_id) => job_id,
        };

        let completion = match self.controller.provision(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("Could not launch provisioning for {}: {}", request.site_name, e);
                self.jobs.mark_failed(&job_id, e.to_string()).await;
                return Err(e);
            }
        };

        self.jobs.mark_running(&job_id).await;
        info!("Provisioning {} in background job {}", request.site_name, job_id);

        self.spawn_completion(job_id.clone(), request.clone(), completion);
        Ok(ProvisionOutcome::Background { job_id })
    }

    /// An existing site only grants admin rights to the owner on its active
    /// record, or to anyone while no active record exists.
    async fn signer_owns_site(&self, request: &ProvisionRequest) -> bool {
        match self.records.active_owner(&request.subdomain).await {
            Ok(Some(owner)) if !owner.trim().eq_ignore_ascii_case(request.admin_email.trim()) => {
                warn!(
                    "Site {} belongs to {}; not granting access to {}",
                    request.site_name, owner, request.admin_email
                );
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!(
                    "Could not check the owner of {}, not granting access to {}: {}",
                    request.site_name, request.admin_email, e
                );
                false
            }
        }
    }

    /// Follow a launched process to the end and finish the tenant's setup.
    ///
    /// Failures are recorded on the job board and logged; nothing retries.
    fn spawn_completion(
        &self,
        job_id: String,
        request: ProvisionRequest,
        completion: ProvisionCompletion,
    ) {
        let controller = self.controller.clone();
        let bootstrapper = self.bootstrapper.clone();
        let records = self.records.clone();
        let jobs = self.jobs.clone();

        tokio::spawn(async move {
            let result = finish_provisioning(completion, &request, controller.as_ref(), &bootstrapper, &records).await;
            match result {
                Ok(()) => {
                    info!("Provisioning job {} for {} completed", job_id, request.site_name);
                    jobs.mark_completed(&job_id).await;
                }
                Err(e) => {
                    error!("Provisioning job {} for {} failed: {}", job_id, request.site_name, e);
                    jobs.mark_failed(&job_id, e.to_string()).await;
                }
            }
        });
    }
}

async fn finish_provisioning(
    completion: ProvisionCompletion,
    request: &ProvisionRequest,
    controller: &dyn SiteController,
    bootstrapper: &UserBootstrapper,
    records: &TenantRecordManager,
) -> Result<(), SiteError> {
    completion.await?;

    if !controller.exists(&request.site_name).await {
        return Err(SiteError::NotLive(request.site_name.clone()));
    }

    if let Err(e) = bootstrapper
        .ensure_user_permissions(&request.site_name, &request.admin_email, &request.admin_password)
        .await
    {
        warn!("Bootstrap of {} on {} failed: {}", request.admin_email, request.site_name, e);
    }

    if let Err(e) = records
        .ensure_active_tenant(&request.subdomain, &request.company_name, &request.admin_email, &request.site_url)
        .await
    {
        // The status surface repairs the record once the registry is back
        warn!("Could not register tenant {}: {}", request.subdomain, e);
    }

    Ok(())
}
