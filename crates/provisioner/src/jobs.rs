//! Background provisioning jobs
//!
//! The request that starts a job never sees it finish. The board is the
//! side-channel a status query reads, alongside the verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::site::ProvisionRequest;

/// Finished jobs stay readable this long after they end
pub const FINISHED_JOB_RETENTION_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Slot reserved, process not yet launched
    Queued,
    /// Provisioning process is running
    Running,
    /// Site verified live and registered
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionJob {
    pub job_id: String,

    pub subdomain: String,

    pub site_name: String,

    pub company_name: String,

    pub owner_email: String,

    pub site_url: String,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProvisionJob {
    pub fn new(request: &ProvisionRequest) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            subdomain: request.subdomain.clone(),
            site_name: request.site_name.clone(),
            company_name: request.company_name.clone(),
            owner_email: request.admin_email.clone(),
            site_url: request.site_url.clone(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }
}

/// Result of asking for a job slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// A fresh job; the caller must launch it
    New(String),
    /// A job for this subdomain is already queued or running
    Existing(String),
}

#[derive(Default)]
struct Board {
    jobs: HashMap<String, ProvisionJob>,
    /// Latest job id per subdomain
    by_subdomain: HashMap<String, String>,
}

impl Board {
    fn prune_finished(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::seconds(FINISHED_JOB_RETENTION_SECS);
        self.jobs
            .retain(|_, job| !job.completed_at.is_some_and(|at| at < cutoff));
        self.by_subdomain.retain(|_, job_id| self.jobs.contains_key(job_id));
    }
}

/// In-process job tracker. Cheap to clone.
#[derive(Clone, Default)]
pub struct JobBoard {
    inner: Arc<RwLock<Board>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the provisioning slot for a subdomain.
    ///
    /// Check and insert happen under one lock, so concurrent signups in this
    /// process share one job. A new job replaces the subdomain's finished one.
    pub async fn reserve(&self, request: &ProvisionRequest) -> Reservation {
        let mut board = self.inner.write().await;

        if let Some(job_id) = board.by_subdomain.get(&request.subdomain).cloned() {
            if board.jobs.get(&job_id).is_some_and(|job| job.status.is_active()) {
                return Reservation::Existing(job_id);
            }
            board.jobs.remove(&job_id);
        }
        board.prune_finished(Utc::now());

        let job = ProvisionJob::new(request);
        let job_id = job.job_id.clone();
        board.by_subdomain.insert(request.subdomain.clone(), job_id.clone());
        board.jobs.insert(job_id.clone(), job);
        Reservation::New(job_id)
    }

    /// Jobs currently held, active or finished
    pub async fn job_count(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn get(&self, job_id: &str) -> Option<ProvisionJob> {
        self.inner.read().await.jobs.get(job_id).cloned()
    }

    /// Most recent job for a subdomain, whatever its state
    pub async fn latest_for(&self, subdomain: &str) -> Option<ProvisionJob> {
        let board = self.inner.read().await;
        board
            .by_subdomain
            .get(subdomain)
            .and_then(|job_id| board.jobs.get(job_id))
            .cloned()
    }

    pub async fn mark_running(&self, job_id: &str) {
        self.update(job_id, ProvisionJob::mark_running).await;
    }

    pub async fn mark_completed(&self, job_id: &str) {
        self.update(job_id, ProvisionJob::mark_completed).await;
    }

    pub async fn mark_failed(&self, job_id: &str, error: String) {
        self.update(job_id, |job| job.mark_failed(error)).await;
    }

    async fn update<F>(&self, job_id: &str, f: F)
    where
        F: FnOnce(&mut ProvisionJob),
    {
        if let Some(job) = self.inner.write().await.jobs.get_mut(job_id) {
            f(job);
        }
    }
}
