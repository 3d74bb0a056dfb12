//! In-memory doubles for the provisioning seams
//!
//! Used by this crate's tests and by services wiring the orchestrator without
//! a real bench or registry.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tenancy_common::{
    AdminAccount, CreateOutcome, CreateTenantRequest, CreateUserRequest, RegistryUser, TenantRecord, TenantStatus,
};
use tokio::sync::watch;

use crate::bootstrap::AccountStore;
use crate::jobs::{JobBoard, ProvisionJob};
use crate::registry_client::{Registry, RegistryError};
use crate::site::{ProvisionCompletion, ProvisionRequest, SiteController, SiteError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Site controller over an in-memory set of live sites.
///
/// A successful provision marks the site live when its completion resolves.
pub struct MockSiteController {
    live_sites: Arc<Mutex<HashSet<String>>>,
    provision_calls: AtomicUsize,
    login_calls: AtomicUsize,
    fail_launch: AtomicBool,
    fail_process: Arc<AtomicBool>,
    fail_login: AtomicBool,
    gate: watch::Sender<bool>,
}

impl Default for MockSiteController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSiteController {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            live_sites: Arc::new(Mutex::new(HashSet::new())),
            provision_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            fail_launch: AtomicBool::new(false),
            fail_process: Arc::new(AtomicBool::new(false)),
            fail_login: AtomicBool::new(false),
            gate,
        }
    }

    pub fn add_live_site(&self, site_name: &str) {
        lock(&self.live_sites).insert(site_name.to_string());
    }

    /// Simulate a site destroyed out-of-band
    pub fn remove_site(&self, site_name: &str) {
        lock(&self.live_sites).remove(site_name);
    }

    pub fn is_live(&self, site_name: &str) -> bool {
        lock(&self.live_sites).contains(site_name)
    }

    pub fn provision_count(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn fail_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    /// Launched processes exit non-zero
    pub fn fail_process(&self, fail: bool) {
        self.fail_process.store(fail, Ordering::SeqCst);
    }

    pub fn fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    /// Keep launched processes running until [`release_provisioning`](Self::release_provisioning)
    pub fn hold_provisioning(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_provisioning(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait]
impl SiteController for MockSiteController {
    async fn exists(&self, site_name: &str) -> bool {
        self.is_live(site_name)
    }

    async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionCompletion, SiteError> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(SiteError::Launch("provision-tenant: not found".to_string()));
        }
        self.provision_calls.fetch_add(1, Ordering::SeqCst);

        let live_sites = self.live_sites.clone();
        let fail_process = self.fail_process.clone();
        let mut gate = self.gate.subscribe();
        let site_name = request.site_name.clone();

        Ok(Box::pin(async move {
            let _ = gate.wait_for(|open| *open).await;

            if fail_process.load(Ordering::SeqCst) {
                return Err(SiteError::ProcessFailed {
                    code: Some(1),
                    stderr: format!("could not create {}", site_name),
                });
            }
            lock(&live_sites).insert(site_name);
            Ok(())
        }))
    }

    async fn login(&self, site_name: &str, email: &str, _password: &str) -> Result<String, SiteError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) || !self.is_live(site_name) {
            return Err(SiteError::LoginRejected(format!("{} on {}", email, site_name)));
        }
        Ok(format!("mock-sid-{}", site_name))
    }
}

/// Registry with the same uniqueness semantics as the real one.
///
/// Every call yields once first, so concurrent callers interleave the way
/// network calls would.
#[derive(Default)]
pub struct MemoryRegistry {
    tenants: Mutex<HashMap<String, TenantRecord>>,
    users: Mutex<HashMap<String, RegistryUser>>,
    unavailable: AtomicBool,
    fail_deletes: AtomicBool,
    create_attempts: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Tenant deletes error out while reads and creates keep working
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn tenant(&self, subdomain: &str) -> Option<TenantRecord> {
        lock(&self.tenants).get(subdomain).cloned()
    }

    pub fn tenant_count(&self) -> usize {
        lock(&self.tenants).len()
    }

    pub fn user_count(&self) -> usize {
        lock(&self.users).len()
    }

    /// Number of tenant create calls that reached the registry
    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    /// Seed a record directly, bypassing the API
    pub fn insert_tenant(&self, subdomain: &str, status: TenantStatus) {
        let mut record = TenantRecord::new(
            subdomain.to_string(),
            subdomain.to_string(),
            format!("owner@{}.test", subdomain),
            format!("http://{}.localhost", subdomain),
        );
        record.status = status;
        lock(&self.tenants).insert(subdomain.to_string(), record);
    }

    async fn enter(&self) -> Result<(), RegistryError> {
        tokio::task::yield_now().await;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("memory registry offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get_tenant(&self, subdomain: &str) -> Result<Option<TenantRecord>, RegistryError> {
        self.enter().await?;
        Ok(self.tenant(subdomain))
    }

    async fn create_tenant(&self, request: &CreateTenantRequest) -> Result<CreateOutcome, RegistryError> {
        self.enter().await?;
        self.create_attempts.fetch_add(1, Ordering::SeqCst);

        let mut tenants = lock(&self.tenants);
        if tenants.contains_key(&request.subdomain) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        tenants.insert(request.subdomain.clone(), TenantRecord::from(request.clone()));
        Ok(CreateOutcome::Created)
    }

    async fn delete_tenant(&self, subdomain: &str) -> Result<bool, RegistryError> {
        self.enter().await?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RegistryError::Status {
                status: 500,
                body: "delete rejected".to_string(),
            });
        }
        Ok(lock(&self.tenants).remove(subdomain).is_some())
    }

    async fn get_user(&self, email: &str) -> Result<Option<RegistryUser>, RegistryError> {
        self.enter().await?;
        Ok(lock(&self.users).get(email).cloned())
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreateOutcome, RegistryError> {
        self.enter().await?;

        let mut users = lock(&self.users);
        if users.contains_key(&request.email) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        users.insert(
            request.email.clone(),
            RegistryUser {
                email: request.email.clone(),
                company_name: request.company_name.clone(),
                enabled: true,
            },
        );
        Ok(CreateOutcome::Created)
    }
}

/// Per-site user tables; [`MemoryAccountStore::account`] shows the stored password
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<(String, String), AdminAccount>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, site_name: &str, account: AdminAccount) {
        lock(&self.accounts).insert((site_name.to_string(), account.email.clone()), account);
    }

    pub fn account(&self, site_name: &str, email: &str) -> Option<AdminAccount> {
        lock(&self.accounts)
            .get(&(site_name.to_string(), email.to_string()))
            .cloned()
    }

    /// Creates and updates performed through the store API
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SiteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SiteError::Api {
                status: 503,
                body: "site unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn write(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(site_name, account.clone());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    /// Passwords are write-only, as on a real site
    async fn get_account(&self, site_name: &str, email: &str) -> Result<Option<AdminAccount>, SiteError> {
        self.check()?;
        Ok(self.account(site_name, email).map(|account| AdminAccount {
            password: None,
            ..account
        }))
    }

    async fn create_account(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError> {
        self.write(site_name, account)
    }

    async fn update_account(&self, site_name: &str, account: &AdminAccount) -> Result<(), SiteError> {
        self.write(site_name, account)
    }
}

/// Poll the board until a job leaves the queued/running states, for up to five seconds
pub async fn wait_for_job(jobs: &JobBoard, job_id: &str) -> Option<ProvisionJob> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if let Some(job) = jobs.get(job_id).await {
            if !job.status.is_active() {
                return Some(job);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}
