//! Tenant Provisioning
//!
//! Creates one isolated backend site per customer at signup and keeps the
//! central tenant registry consistent with what actually exists.
//!
//! ## Architecture
//!
//! **Components** (leaves first):
//! - `subdomain`: company name to DNS-safe tenant identifier
//! - `verifier`: ground-truth liveness probes against the bench
//! - `bench`: process-backed `SiteController` (probe, spawn, login)
//! - `provision`: fast path when the site is live, background job otherwise
//! - `records`: duplicate-tolerant tenant/user registry writes with repair
//! - `bootstrap`: converges the site admin account to a fixed state
//! - `orchestrator`: the signup state machine tying it all together
//! - `status`: status surface for background jobs
//! - `mock`: in-memory doubles for every external seam
//!
//! **Signup flow:**
//! 1. Validate input and derive the subdomain
//! 2. Site live: register tenant, bootstrap admin, log in, redirect to the site
//! 3. Site absent: spawn the provisioning process and redirect to a status page
//! 4. The background job registers the tenant once the site verifies as live

pub mod bench;
pub mod bootstrap;
pub mod config;
pub mod jobs;
pub mod mock;
pub mod orchestrator;
pub mod provision;
pub mod records;
pub mod registry_client;
pub mod site;
pub mod status;
pub mod subdomain;
pub mod verifier;

pub use bench::BenchSiteController;
pub use bootstrap::{AccountStore, BootstrapReport, SiteAccountClient, UserBootstrapper};
pub use config::{ApiCredentials, ProvisioningConfig};
pub use jobs::{JobBoard, JobStatus, ProvisionJob};
pub use orchestrator::{Redirect, SignupError, SignupOrchestrator, SignupOutcome, SignupRequest, SignupStage};
pub use provision::{ProvisionOutcome, SiteProvisioner};
pub use records::TenantRecordManager;
pub use registry_client::{Registry, RegistryClient, RegistryError};
pub use site::{ProvisionCompletion, ProvisionRequest, SiteController, SiteError};
pub use status::{TenantState, TenantStatusReport};
pub use subdomain::derive_subdomain;
pub use verifier::SiteVerifier;
