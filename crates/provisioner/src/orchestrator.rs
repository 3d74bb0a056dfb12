//! Signup orchestration
//!
//! `Validating → Provisioning → Registering → Bootstrapping →
//! SessionEstablishing → Redirecting`. Only validation and a failed process
//! launch end the signup; every later step degrades to a warning. A background
//! provision short-circuits straight to a redirect to the status page, and the
//! registry write is left to the background job.
//!
//! The redirect is a returned value, not an error, so no error handling path
//! can swallow it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tenancy_common::Session;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::bootstrap::{AccountStore, UserBootstrapper};
use crate::config::ProvisioningConfig;
use crate::jobs::JobBoard;
use crate::provision::{ProvisionOutcome, SiteProvisioner};
use crate::records::TenantRecordManager;
use crate::registry_client::Registry;
use crate::site::{ProvisionRequest, SiteController};
use crate::subdomain::{derive_subdomain, is_usable, MIN_SUBDOMAIN_LEN};

pub const MIN_PASSWORD_LEN: usize = 8;

/// No whitespace and none of the URL or cookie delimiters
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^\s@;,/\\?#"<>]+@[^\s@;,/\\?#"<>]+\.[^\s@;,/\\?#"<>]+$"#).expect("email pattern is valid")
});

/// Signup form input
#[derive(Clone, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("company_name", &self.company_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStage {
    Validating,
    Provisioning,
    Registering,
    Bootstrapping,
    SessionEstablishing,
    Redirecting,
}

/// The failures a signup caller gets to see
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignupError {
    #[error("{0}")]
    Validation(String),

    #[error("Could not start provisioning: {0}")]
    ProvisioningLaunch(String),
}

/// Where to send the user next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub subdomain: String,
    /// Set when the site is still being created
    pub job_id: Option<String>,
    /// Set when the post-signup login worked
    pub session: Option<Session>,
}

impl Redirect {
    pub fn is_background(&self) -> bool {
        self.job_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    Redirect(Redirect),
    Failed { stage: SignupStage, error: SignupError },
}

impl SignupOutcome {
    fn failed(stage: SignupStage, error: SignupError) -> Self {
        SignupOutcome::Failed { stage, error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SignupOutcome::Redirect(_))
    }
}

/// Normalized, validated signup input
struct ValidSignup {
    subdomain: String,
    company_name: String,
    email: String,
}

fn validate(request: &SignupRequest) -> Result<ValidSignup, SignupError> {
    let company_name = request.company_name.trim();
    let email = request.email.trim();

    if company_name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(SignupError::Validation(
            "Company name, email and password are required".to_string(),
        ));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(SignupError::Validation(format!("Invalid email address: {}", email)));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SignupError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let subdomain = derive_subdomain(company_name);
    if !is_usable(&subdomain) {
        return Err(SignupError::Validation(format!(
            "Company name must contain at least {} letters or digits",
            MIN_SUBDOMAIN_LEN
        )));
    }

    Ok(ValidSignup {
        subdomain,
        company_name: company_name.to_string(),
        email: email.to_string(),
    })
}

pub struct SignupOrchestrator {
    pub(crate) config: Arc<ProvisioningConfig>,
    pub(crate) controller: Arc<dyn SiteController>,
    pub(crate) provisioner: SiteProvisioner,
    pub(crate) records: Arc<TenantRecordManager>,
    bootstrapper: Arc<UserBootstrapper>,
}

impl SignupOrchestrator {
    pub fn new(
        config: Arc<ProvisioningConfig>,
        controller: Arc<dyn SiteController>,
        registry: Arc<dyn Registry>,
        accounts: Arc<dyn AccountStore>,
        jobs: JobBoard,
    ) -> Self {
        let records = Arc::new(TenantRecordManager::new(registry));
        let bootstrapper = Arc::new(UserBootstrapper::new(accounts, config.admin_role.clone()));
        let provisioner = SiteProvisioner::new(controller.clone(), bootstrapper.clone(), records.clone(), jobs);

        Self {
            config,
            controller,
            provisioner,
            records,
            bootstrapper,
        }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn jobs(&self) -> &JobBoard {
        self.provisioner.jobs()
    }

    /// Run one signup to a redirect or a visible failure
    pub async fn signup(&self, request: &SignupRequest) -> SignupOutcome {
        let signup = match validate(request) {
            Ok(signup) => signup,
            Err(e) => {
                info!("Rejected signup for {:?}: {}", request.email, e);
                return SignupOutcome::failed(SignupStage::Validating, e);
            }
        };

        let provision_request = ProvisionRequest {
            site_name: self.config.site_name(&signup.subdomain),
            site_url: self.config.site_url(&signup.subdomain),
            subdomain: signup.subdomain.clone(),
            admin_email: signup.email.clone(),
            company_name: signup.company_name.clone(),
            admin_password: request.password.clone(),
        };
        info!(
            "Signup for {} ({}) as {}",
            signup.company_name, signup.subdomain, signup.email
        );

        let outcome = match self.provisioner.provision(&provision_request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return SignupOutcome::failed(
                    SignupStage::Provisioning,
                    SignupError::ProvisioningLaunch(e.to_string()),
                );
            }
        };

        match outcome {
            ProvisionOutcome::Background { job_id } => {
                return SignupOutcome::Redirect(self.redirect_to_status(&signup, job_id));
            }
            ProvisionOutcome::NotOwner => {
                // Someone else's site: send them to its login page, grant nothing
                return SignupOutcome::Redirect(Redirect {
                    location: self.config.tenant_home(&signup.subdomain),
                    subdomain: signup.subdomain,
                    job_id: None,
                    session: None,
                });
            }
            ProvisionOutcome::Ready => {}
        }

        self.register(&provision_request).await;
        self.bootstrap(&provision_request).await;
        let session = self.establish_session(&provision_request).await;

        SignupOutcome::Redirect(Redirect {
            location: self.config.tenant_home(&signup.subdomain),
            subdomain: signup.subdomain,
            job_id: None,
            session,
        })
    }

    /// `ProvisioningConfig::validate` rejects status page URLs that do not
    /// parse; the plain fallback only carries URL-safe values.
    fn redirect_to_status(&self, signup: &ValidSignup, job_id: String) -> Redirect {
        let status_page = self.config.status_page_url();
        let location = match reqwest::Url::parse_with_params(
            &status_page,
            &[
                ("subdomain", signup.subdomain.as_str()),
                ("email", signup.email.as_str()),
                ("job_id", job_id.as_str()),
            ],
        ) {
            Ok(url) => url.to_string(),
            Err(e) => {
                error!("Status page URL {} does not parse: {}", status_page, e);
                format!("{}?subdomain={}&job_id={}", status_page, signup.subdomain, job_id)
            }
        };

        Redirect {
            location,
            subdomain: signup.subdomain.clone(),
            job_id: Some(job_id),
            session: None,
        }
    }

    async fn register(&self, request: &ProvisionRequest) {
        if let Err(e) = self
            .records
            .ensure_active_tenant(
                &request.subdomain,
                &request.company_name,
                &request.admin_email,
                &request.site_url,
            )
            .await
        {
            warn!("Could not register tenant {}: {}", request.subdomain, e);
        }

        if let Err(e) = self
            .records
            .create_user(&request.admin_email, &request.company_name, &request.admin_password)
            .await
        {
            warn!("Could not register user {}: {}", request.admin_email, e);
        }
    }

    async fn bootstrap(&self, request: &ProvisionRequest) {
        if let Err(e) = self
            .bootstrapper
            .ensure_user_permissions(&request.site_name, &request.admin_email, &request.admin_password)
            .await
        {
            warn!(
                "Admin permissions for {} on {} not applied: {}",
                request.admin_email, request.site_name, e
            );
        }
    }

    async fn establish_session(&self, request: &ProvisionRequest) -> Option<Session> {
        match self
            .controller
            .login(&request.site_name, &request.admin_email, &request.admin_password)
            .await
        {
            Ok(session_token) => Some(Session {
                session_token,
                user_email: request.admin_email.clone(),
                tenant_subdomain: request.subdomain.clone(),
            }),
            Err(e) => {
                warn!(
                    "Login for {} on {} failed, manual login required: {}",
                    request.admin_email, request.site_name, e
                );
                None
            }
        }
    }
}
