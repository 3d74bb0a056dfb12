//! Wire types for the signup API

use provisioner::{Redirect, SignupError, SignupStage};
use serde::Serialize;

/// Response to `POST /api/signup`
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,

    /// Where the browser should go next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,

    /// True when the site is still being created
    pub is_background: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,

    /// Stage the signup stopped at, on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<SignupStage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignupResponse {
    pub fn redirect(redirect: &Redirect) -> Self {
        Self {
            success: true,
            redirect_to: Some(redirect.location.clone()),
            is_background: redirect.is_background(),
            job_id: redirect.job_id.clone(),
            subdomain: Some(redirect.subdomain.clone()),
            stage: None,
            error: None,
        }
    }

    pub fn failed(stage: SignupStage, error: &SignupError) -> Self {
        Self {
            success: false,
            redirect_to: None,
            is_background: false,
            job_id: None,
            subdomain: None,
            stage: Some(stage),
            error: Some(error.to_string()),
        }
    }
}
