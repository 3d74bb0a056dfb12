//! User accounts, both on tenant sites and in the central registry

use serde::{Deserialize, Serialize};

/// Account class on a tenant site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    #[serde(rename = "System User")]
    SystemUser,
    #[serde(rename = "Website User")]
    WebsiteUser,
}

/// A tenant site's administrative account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    pub email: String,

    pub user_type: UserType,

    /// Role names, no duplicates
    #[serde(default)]
    pub roles: Vec<String>,

    pub enabled: bool,

    /// Write-only on real sites; reads come back as `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AdminAccount {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// An owner account in the central registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryUser {
    pub email: String,
    pub company_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Body of a registry user create call
#[derive(Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub company_name: String,
    pub password: String,
}

impl std::fmt::Debug for CreateUserRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("email", &self.email)
            .field("company_name", &self.company_name)
            .finish_non_exhaustive()
    }
}
