//! Browser session established after signup

use serde::{Deserialize, Serialize};

/// Cookie lifetime: seven days
pub const SESSION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Session on a tenant site. Lives only in client cookies.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_token: String,
    pub user_email: String,
    pub tenant_subdomain: String,
}

impl Session {
    /// Render the `Set-Cookie` header values for this session.
    ///
    /// `sid` is always HttpOnly; `secure` adds the Secure attribute to all three.
    /// The readable cookies are percent-encoded so a `;` in a value cannot
    /// add attributes.
    pub fn set_cookie_headers(&self, secure: bool) -> Vec<String> {
        let secure_attr = if secure { "; Secure" } else { "" };
        let common = format!("Path=/; Max-Age={}; SameSite=Lax{}", SESSION_MAX_AGE_SECS, secure_attr);

        vec![
            format!("sid={}; HttpOnly; {}", self.session_token, common),
            format!("user_email={}; {}", urlencoding::encode(&self.user_email), common),
            format!(
                "tenant_subdomain={}; {}",
                urlencoding::encode(&self.tenant_subdomain),
                common
            ),
        ]
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_token", &"<redacted>")
            .field("user_email", &self.user_email)
            .field("tenant_subdomain", &self.tenant_subdomain)
            .finish()
    }
}
