//! Configuration for the signup service

use anyhow::{bail, Context, Result};
use provisioner::{ApiCredentials, ProvisioningConfig};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub registry_url: String,
    pub registry_credentials: ApiCredentials,
    /// Bound on registry and site document API calls
    pub http_timeout: Duration,
    pub provisioning: ProvisioningConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = ProvisioningConfig::default();

        let provisioning = ProvisioningConfig {
            bench_path: env::var("BENCH_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bench_path),
            bench_command: env::var("BENCH_COMMAND").unwrap_or(defaults.bench_command),
            provision_command: env::var("PROVISION_COMMAND").unwrap_or(defaults.provision_command),
            site_domain: env::var("SITE_DOMAIN").unwrap_or(defaults.site_domain),
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            app_url: env::var("APP_URL").unwrap_or(defaults.app_url),
            status_page_path: env::var("STATUS_PAGE_PATH").unwrap_or(defaults.status_page_path),
            admin_role: env::var("ADMIN_ROLE").unwrap_or(defaults.admin_role),
            probe_timeout: secs_var("PROBE_TIMEOUT_SECS", defaults.probe_timeout)?,
            login_timeout: secs_var("LOGIN_TIMEOUT_SECS", defaults.login_timeout)?,
            site_credentials: ApiCredentials::new(
                env::var("SITE_API_KEY").unwrap_or_default(),
                env::var("SITE_API_SECRET").unwrap_or_default(),
            ),
            production: parse_flag(&env::var("PRODUCTION").unwrap_or_default())?,
        };

        let config = Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .context("Invalid API_PORT")?,
            registry_url: env::var("REGISTRY_URL").unwrap_or_else(|_| "http://127.0.0.1:8091".to_string()),
            registry_credentials: ApiCredentials::new(
                env::var("REGISTRY_API_KEY").unwrap_or_default(),
                env::var("REGISTRY_API_SECRET").unwrap_or_default(),
            ),
            http_timeout: secs_var("HTTP_TIMEOUT_SECS", Duration::from_secs(10))?,
            provisioning,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("API_PORT must not be 0");
        }
        if self.http_timeout.is_zero() {
            bail!("HTTP_TIMEOUT_SECS must be greater than zero");
        }
        self.provisioning
            .validate()
            .context("Invalid provisioning settings")?;
        if self.provisioning.production && self.registry_credentials.is_empty() {
            bail!("REGISTRY_API_KEY and REGISTRY_API_SECRET are required in production");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn secs_var(name: &str, default: Duration) -> Result<Duration> {
    match env::var(name) {
        Ok(value) => {
            let secs: u64 = value.parse().with_context(|| format!("Invalid {}", name))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        other => bail!("Invalid boolean flag: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8090,
            registry_url: "http://127.0.0.1:8091".to_string(),
            registry_credentials: ApiCredentials::default(),
            http_timeout: Duration::from_secs(10),
            provisioning: ProvisioningConfig::default(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().validate().is_ok());
        assert_eq!(config().addr(), "127.0.0.1:8090");
    }

    #[test]
    fn test_production_requirements() {
        let mut config = config();
        config.provisioning.production = true;
        assert!(config.validate().is_err());

        config.provisioning.app_url = "https://console.example.com".to_string();
        assert!(config.validate().is_err());

        config.registry_credentials = ApiCredentials::new("reg", "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut zero_timeout = config();
        zero_timeout.provisioning.probe_timeout = Duration::ZERO;
        assert!(zero_timeout.validate().is_err());

        let mut dotted = config();
        dotted.provisioning.site_domain = ".example.com".to_string();
        assert!(dotted.validate().is_err());

        let mut no_port = config();
        no_port.port = 0;
        assert!(no_port.validate().is_err());

        let mut relative = config();
        relative.provisioning.status_page_path = "signup/provisioning".to_string();
        assert!(relative.validate().is_err());

        let mut bad_app_url = config();
        bad_app_url.provisioning.app_url = "console".to_string();
        assert!(bad_app_url.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag("").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
