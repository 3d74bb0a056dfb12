//! Configuration for the tenant registry

use anyhow::{bail, Context, Result};
use std::env;

#[derive(Clone)]
pub struct Config {
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    /// `key:secret` expected in `Authorization: token ...`; unset disables the check
    pub api_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("REGISTRY_API_KEY").unwrap_or_default();
        let api_secret = env::var("REGISTRY_API_SECRET").unwrap_or_default();

        let config = Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            host: env::var("REGISTRY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("REGISTRY_PORT")
                .unwrap_or_else(|_| "8091".to_string())
                .parse()
                .context("Invalid REGISTRY_PORT")?,
            api_token: token(&api_key, &api_secret)?,
        };

        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn token(api_key: &str, api_secret: &str) -> Result<Option<String>> {
    match (api_key.is_empty(), api_secret.is_empty()) {
        (true, true) => Ok(None),
        (false, false) => Ok(Some(format!("{}:{}", api_key, api_secret))),
        _ => bail!("REGISTRY_API_KEY and REGISTRY_API_SECRET must be set together"),
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &self.redis_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
