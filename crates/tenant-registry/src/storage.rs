//! Storage backends for tenant and user documents
//!
//! Both backends make "create" a single atomic insert-if-absent so that two
//! signups racing for the same subdomain produce exactly one row.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tenancy_common::{RegistryUser, TenantRecord};
use tracing::{debug, info};

const TENANT_INDEX: &str = "tenants:all";

#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Returns false when a tenant with the same subdomain already exists
    async fn insert_tenant(&self, record: &TenantRecord) -> Result<bool>;

    async fn get_tenant(&self, subdomain: &str) -> Result<Option<TenantRecord>>;

    async fn delete_tenant(&self, subdomain: &str) -> Result<bool>;

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>>;

    /// Returns false when the email is already registered
    async fn insert_user(&self, user: &RegistryUser) -> Result<bool>;

    async fn get_user(&self, email: &str) -> Result<Option<RegistryUser>>;
}

fn tenant_key(subdomain: &str) -> String {
    format!("tenant:{}", subdomain)
}

fn user_key(email: &str) -> String {
    format!("user:{}", email.to_lowercase())
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(key).await?;

        json.map(|data| serde_json::from_str(&data).with_context(|| format!("Corrupt document at {}", key)))
            .transpose()
    }
}

#[async_trait]
impl RegistryStore for RedisStore {
    async fn insert_tenant(&self, record: &TenantRecord) -> Result<bool> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record).context("Failed to serialize tenant")?;

        let created: bool = conn.set_nx(tenant_key(&record.subdomain), json).await?;
        if !created {
            debug!("Tenant already exists: {}", record.subdomain);
            return Ok(false);
        }

        let _: () = conn.sadd(TENANT_INDEX, &record.subdomain).await?;
        info!("Registered tenant: {}", record.subdomain);
        Ok(true)
    }

    async fn get_tenant(&self, subdomain: &str) -> Result<Option<TenantRecord>> {
        self.get_json(&tenant_key(subdomain)).await
    }

    async fn delete_tenant(&self, subdomain: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: bool = conn.del(tenant_key(subdomain)).await?;

        if deleted {
            let _: () = conn.srem(TENANT_INDEX, subdomain).await?;
            info!("Deleted tenant: {}", subdomain);
        }

        Ok(deleted)
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let mut conn = self.conn.clone();
        let subdomains: Vec<String> = conn.smembers(TENANT_INDEX).await?;

        let mut tenants = Vec::with_capacity(subdomains.len());
        for subdomain in &subdomains {
            if let Some(record) = self.get_tenant(subdomain).await? {
                tenants.push(record);
            }
        }
        tenants.sort_by(|a, b| a.subdomain.cmp(&b.subdomain));
        Ok(tenants)
    }

    async fn insert_user(&self, user: &RegistryUser) -> Result<bool> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(user).context("Failed to serialize user")?;

        let created: bool = conn.set_nx(user_key(&user.email), json).await?;
        if created {
            info!("Registered user: {}", user.email);
        }
        Ok(created)
    }

    async fn get_user(&self, email: &str) -> Result<Option<RegistryUser>> {
        self.get_json(&user_key(email)).await
    }
}

/// In-process store for tests and local runs without Redis
#[derive(Default)]
pub struct MemoryStore {
    tenants: Mutex<BTreeMap<String, TenantRecord>>,
    users: Mutex<BTreeMap<String, RegistryUser>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn insert_tenant(&self, record: &TenantRecord) -> Result<bool> {
        let mut tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        if tenants.contains_key(&record.subdomain) {
            return Ok(false);
        }
        tenants.insert(record.subdomain.clone(), record.clone());
        Ok(true)
    }

    async fn get_tenant(&self, subdomain: &str) -> Result<Option<TenantRecord>> {
        let tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tenants.get(subdomain).cloned())
    }

    async fn delete_tenant(&self, subdomain: &str) -> Result<bool> {
        let mut tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tenants.remove(subdomain).is_some())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tenants.values().cloned().collect())
    }

    async fn insert_user(&self, user: &RegistryUser) -> Result<bool> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let key = user.email.to_lowercase();
        if users.contains_key(&key) {
            return Ok(false);
        }
        users.insert(key, user.clone());
        Ok(true)
    }

    async fn get_user(&self, email: &str) -> Result<Option<RegistryUser>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(&email.to_lowercase()).cloned())
    }
}
