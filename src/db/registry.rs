use std::sync::Arc;

use botfleet_schema::SchemaClass;
use moka::sync::Cache;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::catalog::{Catalog, MySqlCatalog};
use crate::db::models::ConnectionConfig;
use crate::error::BotfleetError;

pub const GAMEBOT_TENANT: &str = "gamebot";
pub const WEBSITE_TENANT: &str = "website";

/// Where a tenant's data lives, and which layout (if any) it owns there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTenant {
    pub connection: ConnectionConfig,
    /// `None` when the tenant shares a database owned by another tenant; such tenants never
    /// converge it.
    pub schema: Option<SchemaClass>,
}

/// Resolves tenant names to connection parameters and encryption keys.
///
/// Both resolutions are memoized for the lifetime of the registry. Catalog edits made after
/// the first lookup are not observed until the process restarts.
#[derive(Clone)]
pub struct TenantRegistry {
    gamebot: ConnectionConfig,
    website: ConnectionConfig,
    secret_key: Option<String>,
    catalog: Arc<dyn Catalog>,
    connections: Cache<String, ResolvedTenant>,
    keys: Cache<String, Option<String>>,
}

impl TenantRegistry {
    pub fn new(
        gamebot: ConnectionConfig,
        website: ConnectionConfig,
        secret_key: Option<String>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            gamebot,
            website,
            secret_key: secret_key.filter(|k| !k.trim().is_empty()),
            catalog,
            connections: Cache::builder().build(),
            keys: Cache::builder().build(),
        }
    }

    /// Registry over the configured reserved databases, using the `gamebot` database as catalog.
    pub fn from_config(cfg: &Config) -> Self {
        let gamebot = ConnectionConfig::gamebot(&cfg.database);
        let website = ConnectionConfig::website(&cfg.database);
        let catalog = Arc::new(MySqlCatalog::new(gamebot.clone()));
        Self::new(
            gamebot,
            website,
            cfg.basic.secret_key().map(str::to_string),
            catalog,
        )
    }

    pub fn catalog_connection(&self) -> &ConnectionConfig {
        &self.gamebot
    }

    pub async fn resolve(&self, tenant: &str) -> Result<ResolvedTenant, BotfleetError> {
        if let Some(resolved) = self.connections.get(tenant) {
            return Ok(resolved);
        }
        let resolved = self.lookup(tenant).await?;
        self.connections.insert(tenant.to_string(), resolved.clone());
        Ok(resolved)
    }

    pub async fn resolve_encryption_key(
        &self,
        tenant: &str,
    ) -> Result<Option<String>, BotfleetError> {
        if let Some(key) = self.keys.get(tenant) {
            return Ok(key);
        }
        let key = match reserved_class(tenant) {
            Some(_) => self.secret_key.clone(),
            None => self
                .catalog
                .find_tenant(tenant)
                .await?
                .ok_or_else(|| BotfleetError::NotFound(tenant.to_string()))?
                .encryption_key(),
        };
        self.keys.insert(tenant.to_string(), key.clone());
        Ok(key)
    }

    async fn lookup(&self, tenant: &str) -> Result<ResolvedTenant, BotfleetError> {
        if let Some(class) = reserved_class(tenant) {
            let connection = match class {
                SchemaClass::Website => self.website.clone(),
                SchemaClass::Gamebot | SchemaClass::Tenant => self.gamebot.clone(),
            };
            return Ok(ResolvedTenant {
                connection,
                schema: Some(class),
            });
        }

        let record = self
            .catalog
            .find_tenant(tenant)
            .await?
            .ok_or_else(|| BotfleetError::NotFound(tenant.to_string()))?;

        if record.is_premium() {
            if let Some(connection) = record.dedicated_connection() {
                debug!(tenant = %tenant, database = %connection.identity(), "resolved dedicated database");
                return Ok(ResolvedTenant {
                    connection,
                    schema: Some(SchemaClass::Tenant),
                });
            }
            // Incomplete dedicated credentials land the tenant in the shared catalog database.
            warn!(
                tenant = %tenant,
                "premium tenant has no usable dedicated database; falling back to the shared catalog"
            );
        }

        Ok(ResolvedTenant {
            connection: self.gamebot.clone(),
            schema: None,
        })
    }
}

/// Reserved tenant names, compared case-insensitively.
pub fn reserved_class(tenant: &str) -> Option<SchemaClass> {
    if tenant.eq_ignore_ascii_case(GAMEBOT_TENANT) {
        Some(SchemaClass::Gamebot)
    } else if tenant.eq_ignore_ascii_case(WEBSITE_TENANT) {
        Some(SchemaClass::Website)
    } else {
        None
    }
}
