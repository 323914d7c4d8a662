use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::mysql::MySqlConnectOptions;
use std::fmt;

use crate::config::DatabaseConfig;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Lifecycle status persisted on the tenant's catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Login,
    Authenticated,
    Error,
    Stopped,
}

impl TenantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Login => "login",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the catalog `bots` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TenantRecord {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_bool_lax")]
    #[sqlx(default)]
    pub premium: Option<bool>,
    #[serde(default)]
    pub db_host: Option<String>,
    #[serde(default)]
    pub db_user: Option<String>,
    #[serde(default)]
    pub db_password: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub db_port: Option<String>,
    #[serde(default, rename = "projectName")]
    #[sqlx(rename = "projectName")]
    pub project_name: Option<String>,
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    #[sqlx(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TenantRecord {
    pub fn is_premium(&self) -> bool {
        self.premium.unwrap_or(false)
    }

    /// Catalog ports are stored as text; anything unparseable falls back to 3306.
    pub fn port(&self) -> u16 {
        self.db_port
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_MYSQL_PORT)
    }

    /// Dedicated connection parameters, when the row carries a usable host and database.
    pub fn dedicated_connection(&self) -> Option<ConnectionConfig> {
        let host = self.db_host.as_deref().filter(|h| !h.trim().is_empty())?;
        let database = self.db_name.as_deref().filter(|d| !d.trim().is_empty())?;
        Some(ConnectionConfig {
            host: host.to_string(),
            user: self.db_user.clone().unwrap_or_default(),
            password: self.db_password.clone().unwrap_or_default(),
            database: database.to_string(),
            port: self.port(),
        })
    }

    pub fn encryption_key(&self) -> Option<String> {
        self.encryption_key
            .clone()
            .filter(|k| !k.trim().is_empty())
    }
}

/// MySQL `BOOLEAN` columns surface as `true`/`false` or `0`/`1` depending on the path.
fn deserialize_bool_lax<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::Number(n) => Ok(Some(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => match s.trim() {
            "1" | "true" => Ok(Some(true)),
            "0" | "false" | "" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean for premium, got {other:?}"
            ))),
        },
        _ => Err(serde::de::Error::custom("expected a boolean for premium")),
    }
}

/// Connection parameters of one physical database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

impl ConnectionConfig {
    pub fn gamebot(cfg: &DatabaseConfig) -> Self {
        Self::from_server(cfg, &cfg.gamebot_database)
    }

    pub fn website(cfg: &DatabaseConfig) -> Self {
        Self::from_server(cfg, &cfg.website_database)
    }

    fn from_server(cfg: &DatabaseConfig, database: &str) -> Self {
        Self {
            host: cfg.host.clone(),
            user: cfg.user.clone(),
            password: cfg.password.clone(),
            database: database.to_string(),
            port: cfg.port,
        }
    }

    /// Identity used to converge each physical database at most once per process.
    pub fn identity(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}
