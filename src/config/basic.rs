use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Process-wide encryption secret used by the reserved tenants.
    /// TOML: `basic.secret_key`. Empty means no encryption.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub secret_key: String,

    /// Root directory the worker `backup` command writes into.
    /// TOML: `basic.backup_dir`. Default: `backups`.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

impl BasicConfig {
    pub fn secret_key(&self) -> Option<&str> {
        let key = self.secret_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            loglevel: default_loglevel(),
            secret_key: String::new(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for basic.secret_key",
        )),
    }
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}
