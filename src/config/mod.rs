mod basic;
mod database;
mod supervisor;

pub use basic::BasicConfig;
pub use database::DatabaseConfig;
pub use supervisor::SupervisorConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core settings (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Connection parameters of the reserved tenants and the catalog store
    /// (see `database` table in config.toml).
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Worker lifecycle settings (see `supervisor` table in config.toml).
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "BOTFLEET_";

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file and
    /// `BOTFLEET_`-prefixed environment variables (`__` separates tables).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration from all layers.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.basic.loglevel, "info");
        assert!(cfg.basic.secret_key().is_none());
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.supervisor.max_restarts, 5);
        assert_eq!(cfg.supervisor.restart_delay_ms, 5000);
        assert_eq!(cfg.supervisor.default_project, "Gamebot");
    }

    #[test]
    fn toml_overrides_defaults() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                r#"
                [basic]
                secret_key = "s3cret"

                [database]
                host = "db.internal"
                port = 3307
                gamebot_database = "catalog"

                [supervisor]
                max_restarts = 2
                "#,
            ))
            .extract()
            .expect("valid config");

        assert_eq!(cfg.basic.secret_key(), Some("s3cret"));
        assert_eq!(cfg.database.host, "db.internal");
        assert_eq!(cfg.database.port, 3307);
        assert_eq!(cfg.database.gamebot_database, "catalog");
        assert_eq!(cfg.supervisor.max_restarts, 2);
        assert_eq!(cfg.supervisor.restart_delay_ms, 5000);
    }
}
