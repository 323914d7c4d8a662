use serde::{Deserialize, Serialize};

/// Statically configured database server shared by the reserved tenants.
///
/// `gamebot_database` is also the catalog store holding the `bots` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// TOML: `database.host`. Default: `127.0.0.1`.
    #[serde(default = "default_host")]
    pub host: String,

    /// TOML: `database.user`. Default: `root`.
    #[serde(default = "default_user")]
    pub user: String,

    /// TOML: `database.password`. Default: empty.
    #[serde(default)]
    pub password: String,

    /// TOML: `database.port`. Default: `3306`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database of the reserved `gamebot` tenant (and the catalog).
    /// TOML: `database.gamebot_database`. Default: `gamebot`.
    #[serde(default = "default_gamebot_database")]
    pub gamebot_database: String,

    /// Database of the reserved `website` tenant.
    /// TOML: `database.website_database`. Default: `website`.
    #[serde(default = "default_website_database")]
    pub website_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: default_user(),
            password: String::new(),
            port: default_port(),
            gamebot_database: default_gamebot_database(),
            website_database: default_website_database(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

pub(crate) const fn default_port() -> u16 {
    3306
}

fn default_gamebot_database() -> String {
    "gamebot".to_string()
}

fn default_website_database() -> String {
    "website".to_string()
}
