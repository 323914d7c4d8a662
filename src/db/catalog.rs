use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::models::{ConnectionConfig, TenantRecord};
use crate::error::BotfleetError;

const SELECT_TENANT: &str = "SELECT name, premium, db_host, db_user, db_password, db_name, \
     CAST(db_port AS CHAR) AS db_port, projectName, encryption_key, status, created_at \
     FROM bots WHERE name = ? LIMIT 1";

/// Read access to the central tenant catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_tenant(&self, name: &str) -> Result<Option<TenantRecord>, BotfleetError>;
}

/// Catalog backed by the `bots` table of the reserved `gamebot` database.
///
/// The connection is opened on first lookup and reused afterwards.
pub struct MySqlCatalog {
    config: ConnectionConfig,
    conn: Mutex<Option<MySqlConnection>>,
}

impl MySqlCatalog {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Catalog for MySqlCatalog {
    async fn find_tenant(&self, name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            let conn = MySqlConnection::connect_with(&self.config.connect_options())
                .await
                .map_err(BotfleetError::Connection)?;
            info!(database = %self.config.identity(), "catalog connection established");
            *guard = Some(conn);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(BotfleetError::InvalidRequest(
                "catalog connection unavailable".to_string(),
            ));
        };

        debug!(tenant = %name, "catalog lookup");
        let result = sqlx::query_as::<_, TenantRecord>(SELECT_TENANT)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(BotfleetError::from);
        if let Err(e) = &result
            && e.is_connection_lost()
        {
            warn!(error = %e, "catalog connection dropped; reconnecting on next lookup");
            *guard = None;
        }
        result
    }
}
