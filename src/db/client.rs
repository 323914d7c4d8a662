use std::path::{Path, PathBuf};

use botfleet_schema::{DdlStatement, TableDefinition};
use serde_json::Value;
use sqlx::mysql::MySqlConnection;
use sqlx::{Connection, Executor};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard, OnceCell};
use tracing::{error, info, warn};

use crate::crypto::TenantCipher;
use crate::db::models::ConnectionConfig;
use crate::db::registry::TenantRegistry;
use crate::db::sync::{MySqlSchemaBackend, SchemaSynchronizer, VerifiedDatabases};
use crate::db::value::{Entry, bind_all, checked_ident, row_to_entry, set_clause, where_clause};
use crate::error::BotfleetError;

const LIST_TABLES: &str = "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

struct Session {
    conn: MySqlConnection,
    connection: ConnectionConfig,
}

/// Tables written by [`TenantDataClient::backup_database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub directory: PathBuf,
    pub tables: Vec<String>,
}

/// Per-tenant facade over one lazily opened MySQL connection.
///
/// The first operation resolves the tenant through the [`TenantRegistry`], connects, and
/// converges the database once per process (tracked by [`VerifiedDatabases`]). Statements
/// are serialized through a mutex around the single connection.
///
/// Every operation logs its failure before returning it.
pub struct TenantDataClient {
    tenant: String,
    registry: TenantRegistry,
    verified: VerifiedDatabases,
    converge: bool,
    session: Mutex<Option<Session>>,
    cipher: OnceCell<TenantCipher>,
}

impl TenantDataClient {
    pub fn new(
        tenant: impl Into<String>,
        registry: TenantRegistry,
        verified: VerifiedDatabases,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            registry,
            verified,
            converge: true,
            session: Mutex::new(None),
            cipher: OnceCell::new(),
        }
    }

    /// Skips schema convergence on connect. Used by workers writing to the shared catalog,
    /// which only the supervisor converges.
    #[must_use]
    pub fn without_convergence(mut self) -> Self {
        self.converge = false;
        self
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Opens the connection now instead of on first use.
    pub async fn connect(&self) -> Result<(), BotfleetError> {
        self.logged("connect", async { self.session().await.map(drop) })
            .await
    }

    pub async fn database_name(&self) -> Result<String, BotfleetError> {
        self.logged("database_name", async {
            let resolved = self.registry.resolve(&self.tenant).await?;
            Ok(resolved.connection.database)
        })
        .await
    }

    /// Inserts `entry` and returns the generated id (0 when the table has none).
    pub async fn add_entry(&self, table: &str, entry: &Entry) -> Result<u64, BotfleetError> {
        self.logged("add_entry", async {
            let table = checked_ident(table)?;
            let columns = entry
                .keys()
                .map(|k| checked_ident(k))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            let placeholders = vec!["?"; entry.len()].join(", ");
            let sql = format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})");

            let mut session = self.session().await?;
            let done = bind_all(sqlx::query(&sql), entry.values())
                .execute(&mut session.conn)
                .await?;
            Ok(done.last_insert_id())
        })
        .await
    }

    /// First row matching every criterion.
    pub async fn find_entry(
        &self,
        table: &str,
        criteria: &Entry,
    ) -> Result<Option<Entry>, BotfleetError> {
        self.logged("find_entry", async {
            let sql = format!("{} LIMIT 1", select_sql(table, criteria)?);
            let mut session = self.session().await?;
            let row = bind_all(sqlx::query(&sql), criteria.values())
                .fetch_optional(&mut session.conn)
                .await?;
            row.as_ref().map(row_to_entry).transpose()
        })
        .await
    }

    /// All rows matching every criterion; empty criteria select the whole table.
    pub async fn find_entries(
        &self,
        table: &str,
        criteria: &Entry,
    ) -> Result<Vec<Entry>, BotfleetError> {
        self.logged("find_entries", async {
            let sql = select_sql(table, criteria)?;
            let mut session = self.session().await?;
            let rows = bind_all(sqlx::query(&sql), criteria.values())
                .fetch_all(&mut session.conn)
                .await?;
            rows.iter().map(row_to_entry).collect()
        })
        .await
    }

    /// Returns the number of affected rows.
    pub async fn update_entry(
        &self,
        table: &str,
        criteria: &Entry,
        updates: &Entry,
    ) -> Result<u64, BotfleetError> {
        self.logged("update_entry", async {
            require_criteria(criteria)?;
            if updates.is_empty() {
                return Err(BotfleetError::InvalidRequest(
                    "update without any column".to_string(),
                ));
            }
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                checked_ident(table)?,
                set_clause(updates)?,
                where_clause(criteria)?
            );
            let mut session = self.session().await?;
            let done = bind_all(sqlx::query(&sql), updates.values().chain(criteria.values()))
                .execute(&mut session.conn)
                .await?;
            Ok(done.rows_affected())
        })
        .await
    }

    /// Returns the number of deleted rows.
    pub async fn delete_entry(&self, table: &str, criteria: &Entry) -> Result<u64, BotfleetError> {
        self.logged("delete_entry", async {
            require_criteria(criteria)?;
            let sql = format!(
                "DELETE FROM {} WHERE {}",
                checked_ident(table)?,
                where_clause(criteria)?
            );
            let mut session = self.session().await?;
            let done = bind_all(sqlx::query(&sql), criteria.values())
                .execute(&mut session.conn)
                .await?;
            Ok(done.rows_affected())
        })
        .await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, BotfleetError> {
        self.logged("table_exists", async {
            let mut session = self.session().await?;
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
            )
            .bind(table)
            .fetch_one(&mut session.conn)
            .await?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn drop_table(&self, table: &str) -> Result<(), BotfleetError> {
        self.logged("drop_table", async {
            let sql = format!("DROP TABLE IF EXISTS {}", checked_ident(table)?);
            self.execute_raw(&sql).await
        })
        .await
    }

    /// Runs `ALTER TABLE <table> <action>`. `action` is passed through verbatim and must
    /// come from trusted code.
    pub async fn alter_table(&self, table: &str, action: &str) -> Result<(), BotfleetError> {
        self.logged("alter_table", async {
            if action.trim().is_empty() {
                return Err(BotfleetError::InvalidRequest(
                    "empty ALTER TABLE action".to_string(),
                ));
            }
            let sql = format!("ALTER TABLE {} {}", checked_ident(table)?, action.trim());
            self.execute_raw(&sql).await
        })
        .await
    }

    pub async fn create_table(&self, definition: &TableDefinition) -> Result<(), BotfleetError> {
        self.logged("create_table", async {
            checked_ident(definition.name())?;
            for name in definition.column_names() {
                checked_ident(name)?;
            }
            let stmt = DdlStatement::CreateTable {
                table: definition.name().to_string(),
                columns: definition.columns().to_vec(),
            };
            self.execute_raw(&stmt.to_sql()).await
        })
        .await
    }

    /// Resets the table's `AUTO_INCREMENT`. With `reorder`, ids are first renumbered
    /// sequentially from 1 in ascending order.
    pub async fn reset_auto_increment(&self, table: &str, reorder: bool) -> Result<(), BotfleetError> {
        self.logged("reset_auto_increment", async {
            let table = checked_ident(table)?;
            let mut session = self.session().await?;
            if reorder {
                let ids: Vec<i64> = sqlx::query_scalar(&format!("SELECT id FROM {table} ORDER BY id"))
                    .fetch_all(&mut session.conn)
                    .await?;
                let update = format!("UPDATE {table} SET id = ? WHERE id = ?");
                // Ascending order guarantees every new id is free when it is assigned.
                for (new_id, old_id) in (1_i64..).zip(ids) {
                    if new_id == old_id {
                        continue;
                    }
                    sqlx::query(&update)
                        .bind(new_id)
                        .bind(old_id)
                        .execute(&mut session.conn)
                        .await?;
                }
            }
            let sql = format!("ALTER TABLE {table} AUTO_INCREMENT = 1");
            (&mut session.conn).execute(sql.as_str()).await?;
            Ok(())
        })
        .await
    }

    /// Groups with more than one row over `columns`, each with a `duplicate_count` column.
    pub async fn check_for_duplicates(
        &self,
        table: &str,
        columns: &[&str],
    ) -> Result<Vec<Entry>, BotfleetError> {
        self.logged("check_for_duplicates", async {
            if columns.is_empty() {
                return Err(BotfleetError::InvalidRequest(
                    "duplicate check without columns".to_string(),
                ));
            }
            let list = columns
                .iter()
                .map(|c| checked_ident(c))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            let sql = format!(
                "SELECT {list}, COUNT(*) AS duplicate_count FROM {} GROUP BY {list} HAVING COUNT(*) > 1",
                checked_ident(table)?
            );
            let mut session = self.session().await?;
            let rows = sqlx::query(&sql).fetch_all(&mut session.conn).await?;
            rows.iter().map(row_to_entry).collect()
        })
        .await
    }

    pub async fn get_table_as_json(&self, table: &str) -> Result<Vec<Entry>, BotfleetError> {
        self.logged("get_table_as_json", async {
            let sql = format!("SELECT * FROM {}", checked_ident(table)?);
            let mut session = self.session().await?;
            let rows = sqlx::query(&sql).fetch_all(&mut session.conn).await?;
            rows.iter().map(row_to_entry).collect()
        })
        .await
    }

    /// Dumps every table to `<dir>/<database>/<table>.json`.
    pub async fn backup_database(&self, dir: &Path) -> Result<BackupSummary, BotfleetError> {
        self.logged("backup_database", async {
            let (database, dumps) = {
                let mut session = self.session().await?;
                let tables: Vec<String> = sqlx::query_scalar(LIST_TABLES)
                    .fetch_all(&mut session.conn)
                    .await?;
                let mut dumps = Vec::with_capacity(tables.len());
                for (table, quoted) in backup_targets(&self.tenant, tables) {
                    let sql = format!("SELECT * FROM {quoted}");
                    let rows = sqlx::query(&sql).fetch_all(&mut session.conn).await?;
                    let entries = rows
                        .iter()
                        .map(row_to_entry)
                        .collect::<Result<Vec<_>, _>>()?;
                    dumps.push((table, entries));
                }
                (session.connection.database.clone(), dumps)
            };

            let directory = dir.join(&database);
            tokio::fs::create_dir_all(&directory).await?;
            let mut tables = Vec::with_capacity(dumps.len());
            for (table, entries) in dumps {
                let body = serde_json::to_vec_pretty(&Value::from(
                    entries.into_iter().map(Value::Object).collect::<Vec<_>>(),
                ))?;
                tokio::fs::write(directory.join(format!("{table}.json")), body).await?;
                tables.push(table);
            }
            info!(tenant = %self.tenant, directory = %directory.display(), tables = tables.len(), "database backed up");
            Ok(BackupSummary { directory, tables })
        })
        .await
    }

    /// Encrypts with the tenant's key; pass-through when the tenant has none.
    pub async fn encrypt(&self, plaintext: &str) -> Result<String, BotfleetError> {
        self.logged("encrypt", async { self.cipher().await?.encrypt(plaintext) })
            .await
    }

    /// Inverse of [`TenantDataClient::encrypt`].
    pub async fn decrypt(&self, encoded: &str) -> Result<String, BotfleetError> {
        self.logged("decrypt", async { self.cipher().await?.decrypt(encoded) })
            .await
    }

    async fn cipher(&self) -> Result<&TenantCipher, BotfleetError> {
        self.cipher
            .get_or_try_init(|| async {
                let key = self.registry.resolve_encryption_key(&self.tenant).await?;
                Ok::<_, BotfleetError>(TenantCipher::new(key.as_deref()))
            })
            .await
    }

    async fn execute_raw(&self, sql: &str) -> Result<(), BotfleetError> {
        let mut session = self.session().await?;
        (&mut session.conn).execute(sql).await?;
        Ok(())
    }

    async fn session(&self) -> Result<MappedMutexGuard<'_, Session>, BotfleetError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            BotfleetError::InvalidRequest(format!("no connection for tenant {}", self.tenant))
        })
    }

    async fn open(&self) -> Result<Session, BotfleetError> {
        let resolved = self.registry.resolve(&self.tenant).await?;
        let mut conn = MySqlConnection::connect_with(&resolved.connection.connect_options())
            .await
            .map_err(BotfleetError::Connection)?;
        let identity = resolved.connection.identity();
        info!(tenant = %self.tenant, database = %identity, "database connection established");

        if self.converge
            && let Some(class) = resolved.schema
            && let Some(claim) = self.verified.claim(&identity).await
        {
            let mut backend = MySqlSchemaBackend::new(&mut conn);
            SchemaSynchronizer::new()
                .converge(&mut backend, class.definition())
                .await;
            claim.complete();
        }

        Ok(Session {
            conn,
            connection: resolved.connection,
        })
    }

    async fn logged<T, F>(&self, op: &str, fut: F) -> Result<T, BotfleetError>
    where
        F: Future<Output = Result<T, BotfleetError>>,
    {
        let result = fut.await;
        if let Err(e) = &result {
            error!(tenant = %self.tenant, op, error = %e, "database operation failed");
            if e.is_connection_lost() && self.session.lock().await.take().is_some() {
                warn!(tenant = %self.tenant, "connection dropped; reconnecting on next use");
            }
        }
        result
    }
}

/// Pairs each table with its quoted name. Tables whose names cannot be quoted safely are
/// left out of the backup.
fn backup_targets(tenant: &str, tables: Vec<String>) -> Vec<(String, String)> {
    tables
        .into_iter()
        .filter_map(|table| match checked_ident(&table) {
            Ok(quoted) => Some((table, quoted)),
            Err(e) => {
                warn!(tenant = %tenant, table = %table, error = %e, "skipping table in backup");
                None
            }
        })
        .collect()
}

fn select_sql(table: &str, criteria: &Entry) -> Result<String, BotfleetError> {
    let table = checked_ident(table)?;
    if criteria.is_empty() {
        Ok(format!("SELECT * FROM {table}"))
    } else {
        Ok(format!("SELECT * FROM {table} WHERE {}", where_clause(criteria)?))
    }
}

fn require_criteria(criteria: &Entry) -> Result<(), BotfleetError> {
    if criteria.is_empty() {
        return Err(BotfleetError::InvalidRequest(
            "refusing to touch every row: criteria are empty".to_string(),
        ));
    }
    Ok(())
}
