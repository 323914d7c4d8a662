use async_trait::async_trait;
use botfleet_schema::{DdlStatement, LiveColumn, LiveColumnSet};
use sqlx::Executor;
use sqlx::mysql::MySqlConnection;

use crate::error::BotfleetError;

/// The three primitives convergence needs from a live database.
#[async_trait]
pub trait SchemaBackend: Send {
    async fn table_exists(&mut self, table: &str) -> Result<bool, BotfleetError>;

    /// Live columns in ordinal order.
    async fn live_columns(&mut self, table: &str) -> Result<LiveColumnSet, BotfleetError>;

    async fn apply(&mut self, statement: &DdlStatement) -> Result<(), BotfleetError>;
}

const TABLE_EXISTS: &str = "SELECT COUNT(*) FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

// information_schema reports several of these as BLOB/LONGTEXT depending on the server.
const LIVE_COLUMNS: &str = "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), \
     CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR), CAST(COLUMN_KEY AS CHAR), \
     CAST(EXTRA AS CHAR) \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

type ColumnRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Introspects and alters the database selected on a borrowed connection.
pub struct MySqlSchemaBackend<'c> {
    conn: &'c mut MySqlConnection,
}

impl<'c> MySqlSchemaBackend<'c> {
    pub fn new(conn: &'c mut MySqlConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SchemaBackend for MySqlSchemaBackend<'_> {
    async fn table_exists(&mut self, table: &str) -> Result<bool, BotfleetError> {
        let count: i64 = sqlx::query_scalar(TABLE_EXISTS)
            .bind(table)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count > 0)
    }

    async fn live_columns(&mut self, table: &str) -> Result<LiveColumnSet, BotfleetError> {
        let rows: Vec<ColumnRow> = sqlx::query_as(LIVE_COLUMNS)
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(live_column).collect())
    }

    async fn apply(&mut self, statement: &DdlStatement) -> Result<(), BotfleetError> {
        let sql = statement.to_sql();
        (&mut *self.conn)
            .execute(sql.as_str())
            .await
            .map_err(|e| BotfleetError::Schema {
                table: statement.table().to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn live_column((name, column_type, nullable, default, key, extra): ColumnRow) -> LiveColumn {
    let key = key.unwrap_or_default();
    let extra = extra.unwrap_or_default().to_ascii_lowercase();
    LiveColumn {
        name,
        column_type: column_type.to_ascii_lowercase(),
        nullable: nullable.eq_ignore_ascii_case("yes"),
        default,
        primary_key: key.eq_ignore_ascii_case("pri"),
        unique: key.eq_ignore_ascii_case("uni"),
        auto_increment: extra.contains("auto_increment"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_information_schema_row() {
        let col = live_column((
            "id".into(),
            "INT(11)".into(),
            "NO".into(),
            None,
            Some("PRI".into()),
            Some("auto_increment".into()),
        ));
        assert_eq!(col.type_token(), "int");
        assert!(!col.nullable);
        assert!(col.primary_key && col.auto_increment && !col.unique);

        let col = live_column((
            "email".into(),
            "varchar(255)".into(),
            "YES".into(),
            None,
            Some("UNI".into()),
            Some(String::new()),
        ));
        assert!(col.unique && col.is_protected());
    }
}
