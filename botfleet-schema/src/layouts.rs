//! Compiled-in table layouts, one per tenant class.

use crate::column::ColumnSpec;
use crate::table::{SchemaDefinition, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Selects which layout a database is converged towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaClass {
    /// Reserved `gamebot` tenant; its database doubles as the tenant catalog.
    Gamebot,
    /// Reserved `website` tenant.
    Website,
    /// Any other (dedicated-database) tenant.
    Tenant,
}

impl SchemaClass {
    pub fn definition(self) -> &'static SchemaDefinition {
        match self {
            Self::Gamebot => &GAMEBOT_TABLES,
            Self::Website => &WEBSITE_TABLES,
            Self::Tenant => &TENANT_TABLES,
        }
    }
}

fn id() -> ColumnSpec {
    ColumnSpec::new("INT").auto_increment().primary_key()
}

fn varchar(len: u16) -> ColumnSpec {
    ColumnSpec::new(format!("VARCHAR({len})"))
}

fn created_at() -> ColumnSpec {
    ColumnSpec::new("TIMESTAMP").default_value("CURRENT_TIMESTAMP")
}

fn users_table(name_column: &str) -> TableDefinition {
    TableDefinition::new("users")
        .column("id", id())
        .column(name_column, varchar(255).not_null())
        .column("email", varchar(255).not_null().unique())
        .column("password", varchar(255).not_null())
        .column("created_at", created_at())
}

pub static GAMEBOT_TABLES: LazyLock<SchemaDefinition> = LazyLock::new(|| {
    SchemaDefinition::new().table(users_table("name")).table(
        TableDefinition::new("bots")
            .column("id", id())
            .column("name", varchar(255).not_null())
            .column("premium", ColumnSpec::new("BOOLEAN").default_value("false"))
            .column("use_db", ColumnSpec::new("BOOLEAN").default_value("false"))
            .column("db_host", varchar(255))
            .column("db_user", varchar(255))
            .column("db_password", varchar(255))
            .column("db_name", varchar(255))
            .column("db_port", varchar(255))
            .column("projectName", varchar(255))
            .column("encryption_key", varchar(255))
            .column("add_mode", varchar(50))
            .column("created_at", created_at())
            .column("status", varchar(50)),
    )
});

pub static WEBSITE_TABLES: LazyLock<SchemaDefinition> =
    LazyLock::new(|| SchemaDefinition::new().table(users_table("username")));

pub static TENANT_TABLES: LazyLock<SchemaDefinition> =
    LazyLock::new(|| SchemaDefinition::new().table(users_table("name")));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_layout_carries_tenant_columns() {
        let bots = SchemaClass::Gamebot
            .definition()
            .get("bots")
            .expect("bots table");
        for column in [
            "name",
            "premium",
            "db_host",
            "db_user",
            "db_password",
            "db_name",
            "db_port",
            "projectName",
            "encryption_key",
            "status",
            "created_at",
        ] {
            assert!(bots.get(column).is_some(), "missing {column}");
        }
        assert!(bots.get("id").is_some_and(ColumnSpec::is_protected));
    }

    #[test]
    fn website_users_use_username() {
        let users = SchemaClass::Website
            .definition()
            .get("users")
            .expect("users table");
        assert!(users.get("username").is_some());
        assert!(users.get("name").is_none());
    }
}
