use crate::column::ColumnSpec;
use crate::ident::quote_ident;
use serde::Serialize;
use std::fmt;

/// Where a modified column is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnPosition {
    First,
    After(String),
}

/// The statements convergence is allowed to issue. Nothing here drops data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DdlStatement {
    CreateTable {
        table: String,
        columns: Vec<(String, ColumnSpec)>,
    },
    AddColumn {
        table: String,
        column: String,
        spec: ColumnSpec,
    },
    ModifyColumn {
        table: String,
        column: String,
        spec: ColumnSpec,
        position: Option<ColumnPosition>,
    },
}

impl DdlStatement {
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::ModifyColumn { table, .. } => table,
        }
    }

    /// MySQL rendering.
    pub fn to_sql(&self) -> String {
        match self {
            Self::CreateTable { table, columns } => {
                let defs = columns
                    .iter()
                    .map(|(name, spec)| format!("{} {}", quote_ident(name), spec))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("CREATE TABLE IF NOT EXISTS {} ({defs})", quote_ident(table))
            }
            Self::AddColumn {
                table,
                column,
                spec,
            } => format!(
                "ALTER TABLE {} ADD COLUMN {} {spec}",
                quote_ident(table),
                quote_ident(column)
            ),
            Self::ModifyColumn {
                table,
                column,
                spec,
                position,
            } => {
                let mut sql = format!(
                    "ALTER TABLE {} MODIFY COLUMN {} {spec}",
                    quote_ident(table),
                    quote_ident(column)
                );
                match position {
                    Some(ColumnPosition::First) => sql.push_str(" FIRST"),
                    Some(ColumnPosition::After(prev)) => {
                        sql.push_str(" AFTER ");
                        sql.push_str(&quote_ident(prev));
                    }
                    None => {}
                }
                sql
            }
        }
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_create_table_in_declared_order() {
        let stmt = DdlStatement::CreateTable {
            table: "users".into(),
            columns: vec![
                (
                    "id".into(),
                    ColumnSpec::new("INT").auto_increment().primary_key(),
                ),
                ("name".into(), ColumnSpec::new("VARCHAR(255)").not_null()),
            ],
        };
        assert_eq!(
            stmt.to_sql(),
            "CREATE TABLE IF NOT EXISTS `users` (`id` INT AUTO_INCREMENT PRIMARY KEY, `name` VARCHAR(255) NOT NULL)"
        );
    }

    #[test]
    fn renders_positioned_modify() {
        let stmt = DdlStatement::ModifyColumn {
            table: "users".into(),
            column: "email".into(),
            spec: ColumnSpec::new("VARCHAR(255)"),
            position: Some(ColumnPosition::After("name".into())),
        };
        assert_eq!(
            stmt.to_sql(),
            "ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(255) AFTER `name`"
        );

        let stmt = DdlStatement::ModifyColumn {
            table: "users".into(),
            column: "name".into(),
            spec: ColumnSpec::new("TEXT"),
            position: Some(ColumnPosition::First),
        };
        assert_eq!(
            stmt.to_sql(),
            "ALTER TABLE `users` MODIFY COLUMN `name` TEXT FIRST"
        );
    }

    #[test]
    fn renders_add_column() {
        let stmt = DdlStatement::AddColumn {
            table: "bots".into(),
            column: "status".into(),
            spec: ColumnSpec::new("VARCHAR(50)"),
        };
        assert_eq!(stmt.to_sql(), "ALTER TABLE `bots` ADD COLUMN `status` VARCHAR(50)");
        assert_eq!(stmt.table(), "bots");
    }
}
