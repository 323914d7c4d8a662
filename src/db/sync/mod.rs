//! Non-destructive convergence of a live schema towards a [`SchemaDefinition`].
//!
//! Each table is reconciled independently: a failure on one table is logged and the pass
//! moves on, leaving a partially converged database rather than rolling anything back.
//! Every decision is a comparison against freshly introspected state, so a second pass
//! over a converged database issues no DDL.

mod backend;

pub use backend::{MySqlSchemaBackend, SchemaBackend};

use ahash::AHashSet;
use botfleet_schema::{ColumnPosition, DdlStatement, SchemaDefinition, TableDefinition};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::error::BotfleetError;

/// Outcome of one convergence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Statements that executed successfully, in issue order.
    pub executed: Vec<DdlStatement>,
    /// Tables whose reconciliation stopped on an error.
    pub failed_tables: Vec<String>,
}

impl ConvergenceReport {
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty() && self.failed_tables.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaSynchronizer;

impl SchemaSynchronizer {
    pub fn new() -> Self {
        Self
    }

    /// Reconciles every table of `definition`, in definition order.
    pub async fn converge<B>(&self, backend: &mut B, definition: &SchemaDefinition) -> ConvergenceReport
    where
        B: SchemaBackend + ?Sized,
    {
        let mut report = ConvergenceReport::default();
        for table in definition.tables() {
            if let Err(e) = converge_table(backend, table, &mut report.executed).await {
                error!(table = %table.name(), error = %e, "schema convergence failed; skipping table");
                report.failed_tables.push(table.name().to_string());
            }
        }
        info!(
            statements = report.executed.len(),
            failed = report.failed_tables.len(),
            "schema convergence finished"
        );
        report
    }
}

async fn converge_table<B>(
    backend: &mut B,
    table: &TableDefinition,
    executed: &mut Vec<DdlStatement>,
) -> Result<(), BotfleetError>
where
    B: SchemaBackend + ?Sized,
{
    let name = table.name();

    if !backend.table_exists(name).await? {
        let stmt = DdlStatement::CreateTable {
            table: name.to_string(),
            columns: table.columns().to_vec(),
        };
        apply(backend, stmt, executed).await?;
        info!(table = %name, "table created");
        return Ok(());
    }

    let live = backend.live_columns(name).await?;
    // Tracks the live ordinal order as statements are issued.
    let mut order = live.names();

    for (column, spec) in table.columns() {
        match live.get(column) {
            None => {
                let stmt = DdlStatement::AddColumn {
                    table: name.to_string(),
                    column: column.clone(),
                    spec: spec.clone(),
                };
                apply(backend, stmt, executed).await?;
                order.push(column.clone());
                info!(table = %name, column = %column, "column added");
            }
            Some(existing) if existing.is_protected() => {}
            Some(existing) if existing.type_token() != spec.type_token() => {
                let stmt = DdlStatement::ModifyColumn {
                    table: name.to_string(),
                    column: column.clone(),
                    spec: spec.clone(),
                    position: None,
                };
                apply(backend, stmt, executed).await?;
                info!(
                    table = %name,
                    column = %column,
                    from = %existing.column_type,
                    to = %spec.base_type,
                    "column type changed"
                );
            }
            Some(_) => {}
        }
    }

    let declared = table.columns();
    for (idx, (column, spec)) in declared.iter().enumerate() {
        if spec.is_protected() || live.get(column).is_some_and(|c| c.is_protected()) {
            continue;
        }
        let position = match idx {
            0 => ColumnPosition::First,
            _ => ColumnPosition::After(declared[idx - 1].0.clone()),
        };
        if in_position(&order, column, &position) {
            continue;
        }
        let stmt = DdlStatement::ModifyColumn {
            table: name.to_string(),
            column: column.clone(),
            spec: spec.clone(),
            position: Some(position.clone()),
        };
        apply(backend, stmt, executed).await?;
        move_column(&mut order, column, &position);
        debug!(table = %name, column = %column, "column reordered");
    }

    Ok(())
}

async fn apply<B>(
    backend: &mut B,
    stmt: DdlStatement,
    executed: &mut Vec<DdlStatement>,
) -> Result<(), BotfleetError>
where
    B: SchemaBackend + ?Sized,
{
    debug!(sql = %stmt, "applying ddl");
    backend.apply(&stmt).await?;
    executed.push(stmt);
    Ok(())
}

fn in_position(order: &[String], column: &str, position: &ColumnPosition) -> bool {
    let Some(current) = order.iter().position(|c| c == column) else {
        return false;
    };
    match position {
        ColumnPosition::First => current == 0,
        ColumnPosition::After(prev) => order
            .iter()
            .position(|c| c == prev)
            .is_some_and(|p| p + 1 == current),
    }
}

/// Mirrors the effect of `MODIFY COLUMN ... FIRST | AFTER` on the tracked order.
pub(crate) fn move_column(order: &mut Vec<String>, column: &str, position: &ColumnPosition) {
    if let Some(current) = order.iter().position(|c| c == column) {
        order.remove(current);
    }
    let target = match position {
        ColumnPosition::First => 0,
        ColumnPosition::After(prev) => order
            .iter()
            .position(|c| c == prev)
            .map_or(order.len(), |p| p + 1),
    };
    order.insert(target, column.to_string());
}

/// Database identities already converged by this process.
///
/// Cloning shares the underlying set. A claim holds the set's lock until it is completed or
/// dropped, so concurrent requests for the same database wait for the first pass instead of
/// running their own.
#[derive(Debug, Clone, Default)]
pub struct VerifiedDatabases {
    inner: Arc<Mutex<AHashSet<String>>>,
}

impl VerifiedDatabases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a claim when `identity` has not been converged yet, `None` otherwise.
    pub async fn claim(&self, identity: &str) -> Option<VerifiedClaim> {
        let guard = self.inner.clone().lock_owned().await;
        if guard.contains(identity) {
            return None;
        }
        Some(VerifiedClaim {
            guard,
            identity: identity.to_string(),
        })
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.inner.lock().await.contains(identity)
    }
}

/// Exclusive right to converge one database. Dropping it without [`VerifiedClaim::complete`]
/// leaves the database unverified.
#[derive(Debug)]
pub struct VerifiedClaim {
    guard: OwnedMutexGuard<AHashSet<String>>,
    identity: String,
}

impl VerifiedClaim {
    pub fn complete(mut self) {
        self.guard.insert(self.identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn move_column_after_predecessor() {
        let mut order = names(&["id", "b", "a", "c"]);
        move_column(&mut order, "a", &ColumnPosition::After("id".into()));
        assert_eq!(order, names(&["id", "a", "b", "c"]));

        move_column(&mut order, "c", &ColumnPosition::First);
        assert_eq!(order, names(&["c", "id", "a", "b"]));
    }

    #[test]
    fn position_checks() {
        let order = names(&["id", "name", "email"]);
        assert!(in_position(&order, "id", &ColumnPosition::First));
        assert!(in_position(&order, "name", &ColumnPosition::After("id".into())));
        assert!(!in_position(&order, "email", &ColumnPosition::After("id".into())));
        assert!(!in_position(&order, "missing", &ColumnPosition::First));
    }

    #[tokio::test]
    async fn claims_are_single_use_once_completed() {
        let verified = VerifiedDatabases::new();
        let claim = verified.claim("h:3306/db").await.expect("first claim");
        claim.complete();
        assert!(verified.claim("h:3306/db").await.is_none());
        assert!(verified.contains("h:3306/db").await);
    }

    #[tokio::test]
    async fn dropped_claim_leaves_database_unverified() {
        let verified = VerifiedDatabases::new();
        drop(verified.claim("db").await);
        assert!(verified.claim("db").await.is_some());
    }
}
