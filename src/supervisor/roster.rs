//! Which workers the supervisor launches at startup: one per catalog row.

use serde_json::Value;
use tracing::warn;

use crate::db::{Entry, TenantDataClient};
use crate::error::BotfleetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantLaunch {
    pub tenant: String,
    pub project: String,
}

/// Connects the catalog client (converging the catalog on first use) and reads every
/// tenant row. Any failure here leaves the supervisor without its datastore.
pub async fn load_roster(
    catalog: &TenantDataClient,
    default_project: &str,
) -> Result<Vec<TenantLaunch>, BotfleetError> {
    catalog.connect().await?;
    let rows = catalog.get_table_as_json("bots").await?;
    Ok(launches_from_rows(&rows, default_project))
}

/// Rows without a name are skipped; a blank `projectName` falls back to `default_project`.
pub fn launches_from_rows(rows: &[Entry], default_project: &str) -> Vec<TenantLaunch> {
    rows.iter()
        .filter_map(|row| {
            let Some(tenant) = row
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
            else {
                warn!("Skipping catalog row without a name");
                return None;
            };
            let project = row
                .get("projectName")
                .and_then(Value::as_str)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(default_project);
            Some(TenantLaunch {
                tenant: tenant.to_string(),
                project: project.to_string(),
            })
        })
        .collect()
}
