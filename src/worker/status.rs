use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::db::{Entry, TenantDataClient, TenantStatus};

/// Persists status transitions onto the tenant's catalog row.
#[derive(Clone)]
pub struct StatusRecorder {
    catalog: Arc<TenantDataClient>,
    tenant: String,
}

impl StatusRecorder {
    pub fn new(catalog: Arc<TenantDataClient>, tenant: impl Into<String>) -> Self {
        Self {
            catalog,
            tenant: tenant.into(),
        }
    }

    /// Failures are logged; a worker keeps running when its status cannot be written.
    pub async fn record(&self, status: TenantStatus) -> bool {
        let criteria = object(json!({ "name": self.tenant }));
        let updates = object(json!({ "status": status.as_str() }));
        match self.catalog.update_entry("bots", &criteria, &updates).await {
            Ok(0) => {
                warn!(tenant = %self.tenant, status = %status, "No catalog row to record status on");
                false
            }
            Ok(_) => {
                info!(tenant = %self.tenant, status = %status, "Status recorded");
                true
            }
            Err(_) => false,
        }
    }
}

fn object(value: Value) -> Entry {
    match value {
        Value::Object(map) => map,
        _ => Entry::new(),
    }
}
