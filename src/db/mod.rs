//! Tenant database layer.
//!
//! Layout:
//! - `registry.rs`: tenant name -> connection parameters and encryption key
//! - `sync/`: schema convergence and the per-process verified set
//! - `client.rs`: per-tenant CRUD facade over one lazy connection

pub mod catalog;
pub mod client;
pub mod models;
pub mod registry;
pub mod sync;
pub mod value;

pub use catalog::{Catalog, MySqlCatalog};
pub use client::{BackupSummary, TenantDataClient};
pub use models::{ConnectionConfig, TenantRecord, TenantStatus};
pub use registry::{GAMEBOT_TENANT, ResolvedTenant, TenantRegistry, WEBSITE_TENANT, reserved_class};
pub use sync::{
    ConvergenceReport, MySqlSchemaBackend, SchemaBackend, SchemaSynchronizer, VerifiedClaim,
    VerifiedDatabases,
};
pub use value::Entry;
