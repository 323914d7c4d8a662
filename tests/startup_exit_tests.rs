use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use botfleet::BotfleetError;
use botfleet::config::DatabaseConfig;
use botfleet::db::{
    Catalog, ConnectionConfig, GAMEBOT_TENANT, TenantDataClient, TenantRecord, TenantRegistry,
    VerifiedDatabases,
};
use botfleet::supervisor::{EXIT_DATASTORE, EXIT_FATAL, load_roster, startup_exit_code};
use botfleet::worker::{self, IdleSession, WorkerArgs};
use serde_json::json;

/// Nothing listens on port 1, so connecting fails immediately.
fn unreachable_database() -> DatabaseConfig {
    DatabaseConfig {
        host: "127.0.0.1".into(),
        port: 1,
        ..DatabaseConfig::default()
    }
}

struct EmptyCatalog;

#[async_trait]
impl Catalog for EmptyCatalog {
    async fn find_tenant(&self, _name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        Ok(None)
    }
}

struct FixedCatalog(TenantRecord);

#[async_trait]
impl Catalog for FixedCatalog {
    async fn find_tenant(&self, name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        Ok((name == self.0.name).then(|| self.0.clone()))
    }
}

struct BrokenCatalog;

#[async_trait]
impl Catalog for BrokenCatalog {
    async fn find_tenant(&self, _name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        Err(BotfleetError::Process("catalog reader crashed".into()))
    }
}

fn registry(catalog: Arc<dyn Catalog>) -> TenantRegistry {
    let db = unreachable_database();
    TenantRegistry::new(
        ConnectionConfig::gamebot(&db),
        ConnectionConfig::website(&db),
        None,
        catalog,
    )
}

async fn run_worker(tenant: &str, registry: TenantRegistry) -> i32 {
    let args = WorkerArgs::parse([tenant]).expect("valid args");
    worker::run_with(
        args,
        registry,
        PathBuf::from("backups"),
        Box::new(IdleSession),
    )
    .await
}

#[tokio::test]
async fn unknown_tenant_exits_with_datastore_code() {
    let code = run_worker("ghost", registry(Arc::new(EmptyCatalog))).await;
    assert_eq!(code, EXIT_DATASTORE);
}

#[tokio::test]
async fn unreachable_tenant_database_exits_with_datastore_code() {
    let record: TenantRecord = serde_json::from_value(json!({
        "name": "acme",
        "premium": true,
        "db_host": "127.0.0.1",
        "db_name": "acme_bot",
        "db_port": "1"
    }))
    .expect("valid record");
    let code = run_worker("acme", registry(Arc::new(FixedCatalog(record)))).await;
    assert_eq!(code, EXIT_DATASTORE);
}

#[tokio::test]
async fn non_datastore_startup_failure_is_fatal() {
    let code = run_worker("acme", registry(Arc::new(BrokenCatalog))).await;
    assert_eq!(code, EXIT_FATAL);
}

#[test]
fn missing_tenant_argument_is_fatal() {
    let err = WorkerArgs::parse(Vec::<String>::new()).unwrap_err();
    assert_eq!(startup_exit_code(&err), EXIT_FATAL);

    let err = WorkerArgs::parse(["  "]).unwrap_err();
    assert_eq!(startup_exit_code(&err), EXIT_FATAL);
}

#[tokio::test]
async fn unreachable_catalog_stops_the_supervisor_with_datastore_code() {
    let catalog = TenantDataClient::new(
        GAMEBOT_TENANT,
        registry(Arc::new(EmptyCatalog)),
        VerifiedDatabases::new(),
    );
    let err = load_roster(&catalog, "Gamebot").await.unwrap_err();
    assert!(matches!(err, BotfleetError::Connection(_)));
    assert_eq!(startup_exit_code(&err), EXIT_DATASTORE);
}
