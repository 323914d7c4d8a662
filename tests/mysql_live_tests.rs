//! Runs against a real MySQL server. Opt in with `BOTFLEET_TEST_MYSQL=1`; the server comes
//! from the usual `BOTFLEET_DATABASE__*` settings and the scratch database (which must
//! already exist) from `BOTFLEET_TEST_DATABASE` (default `botfleet_test`).

use std::sync::Arc;

use async_trait::async_trait;
use botfleet::BotfleetError;
use botfleet::config::Config;
use botfleet::db::{
    Catalog, ConnectionConfig, MySqlSchemaBackend, SchemaSynchronizer, TenantDataClient,
    TenantRecord, TenantRegistry, VerifiedDatabases,
};
use botfleet_schema::SchemaClass;
use serde_json::{Value, json};
use sqlx::Connection;
use sqlx::mysql::MySqlConnection;

const TENANT: &str = "itest";

fn enabled() -> bool {
    std::env::var("BOTFLEET_TEST_MYSQL").is_ok_and(|v| v == "1")
}

struct ScratchCatalog {
    record: TenantRecord,
}

#[async_trait]
impl Catalog for ScratchCatalog {
    async fn find_tenant(&self, name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        Ok((name == self.record.name).then(|| self.record.clone()))
    }
}

fn scratch_connection() -> ConnectionConfig {
    let cfg = Config::load().expect("config loads");
    let mut connection = ConnectionConfig::gamebot(&cfg.database);
    connection.database =
        std::env::var("BOTFLEET_TEST_DATABASE").unwrap_or_else(|_| "botfleet_test".to_string());
    connection
}

fn registry(connection: &ConnectionConfig) -> TenantRegistry {
    let record: TenantRecord = serde_json::from_value(json!({
        "name": TENANT,
        "premium": true,
        "db_host": connection.host,
        "db_user": connection.user,
        "db_password": connection.password,
        "db_name": connection.database,
        "db_port": connection.port.to_string(),
        "encryption_key": "itest-key"
    }))
    .expect("valid record");
    TenantRegistry::new(
        connection.clone(),
        connection.clone(),
        None,
        Arc::new(ScratchCatalog { record }),
    )
}

fn entry(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn convergence_recreates_dropped_tables_and_then_settles() {
    if !enabled() {
        return;
    }
    let connection = scratch_connection();
    let registry = registry(&connection);

    let first = TenantDataClient::new(TENANT, registry.clone(), VerifiedDatabases::new());
    first.connect().await.expect("first connect");
    first.drop_table("users").await.expect("drop users");
    assert!(!first.table_exists("users").await.unwrap());

    // A fresh process-wide set converges again on connect.
    let second = TenantDataClient::new(TENANT, registry, VerifiedDatabases::new());
    assert!(second.table_exists("users").await.unwrap());

    let mut conn = MySqlConnection::connect_with(&connection.connect_options())
        .await
        .expect("raw connection");
    let mut backend = MySqlSchemaBackend::new(&mut conn);
    let report = SchemaSynchronizer::new()
        .converge(&mut backend, SchemaClass::Tenant.definition())
        .await;
    assert!(report.is_noop(), "{report:?}");
}

#[tokio::test]
async fn entries_round_trip_through_the_tenant_client() {
    if !enabled() {
        return;
    }
    let connection = scratch_connection();
    let client = TenantDataClient::new(TENANT, registry(&connection), VerifiedDatabases::new());
    client.connect().await.expect("connect");
    client
        .alter_table("users", "AUTO_INCREMENT = 1")
        .await
        .expect("alter");

    let ada = entry(json!({ "name": "ada", "email": "ada@example.com", "password": "x" }));
    let id = client.add_entry("users", &ada).await.expect("insert");
    assert!(id > 0);

    let found = client
        .find_entry("users", &entry(json!({ "id": id })))
        .await
        .expect("find")
        .expect("row present");
    assert_eq!(found["name"], "ada");
    assert_eq!(found["email"], "ada@example.com");

    let changed = client
        .update_entry(
            "users",
            &entry(json!({ "id": id })),
            &entry(json!({ "name": "ada lovelace" })),
        )
        .await
        .expect("update");
    assert_eq!(changed, 1);

    let rows = client
        .find_entries("users", &entry(json!({ "name": "ada lovelace" })))
        .await
        .expect("find entries");
    assert_eq!(rows.len(), 1);

    let dupes = client
        .check_for_duplicates("users", &["name"])
        .await
        .expect("duplicates");
    assert!(dupes.is_empty());

    let secret = client.encrypt("hunter2").await.expect("encrypt");
    assert_ne!(secret, "hunter2");
    assert_eq!(client.decrypt(&secret).await.expect("decrypt"), "hunter2");

    let deleted = client
        .delete_entry("users", &entry(json!({ "id": id })))
        .await
        .expect("delete");
    assert_eq!(deleted, 1);
    assert!(
        client
            .find_entry("users", &entry(json!({ "id": id })))
            .await
            .unwrap()
            .is_none()
    );

    let dir = std::env::temp_dir().join(format!("botfleet-backup-{}", std::process::id()));
    let summary = client.backup_database(&dir).await.expect("backup");
    assert!(summary.tables.iter().any(|t| t == "users"));
    assert!(summary.directory.join("users.json").is_file());
    let _ = std::fs::remove_dir_all(&dir);
}
