//! Opt-in like `mysql_live_tests.rs` (`BOTFLEET_TEST_MYSQL=1`). Kept in its own test binary
//! because it kills every other session on the scratch database.

use std::sync::Arc;

use async_trait::async_trait;
use botfleet::BotfleetError;
use botfleet::config::Config;
use botfleet::db::{
    Catalog, ConnectionConfig, TenantDataClient, TenantRecord, TenantRegistry, VerifiedDatabases,
};
use serde_json::json;
use sqlx::Connection;
use sqlx::mysql::MySqlConnection;

struct ScratchCatalog(TenantRecord);

#[async_trait]
impl Catalog for ScratchCatalog {
    async fn find_tenant(&self, name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        Ok((name == self.0.name).then(|| self.0.clone()))
    }
}

#[tokio::test]
async fn client_reconnects_after_the_server_drops_its_session() {
    if !std::env::var("BOTFLEET_TEST_MYSQL").is_ok_and(|v| v == "1") {
        return;
    }
    let cfg = Config::load().expect("config loads");
    let mut connection = ConnectionConfig::gamebot(&cfg.database);
    connection.database =
        std::env::var("BOTFLEET_TEST_DATABASE").unwrap_or_else(|_| "botfleet_test".to_string());

    let record: TenantRecord = serde_json::from_value(json!({
        "name": "itest",
        "premium": true,
        "db_host": connection.host,
        "db_user": connection.user,
        "db_password": connection.password,
        "db_name": connection.database,
        "db_port": connection.port.to_string()
    }))
    .expect("valid record");
    let registry = TenantRegistry::new(
        connection.clone(),
        connection.clone(),
        None,
        Arc::new(ScratchCatalog(record)),
    );
    let client = TenantDataClient::new("itest", registry, VerifiedDatabases::new());
    assert!(client.table_exists("users").await.expect("first use"));

    let mut admin = MySqlConnection::connect_with(&connection.connect_options())
        .await
        .expect("admin connection");
    let victims: Vec<u64> = sqlx::query_scalar(
        "SELECT ID FROM information_schema.PROCESSLIST WHERE DB = ? AND ID <> CONNECTION_ID()",
    )
    .bind(&connection.database)
    .fetch_all(&mut admin)
    .await
    .expect("process list");
    assert!(!victims.is_empty());
    for id in victims {
        sqlx::query(&format!("KILL {id}"))
            .execute(&mut admin)
            .await
            .expect("kill session");
    }

    let err = client.table_exists("users").await.unwrap_err();
    assert!(err.is_connection_lost(), "{err:?}");
    assert!(client.table_exists("users").await.expect("reconnected"));
}
