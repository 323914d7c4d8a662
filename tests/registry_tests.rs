use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use botfleet::BotfleetError;
use botfleet::config::DatabaseConfig;
use botfleet::db::{Catalog, ConnectionConfig, TenantRecord, TenantRegistry};
use botfleet_schema::SchemaClass;
use serde_json::json;

#[derive(Default)]
struct CountingCatalog {
    rows: Mutex<HashMap<String, TenantRecord>>,
    lookups: AtomicUsize,
}

impl CountingCatalog {
    fn with(self, row: serde_json::Value) -> Self {
        let record: TenantRecord = serde_json::from_value(row).expect("valid row");
        self.rows
            .lock()
            .expect("rows lock")
            .insert(record.name.clone(), record);
        self
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for CountingCatalog {
    async fn find_tenant(&self, name: &str) -> Result<Option<TenantRecord>, BotfleetError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().expect("rows lock").get(name).cloned())
    }
}

fn shared() -> DatabaseConfig {
    DatabaseConfig {
        host: "db.shared".into(),
        user: "fleet".into(),
        password: "pw".into(),
        ..DatabaseConfig::default()
    }
}

fn registry(catalog: Arc<CountingCatalog>, secret: Option<&str>) -> TenantRegistry {
    let db = shared();
    TenantRegistry::new(
        ConnectionConfig::gamebot(&db),
        ConnectionConfig::website(&db),
        secret.map(str::to_string),
        catalog,
    )
}

#[tokio::test]
async fn reserved_tenants_never_touch_the_catalog() {
    let catalog = Arc::new(CountingCatalog::default());
    let registry = registry(catalog.clone(), Some("process-secret"));

    let gamebot = registry.resolve("gamebot").await.expect("gamebot");
    assert_eq!(gamebot.connection.database, "gamebot");
    assert_eq!(gamebot.schema, Some(SchemaClass::Gamebot));

    let website = registry.resolve("Website").await.expect("website");
    assert_eq!(website.connection.database, "website");
    assert_eq!(website.schema, Some(SchemaClass::Website));

    let key = registry
        .resolve_encryption_key("GAMEBOT")
        .await
        .expect("key");
    assert_eq!(key.as_deref(), Some("process-secret"));

    assert_eq!(catalog.lookups(), 0);
}

#[tokio::test]
async fn unknown_tenant_is_not_found_and_not_cached() {
    let catalog = Arc::new(CountingCatalog::default());
    let registry = registry(catalog.clone(), None);

    let err = registry.resolve("acme").await.unwrap_err();
    assert!(matches!(err, BotfleetError::NotFound(ref t) if t == "acme"));
    assert!(err.is_datastore_failure());
    assert_eq!(catalog.lookups(), 1);

    assert!(registry.resolve("acme").await.is_err());
    assert_eq!(catalog.lookups(), 2);

    assert!(matches!(
        registry.resolve_encryption_key("acme").await,
        Err(BotfleetError::NotFound(_))
    ));
}

#[tokio::test]
async fn premium_tenant_gets_its_dedicated_database() {
    let catalog = Arc::new(CountingCatalog::default().with(json!({
        "name": "acme",
        "premium": true,
        "db_host": "db.acme",
        "db_user": "acme",
        "db_password": "secret",
        "db_name": "acme_bot",
        "db_port": "3307",
        "encryption_key": "acme-key"
    })));
    let registry = registry(catalog.clone(), None);

    let resolved = registry.resolve("acme").await.expect("acme");
    assert_eq!(resolved.schema, Some(SchemaClass::Tenant));
    assert_eq!(resolved.connection.host, "db.acme");
    assert_eq!(resolved.connection.port, 3307);
    assert_eq!(resolved.connection.identity(), "db.acme:3307/acme_bot");

    let key = registry.resolve_encryption_key("acme").await.expect("key");
    assert_eq!(key.as_deref(), Some("acme-key"));
}

#[tokio::test]
async fn regular_tenant_shares_the_catalog_without_converging_it() {
    let catalog = Arc::new(CountingCatalog::default().with(json!({
        "name": "corner-shop",
        "premium": false,
        "db_host": "ignored",
        "db_name": "ignored"
    })));
    let registry = registry(catalog, None);

    let resolved = registry.resolve("corner-shop").await.expect("tenant");
    assert_eq!(resolved.connection, ConnectionConfig::gamebot(&shared()));
    assert_eq!(resolved.schema, None);

    let key = registry
        .resolve_encryption_key("corner-shop")
        .await
        .expect("key");
    assert_eq!(key, None);
}

#[tokio::test]
async fn premium_tenant_without_credentials_falls_back_to_catalog() {
    let catalog = Arc::new(CountingCatalog::default().with(json!({
        "name": "halfway",
        "premium": 1,
        "db_host": "db.halfway"
    })));
    let registry = registry(catalog, None);

    let resolved = registry.resolve("halfway").await.expect("tenant");
    assert_eq!(resolved.connection.database, "gamebot");
    assert_eq!(resolved.connection.host, "db.shared");
    assert_eq!(resolved.schema, None);
}

#[tokio::test]
async fn resolutions_are_memoized_for_the_registry_lifetime() {
    let catalog = Arc::new(CountingCatalog::default().with(json!({
        "name": "acme",
        "premium": true,
        "db_host": "db.acme",
        "db_name": "acme_bot"
    })));
    let registry = registry(catalog.clone(), None);

    let first = registry.resolve("acme").await.expect("first");
    assert_eq!(first.connection.port, 3306);

    // A catalog edit after the first lookup is not observed.
    catalog.rows.lock().expect("rows lock").clear();
    let second = registry.clone().resolve("acme").await.expect("second");

    assert_eq!(first, second);
    assert_eq!(catalog.lookups(), 1);
}
