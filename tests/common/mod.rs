//! Common test utilities and helpers
//!
//! Shared infrastructure for the database-backed integration tests.

use cadastro::config::{ConnectionConfig, Settings, SslMode};
use cadastro::db::{PgPool, Session, SessionSource};
use cadastro::records::{QueryRequest, RecordStore};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test database connection config from `TEST_DB_*`
pub fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        name: "integration-test".to_string(),
        host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5433),
        database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "test_db".to_string()),
        username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "test_user".to_string()),
        password: Some(
            std::env::var("TEST_DB_PASSWORD").unwrap_or_else(|_| "test_password".to_string()),
        ),
        ssl_mode: SslMode::Disable,
    }
}

/// A store over the test database, or `None` (after logging why) when it
/// cannot be reached
pub async fn test_store() -> Option<RecordStore<PgPool>> {
    let config = test_config();
    let settings = Settings {
        pool_max_size: 4,
        pool_wait_timeout_secs: 5,
        ..Settings::default()
    };
    let pool = match PgPool::new(&config, &settings) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Skipping test: invalid test database config - {}", e);
            return None;
        }
    };
    let store = RecordStore::new(pool);
    if let Err(e) = store.query(&QueryRequest::new("SELECT 1", vec![])).await {
        eprintln!(
            "Skipping test: Database not available at {}:{} - {}",
            config.host, config.port, e
        );
        return None;
    }
    Some(store)
}

/// A table name unique to this test process and call
pub fn unique_table(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "{}_{}_{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Run DDL/fixture statements on a fresh session
pub async fn exec(store: &RecordStore<PgPool>, statements: &[&str]) {
    let mut session = store.source().acquire().await.unwrap();
    for sql in statements {
        session.execute(sql, &[]).await.unwrap();
    }
}
