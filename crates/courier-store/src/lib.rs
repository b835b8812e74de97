//! # Courier Store
//!
//! Audit log persistence for the courier relay.
//!
//! ## Overview
//!
//! Every execution attempt the relay makes is recorded as one
//! [`AuditLogEntry`]. Writers go through the scoped-transaction contract
//! ([`AuditSink`] / [`AuditScope`]): each attempt opens its own scope,
//! begins a transaction, appends exactly one entry and commits, or rolls
//! back on failure. Scopes are never shared between attempts.
//!
//! ## Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`DuckDbAuditStore`] | Durable `DuckDB` file, pooled connections |
//! | [`MemoryAuditStore`] | In-process, for tests and dry runs |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier_store::{write_one, AuditLogEntry, AuditSink, AuditStoreConfig, AuditFilter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = courier_store::open(AuditStoreConfig::default())?;
//!
//!     let entry = AuditLogEntry::new("kakao_profile", true, 42.0);
//!     write_one(store.scope().as_mut(), &entry)?;
//!
//!     let recent = store.recent(&AuditFilter::default(), 10)?;
//!     println!("{} entries", recent.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `external_api_log` | One row per execution attempt |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
mod audit;
mod memory;
mod migrations;
mod record;
mod scope;

use std::env;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

pub use audit::DuckDbAuditStore;
pub use duckdb::{DuckDbConnectionManager, PooledConnection};
pub use memory::MemoryAuditStore;
pub use record::{AuditFilter, AuditLogEntry};
pub use scope::{write_one, AuditScope, AuditSink};

/// Errors that can occur during audit storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (creating the database directory).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Transaction protocol misuse or backend refusal.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A stored row could not be mapped back to an entry.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Configuration for the audit database.
#[derive(Debug, Clone)]
pub struct AuditStoreConfig {
    /// Root directory for courier data.
    pub courier_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for AuditStoreConfig {
    fn default() -> Self {
        Self::with_home(resolve_courier_home())
    }
}

impl AuditStoreConfig {
    pub fn with_home(courier_home: PathBuf) -> Self {
        let db_path = courier_home.join("audit").join("audit.duckdb");
        Self {
            courier_home,
            db_path,
            max_pool_size: 4,
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

/// Open (creating if needed) the audit database described by `config`.
pub fn open(config: AuditStoreConfig) -> Result<DuckDbAuditStore, StoreError> {
    if let Some(parent) = config.db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
    DuckDbAuditStore::from_manager(manager)
}

/// Open a throwaway in-memory `DuckDB` audit database.
pub fn open_in_memory() -> Result<DuckDbAuditStore, StoreError> {
    let manager = DuckDbConnectionManager::open_in_memory(4)?;
    DuckDbAuditStore::from_manager(manager)
}

/// Resolve the courier home directory from environment or default.
fn resolve_courier_home() -> PathBuf {
    if let Some(path) = env::var_os("COURIER_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".courier");
    }

    PathBuf::from(".courier")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn open_temp() -> (tempfile::TempDir, DuckDbAuditStore) {
        let temp = tempdir().expect("tempdir");
        let config = AuditStoreConfig::with_home(temp.path().join("courier-home"));
        let store = open(config).expect("audit store open");
        (temp, store)
    }

    fn sample_data() -> Map<String, Value> {
        match json!({ "id": 99999, "connected_at": "2026-02-20T10:00:00Z" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn creates_database_under_courier_home() {
        let temp = tempdir().expect("tempdir");
        let home = temp.path().join("nested").join("home");
        let config = AuditStoreConfig::with_home(home.clone());

        let store = open(config).expect("audit store open");

        assert_eq!(store.manager().db_path(), home.join("audit").join("audit.duckdb"));
        assert!(home.join("audit").join("audit.duckdb").exists());
    }

    #[test]
    fn committed_entry_round_trips_through_duckdb() {
        let (_temp, store) = open_temp();
        let task_id = Uuid::new_v4();
        let entry = AuditLogEntry::new("kakao_profile", true, 18.25)
            .with_task(task_id, 1)
            .with_data(sample_data());

        write_one(store.scope().as_mut(), &entry).expect("write");

        let stored = store.recent(&AuditFilter::default(), 10).expect("recent");
        assert_eq!(stored, vec![entry]);
    }

    #[test]
    fn rolled_back_scope_leaves_no_row() {
        let (_temp, store) = open_temp();
        let mut scope = store.scope();

        scope.begin().expect("begin");
        scope
            .append(&AuditLogEntry::new("kakao_profile", false, 1.0))
            .expect("append");
        scope.rollback();

        assert_eq!(store.count(&AuditFilter::default()).expect("count"), 0);
    }

    #[test]
    fn dropped_scope_rolls_back() {
        let (_temp, store) = open_temp();
        {
            let mut scope = store.scope();
            scope.begin().expect("begin");
            scope
                .append(&AuditLogEntry::new("kakao_profile", false, 1.0))
                .expect("append");
        }

        assert_eq!(store.count(&AuditFilter::default()).expect("count"), 0);
    }

    #[test]
    fn hostile_strings_are_stored_verbatim() {
        let (_temp, store) = open_temp();
        let message = r#"boom'); DROP TABLE external_api_log; --"#;
        let entry = AuditLogEntry::new("kakao_profile", false, 2.0).with_failure(
            "provider.bad_status",
            message,
            false,
        );

        write_one(store.scope().as_mut(), &entry).expect("write");

        let stored = store.recent(&AuditFilter::default(), 1).expect("recent");
        assert_eq!(stored[0].error_message.as_deref(), Some(message));
    }

    #[test]
    fn recent_filters_by_provider_and_task_newest_first() {
        let (_temp, store) = open_temp();
        let task_id = Uuid::new_v4();

        for attempt in 1..=3 {
            let entry = AuditLogEntry::new("kakao_profile", false, 1.0).with_task(task_id, attempt);
            write_one(store.scope().as_mut(), &entry).expect("write");
        }
        let other = AuditLogEntry::new("kakao_message", true, 1.0);
        write_one(store.scope().as_mut(), &other).expect("write");

        let by_task = store
            .recent(
                &AuditFilter {
                    provider: None,
                    task_id: Some(task_id),
                },
                10,
            )
            .expect("recent");
        let attempts: Vec<_> = by_task.iter().map(|entry| entry.attempt).collect();
        assert_eq!(attempts, vec![Some(3), Some(2), Some(1)]);

        let by_provider = store
            .count(&AuditFilter {
                provider: Some(String::from("kakao_message")),
                task_id: None,
            })
            .expect("count");
        assert_eq!(by_provider, 1);
    }

    #[test]
    fn unbounded_limit_returns_every_entry() {
        let (_temp, store) = open_temp();
        for _ in 0..2 {
            write_one(
                store.scope().as_mut(),
                &AuditLogEntry::new("kakao_profile", true, 1.0),
            )
            .expect("write");
        }

        let stored = store.recent(&AuditFilter::default(), usize::MAX).expect("recent");
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn concurrent_scopes_write_independent_rows() {
        let (_temp, store) = open_temp();

        let handles: Vec<_> = (0..4)
            .map(|index| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let entry = AuditLogEntry::new("kakao_profile", index % 2 == 0, 1.0);
                    write_one(store.scope().as_mut(), &entry)
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("join").expect("write");
        }
        assert_eq!(store.count(&AuditFilter::default()).expect("count"), 4);
    }

    #[test]
    fn in_memory_duckdb_store_is_isolated() {
        let store = open_in_memory().expect("in-memory store");
        write_one(
            store.scope().as_mut(),
            &AuditLogEntry::new("kakao_profile", true, 1.0),
        )
        .expect("write");

        let fresh = open_in_memory().expect("second store");
        assert_eq!(store.count(&AuditFilter::default()).expect("count"), 1);
        assert_eq!(fresh.count(&AuditFilter::default()).expect("count"), 0);
    }
}
