//! # Test Suite Light
//!
//! Lightweight database state reset between automated tests: connection
//! aliasing plus dirty-table truncation for MySQL, PostgreSQL and SQLite.
//!
//! ## Overview
//!
//! Re-running migrations or re-seeding fixtures between tests is slow.
//! This crate instead aliases every configured connection onto a
//! `test`-named counterpart, watches which tables each test actually
//! mutated, and truncates exactly those before the next test, with
//! dialect-correct foreign-key handling and auto-increment reset.
//!
//! ## Key Components
//!
//! - [`connection`] - Connection registry, driver kinds and pool handles
//! - [`aliaser`] - The `test`/`test_` naming convention and alias map
//! - [`sniffer`] - Per-dialect table listing, dirty detection, truncation
//! - [`manager`] - The [`FixtureManager`] orchestrator the test runner calls
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use test_suite_light::{
//!     Connection, ConnectionRegistry, DbPool, DriverKind, FixtureConfig, FixtureManager,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ConnectionRegistry::new());
//! let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
//! registry.register(Connection::new(
//!     "test",
//!     DriverKind::Sqlite,
//!     DbPool::Sqlite(pool),
//! ));
//!
//! // Aliases install once, at construction.
//! let manager = FixtureManager::new(registry, FixtureConfig::default())?;
//!
//! // ... run a test that writes through the aliased connections ...
//!
//! // Back to clean state for the next test.
//! manager.reset_dirty_state().await?;
//! # Ok(())
//! # }
//! ```

pub mod aliaser;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod manager;
pub mod sniffer;

pub use aliaser::{compute_aliases, AliasMap};
pub use config::FixtureConfig;
pub use connection::{Connection, ConnectionRegistry, DbPool, DriverKind};
pub use error::{FixtureError, Result};
pub use manager::{is_test_connection, FixtureManager};
pub use sniffer::{
    MysqlTableSniffer, PostgresTableSniffer, SnifferRegistry, SqliteTableSniffer, TableSniffer,
};
