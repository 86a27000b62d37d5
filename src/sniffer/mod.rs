//! # Table Sniffers
//!
//! Dialect-specific table discovery, dirty-table detection and truncation.
//!
//! ## Overview
//!
//! A sniffer owns one connection and answers four questions about it:
//! which user tables exist, which of them were mutated since the last
//! reset, how to empty a given set of them with constraints and counters
//! handled correctly, and how to drop the whole schema. The three SQL
//! dialects differ enough in catalog metadata and truncation semantics
//! (foreign-key handling, auto-increment reset, `TRUNCATE` availability)
//! that each gets its own implementation behind the [`TableSniffer`]
//! contract.
//!
//! ## Dirty detection
//!
//! Dirtiness is catalog-derived: a table is reported dirty when it holds
//! rows or its auto-increment/sequence counter has advanced. Under the
//! crate's own invariant that every table starts empty with a fresh
//! counter, this never misses a mutated table: inserts and updates leave
//! rows behind, and an insert-then-delete leaves an advanced counter. A
//! table with no rows and an untouched counter is indistinguishable from
//! clean, and truncating it would be a no-op anyway. False positives are
//! acceptable; false negatives are not.
//!
//! ## Dispatch
//!
//! Sniffer selection is a closed registration table keyed by
//! [`DriverKind`](crate::connection::DriverKind), overridable per driver
//! from configuration. An unrecognized driver is a configuration error
//! surfaced at resolution time, never a silent skip.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::config::FixtureConfig;
use crate::connection::{Connection, DriverKind};
use crate::error::{FixtureError, Result};

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MysqlTableSniffer;
pub use postgres::PostgresTableSniffer;
pub use sqlite::SqliteTableSniffer;

/// Per-dialect capability contract over one connection.
#[async_trait]
pub trait TableSniffer: Send + Sync {
    /// Logical name of the connection this sniffer operates on.
    fn connection_name(&self) -> &str;

    /// All user tables, sorted, system/catalog tables excluded.
    async fn all_tables(&self) -> Result<Vec<String>>;

    /// Tables mutated since the last truncation. Sound, not precise:
    /// never omits a truly-dirty table, may include clean ones.
    async fn dirty_tables(&self) -> Result<BTreeSet<String>>;

    /// Empty exactly the given tables, preserving schema and resetting
    /// auto-increment/sequence counters. An empty set is a no-op.
    async fn truncate_tables(&self, tables: &BTreeSet<String>) -> Result<()>;

    /// Drop every user table, in dependency-safe order.
    async fn drop_all_tables(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn TableSniffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSniffer")
            .field("connection_name", &self.connection_name())
            .finish()
    }
}

type SnifferFactory = fn(Connection) -> Result<Box<dyn TableSniffer>>;

/// Closed dispatch table: driver kind -> sniffer identifier -> factory.
#[derive(Debug)]
pub struct SnifferRegistry {
    factories: HashMap<&'static str, SnifferFactory>,
    by_driver: HashMap<DriverKind, String>,
}

impl SnifferRegistry {
    /// The built-in mapping: each supported driver to its own sniffer.
    pub fn with_defaults() -> Self {
        let mut factories: HashMap<&'static str, SnifferFactory> = HashMap::new();
        factories.insert("mysql", mysql::make_sniffer);
        factories.insert("postgres", postgres::make_sniffer);
        factories.insert("sqlite", sqlite::make_sniffer);

        let by_driver = HashMap::from([
            (DriverKind::MySql, "mysql".to_string()),
            (DriverKind::Postgres, "postgres".to_string()),
            (DriverKind::Sqlite, "sqlite".to_string()),
        ]);

        Self {
            factories,
            by_driver,
        }
    }

    /// Defaults plus the driver->sniffer overrides from configuration.
    ///
    /// An override naming an unknown sniffer identifier is rejected here,
    /// at load time, rather than surfacing later mid-reset.
    pub fn from_config(config: &FixtureConfig) -> Result<Self> {
        let mut registry = Self::with_defaults();
        for (driver, sniffer_id) in &config.sniffers {
            if !registry.factories.contains_key(sniffer_id.as_str()) {
                return Err(FixtureError::Configuration(format!(
                    "sniffer `{sniffer_id}` configured for driver `{driver}` does not exist"
                )));
            }
            let kind = match driver.as_str() {
                "mysql" => DriverKind::MySql,
                "postgres" => DriverKind::Postgres,
                "sqlite" => DriverKind::Sqlite,
                other => DriverKind::Other(other.to_string()),
            };
            registry.by_driver.insert(kind, sniffer_id.clone());
        }
        Ok(registry)
    }

    /// Instantiate the sniffer registered for the connection's driver.
    pub fn sniffer_for(&self, connection: Connection) -> Result<Box<dyn TableSniffer>> {
        let unsupported = || FixtureError::UnsupportedDriver {
            connection: connection.name().to_string(),
            driver: connection.driver().to_string(),
        };
        let sniffer_id = self.by_driver.get(connection.driver()).ok_or_else(unsupported)?;
        let factory = self.factories.get(sniffer_id.as_str()).ok_or_else(unsupported)?;
        factory(connection)
    }
}

/// Quote an identifier with ANSI double quotes (PostgreSQL, SQLite).
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an identifier with MySQL backticks.
pub(crate) fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
