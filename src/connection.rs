//! # Connection Registry
//!
//! Holds the configured database connections and the alias table that
//! redirects lookups onto them.
//!
//! ## Overview
//!
//! The registry owns no database state of its own: connections are live
//! sqlx pools registered by the host test harness, and the registry only
//! looks them up by logical name. Aliases are name-level redirects; asking
//! for an aliased name returns the connection the alias points at. This is
//! what lets application code written against `default` or `logs`
//! transparently hit `test` and `test_logs` once aliases are installed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use sqlx::{MySqlPool, PgPool, SqlitePool};

use crate::error::{FixtureError, Result};

/// The database driver behind a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DriverKind {
    MySql,
    Postgres,
    Sqlite,
    /// A driver this crate ships no sniffer for. Carries the driver name
    /// reported by the host so errors can point at it.
    Other(String),
}

impl DriverKind {
    pub fn as_str(&self) -> &str {
        match self {
            DriverKind::MySql => "mysql",
            DriverKind::Postgres => "postgres",
            DriverKind::Sqlite => "sqlite",
            DriverKind::Other(name) => name,
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live pool handle, one variant per supported driver.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// One configured database endpoint: logical name, driver kind, live pool.
#[derive(Debug, Clone)]
pub struct Connection {
    name: String,
    driver: DriverKind,
    pool: DbPool,
}

impl Connection {
    pub fn new(name: impl Into<String>, driver: DriverKind, pool: DbPool) -> Self {
        Self {
            name: name.into(),
            driver,
            pool,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &DriverKind {
        &self.driver
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Registry of configured connections plus the alias table.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Connection>>,
    aliases: RwLock<HashMap<String, String>>,
    aliases_installed: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configured connection under its logical name.
    /// Re-registering a name replaces the previous pool handle.
    pub fn register(&self, connection: Connection) {
        self.connections
            .write()
            .insert(connection.name().to_string(), connection);
    }

    /// Names of all configured connections, sorted. Aliases are not
    /// connections and do not appear here.
    pub fn configured(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Install an alias so lookups of `alias` resolve to `target`.
    ///
    /// Re-installing the same pair is fine (idempotence); pointing an
    /// existing alias somewhere else, or at itself, is a conflict.
    pub fn register_alias(&self, alias: &str, target: &str) -> Result<()> {
        if alias == target {
            return Err(FixtureError::AliasConflict {
                alias: alias.to_string(),
                target: target.to_string(),
                existing: target.to_string(),
            });
        }
        let mut aliases = self.aliases.write();
        match aliases.get(alias) {
            Some(existing) if existing != target => Err(FixtureError::AliasConflict {
                alias: alias.to_string(),
                target: target.to_string(),
                existing: existing.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                aliases.insert(alias.to_string(), target.to_string());
                Ok(())
            }
        }
    }

    /// Resolve a name through the alias table to a live connection.
    pub fn get(&self, name: &str) -> Result<Connection> {
        let aliases = self.aliases.read();
        let mut current = name;
        // Alias chains are short (normal -> test counterpart); the hop
        // bound only guards against a miswired cycle.
        for _ in 0..=aliases.len() {
            match aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        self.connections
            .read()
            .get(current)
            .cloned()
            .ok_or_else(|| FixtureError::UnknownConnection(name.to_string()))
    }

    /// Where `name` redirects to, if it is aliased.
    pub fn alias_target(&self, name: &str) -> Option<String> {
        self.aliases.read().get(name).cloned()
    }

    /// One-shot guard for alias installation. Returns true exactly once
    /// per registry, so multiple orchestrator instances in one process do
    /// not redo the registry mutation.
    pub(crate) fn claim_alias_installation(&self) -> bool {
        !self.aliases_installed.swap(true, Ordering::SeqCst)
    }
}
