//! # Fixture Manager
//!
//! The orchestrator the test runner talks to: installs connection
//! aliases once per process, then truncates dirty tables on every test
//! connection at each test boundary.
//!
//! ## Scoping rule
//!
//! Only connections named exactly `test` or prefixed `test_` are ever
//! truncated, and the configured ignored set is skipped even then. A
//! production-aliased connection shares the same driver machinery but is
//! never touched. A name like `testing_foo` has no underscore after
//! `test` and is NOT a test connection.
//!
//! ## Failure semantics
//!
//! The first sniffer failure aborts the remaining loop. A partially
//! truncated suite cannot be trusted to represent clean state, so the
//! caller is expected to treat the error as fatal for the affected run.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::aliaser::{compute_aliases, install_aliases};
use crate::config::FixtureConfig;
use crate::connection::ConnectionRegistry;
use crate::error::Result;
use crate::sniffer::{SnifferRegistry, TableSniffer};

/// Whether a connection name falls under the test naming convention.
pub fn is_test_connection(name: &str) -> bool {
    name == "test" || name.starts_with("test_")
}

/// Per-process orchestrator over one connection registry.
pub struct FixtureManager {
    registry: Arc<ConnectionRegistry>,
    sniffers: SnifferRegistry,
    ignored: BTreeSet<String>,
}

impl FixtureManager {
    /// Build the manager from an explicit configuration and install
    /// aliases. Construction is the only place aliasing happens, so a
    /// manager in hand always means the registry is ready.
    pub fn new(registry: Arc<ConnectionRegistry>, config: FixtureConfig) -> Result<Self> {
        let manager = Self {
            sniffers: SnifferRegistry::from_config(&config)?,
            ignored: config.ignored_connections,
            registry,
        };
        manager.alias_connections()?;
        Ok(manager)
    }

    /// Build the manager with configuration loaded from file/environment.
    pub fn load(registry: Arc<ConnectionRegistry>) -> Result<Self> {
        let config = FixtureConfig::load()?;
        Self::new(registry, config)
    }

    /// Install the alias map for all currently configured connections.
    ///
    /// Guarded per registry: the first caller does the work, later calls
    /// (or later manager instances over the same registry) are no-ops.
    /// Installation itself is also idempotent, so the guard is about
    /// avoiding redundant registry mutation, not correctness.
    pub fn alias_connections(&self) -> Result<()> {
        if !self.registry.claim_alias_installation() {
            return Ok(());
        }
        let configured = self.registry.configured();
        let map = compute_aliases(configured.iter().map(String::as_str));
        info!(connections = configured.len(), aliases = map.len(), "aliasing connections");
        install_aliases(&self.registry, &map)
    }

    /// Resolve the named connection to its dialect sniffer.
    pub fn resolve_sniffer(&self, connection_name: &str) -> Result<Box<dyn TableSniffer>> {
        let connection = self.registry.get(connection_name)?;
        self.sniffers.sniffer_for(connection)
    }

    /// Truncate the dirty tables of every test connection.
    ///
    /// Call once per test boundary. Skips ignored connections and every
    /// connection outside the test naming convention; fails fast on the
    /// first sniffer error.
    pub async fn reset_dirty_state(&self) -> Result<()> {
        for name in self.registry.configured() {
            if self.ignored.contains(&name) {
                debug!(connection = %name, "skipping ignored connection");
                continue;
            }
            if !is_test_connection(&name) {
                debug!(connection = %name, "skipping non-test connection");
                continue;
            }
            let sniffer = self.resolve_sniffer(&name)?;
            let dirty = sniffer.dirty_tables().await?;
            if dirty.is_empty() {
                continue;
            }
            debug!(connection = %name, tables = dirty.len(), "truncating dirty tables");
            sniffer.truncate_tables(&dirty).await?;
        }
        Ok(())
    }

    /// Drop every table of the named connection. Full schema teardown,
    /// not a per-test reset; the test naming scope does not apply here
    /// because the caller names the connection explicitly.
    pub async fn drop_schema(&self, connection_name: &str) -> Result<()> {
        self.resolve_sniffer(connection_name)?
            .drop_all_tables()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_convention_boundaries() {
        assert!(is_test_connection("test"));
        assert!(is_test_connection("test_logs"));
        assert!(is_test_connection("test_debug_kit"));

        assert!(!is_test_connection("default"));
        assert!(!is_test_connection("tester"));
        // "testing_foo" has no underscore right after "test".
        assert!(!is_test_connection("testing_foo"));
        assert!(!is_test_connection("my_test_connection"));
    }
}
