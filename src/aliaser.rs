//! # Connection Aliasing
//!
//! Computes and installs the name-level redirects that send application
//! database access to the test databases.
//!
//! ## Overview
//!
//! The convention is naming-based: `test` is the counterpart of `default`,
//! and every other connection `c` pairs with `test_c` (or, when `c` itself
//! carries the `test_` prefix, with the prefix stripped). Installing the
//! map means application code asking for `default` or `logs` transparently
//! receives the `test` / `test_logs` connection, with zero per-model
//! configuration.
//!
//! The prefix must be exactly `test_`: a connection named `testing_foo`
//! has no underscore after `test` and is treated as a normal connection.

use std::collections::BTreeMap;

use tracing::debug;

use crate::connection::ConnectionRegistry;
use crate::error::Result;

/// Redirect pairs: requested name -> connection actually served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    pairs: BTreeMap<String, String>,
}

impl AliasMap {
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }

    pub fn target_of(&self, requested: &str) -> Option<&str> {
        self.pairs.get(requested).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Compute the alias map for a set of configured connection names.
///
/// `test` and `default` are reserved and always produce the canonical
/// `default -> test` redirect. First mapping wins, so feeding the same
/// names twice (or names whose counterparts are also configured) never
/// produces duplicate or conflicting entries.
pub fn compute_aliases<'a, I>(names: I) -> AliasMap
where
    I: IntoIterator<Item = &'a str>,
{
    let mut pairs = BTreeMap::new();
    pairs.insert("default".to_string(), "test".to_string());

    for name in names {
        if name == "test" || name == "default" {
            continue;
        }
        let (requested, served) = match name.strip_prefix("test_") {
            Some(base) => (base.to_string(), name.to_string()),
            None => (name.to_string(), format!("test_{name}")),
        };
        pairs.entry(requested).or_insert(served);
    }

    AliasMap { pairs }
}

/// Install every pair of `map` into the registry's alias table.
///
/// Re-installation of an existing pair is a no-op; a genuine conflict
/// (the registry already redirects that name elsewhere) propagates and is
/// fatal for the run.
pub fn install_aliases(registry: &ConnectionRegistry, map: &AliasMap) -> Result<()> {
    for (alias, target) in map.pairs() {
        registry.register_alias(alias, target)?;
        debug!(alias, target, "installed connection alias");
    }
    Ok(())
}
