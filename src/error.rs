//! Crate-wide error type.
//!
//! Every failure propagates to the test-runner boundary; nothing is
//! logged-and-swallowed, because a masked truncation failure leaks dirty
//! rows into the next test.

/// Errors surfaced by aliasing, sniffer resolution and truncation.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// A connection's driver has no registered sniffer. This is a
    /// configuration problem, not something to skip silently.
    #[error("the DB driver `{driver}` of connection `{connection}` is not supported by any registered sniffer")]
    UnsupportedDriver { connection: String, driver: String },

    /// Installing an alias would conflict with an existing mapping.
    #[error("alias `{alias}` -> `{target}` conflicts with existing mapping `{alias}` -> `{existing}`")]
    AliasConflict {
        alias: String,
        target: String,
        existing: String,
    },

    /// A name resolved through the alias table matched no configured connection.
    #[error("unknown connection `{0}`")]
    UnknownConnection(String),

    /// A metadata query or DDL statement failed on a connection.
    #[error("sniffer failure on connection `{connection}`{}: {source}", table_suffix(.table.as_deref()))]
    Sniffer {
        connection: String,
        table: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FixtureError {
    /// Tie a database error to the connection (and optionally table) it hit.
    pub fn sniffer(connection: &str, table: Option<&str>, source: sqlx::Error) -> Self {
        Self::Sniffer {
            connection: connection.to_string(),
            table: table.map(str::to_string),
            source,
        }
    }
}

fn table_suffix(table: Option<&str>) -> String {
    match table {
        Some(t) => format!(", table `{t}`"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, FixtureError>;
