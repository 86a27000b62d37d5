//! SQLite table sniffer.
//!
//! SQLite has no `TRUNCATE`: emptying a table is a `DELETE` plus clearing
//! the table's `sqlite_sequence` row so `AUTOINCREMENT` restarts at its
//! initial value. Foreign-key enforcement is the per-connection
//! `foreign_keys` pragma, so the batch runs on one acquired pool
//! connection with the pragma turned off and its prior value restored
//! afterwards.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::connection::{Connection, DbPool};
use crate::error::{FixtureError, Result};

use super::{quote_ident, TableSniffer};

pub struct SqliteTableSniffer {
    connection: String,
    pool: SqlitePool,
}

impl SqliteTableSniffer {
    pub fn new(connection: impl Into<String>, pool: SqlitePool) -> Self {
        Self {
            connection: connection.into(),
            pool,
        }
    }

    fn fail(&self, table: Option<&str>, source: sqlx::Error) -> FixtureError {
        FixtureError::sniffer(&self.connection, table, source)
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(|e| self.fail(None, e))
    }

    /// Whether this database has ever used AUTOINCREMENT; the
    /// `sqlite_sequence` catalog only exists after the first such table.
    async fn has_sequence_table(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| self.fail(None, e))?;
        Ok(count > 0)
    }

    /// Run `statements` with the foreign_keys pragma off, restoring its
    /// prior value even when a statement fails.
    async fn run_without_fk_pragma(&self, statements: &[(String, String)]) -> Result<()> {
        let mut conn = self.acquire().await?;

        let fk_was_on: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| self.fail(None, e))?;
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await
            .map_err(|e| self.fail(None, e))?;

        let mut outcome = Ok(());
        for (table, sql) in statements {
            if let Err(e) = sqlx::query(sql).execute(&mut *conn).await {
                outcome = Err(self.fail(Some(table), e));
                break;
            }
        }

        if fk_was_on != 0 {
            let restore = sqlx::query("PRAGMA foreign_keys = ON")
                .execute(&mut *conn)
                .await
                .map_err(|e| self.fail(None, e));
            return outcome.and(restore.map(|_| ()));
        }
        outcome
    }
}

#[async_trait]
impl TableSniffer for SqliteTableSniffer {
    fn connection_name(&self) -> &str {
        &self.connection
    }

    async fn all_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.fail(None, e))
    }

    async fn dirty_tables(&self) -> Result<BTreeSet<String>> {
        let all: Vec<String> = self.all_tables().await?;

        // sqlite_sequence lists every table whose AUTOINCREMENT counter
        // advanced, including ones whose rows were deleted again.
        let mut dirty = BTreeSet::new();
        if self.has_sequence_table().await? {
            let sequenced: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_sequence")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| self.fail(None, e))?;
            // Stale entries for since-dropped tables would make truncation
            // target tables that no longer exist.
            dirty.extend(sequenced.into_iter().filter(|t| all.contains(t)));
        }

        for table in all {
            if dirty.contains(&table) {
                continue;
            }
            let sql = format!("SELECT EXISTS (SELECT 1 FROM {} LIMIT 1)", quote_ident(&table));
            let has_rows: i64 = sqlx::query_scalar(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| self.fail(Some(&table), e))?;
            if has_rows != 0 {
                dirty.insert(table);
            }
        }

        Ok(dirty)
    }

    async fn truncate_tables(&self, tables: &BTreeSet<String>) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        debug!(connection = %self.connection, count = tables.len(), "truncating sqlite tables");

        let clear_sequences = self.has_sequence_table().await?;
        let mut statements = Vec::with_capacity(tables.len() * 2);
        for table in tables {
            statements.push((table.clone(), format!("DELETE FROM {}", quote_ident(table))));
            if clear_sequences {
                statements.push((
                    table.clone(),
                    format!(
                        "DELETE FROM sqlite_sequence WHERE name = '{}'",
                        table.replace('\'', "''")
                    ),
                ));
            }
        }
        self.run_without_fk_pragma(&statements).await
    }

    async fn drop_all_tables(&self) -> Result<()> {
        let tables = self.all_tables().await?;
        if tables.is_empty() {
            return Ok(());
        }
        debug!(connection = %self.connection, count = tables.len(), "dropping all sqlite tables");

        let statements: Vec<(String, String)> = tables
            .iter()
            .map(|t| (t.clone(), format!("DROP TABLE {}", quote_ident(t))))
            .collect();
        self.run_without_fk_pragma(&statements).await
    }
}

/// Factory entry for the sniffer registry.
pub(super) fn make_sniffer(connection: Connection) -> Result<Box<dyn TableSniffer>> {
    match connection.pool() {
        DbPool::Sqlite(pool) => Ok(Box::new(SqliteTableSniffer::new(
            connection.name(),
            pool.clone(),
        ))),
        _ => Err(FixtureError::Configuration(format!(
            "connection `{}` does not hold a SQLite pool",
            connection.name()
        ))),
    }
}
