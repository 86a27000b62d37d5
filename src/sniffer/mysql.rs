//! MySQL table sniffer.
//!
//! `TRUNCATE` auto-commits and resets `AUTO_INCREMENT` on its own, but
//! refuses to run against tables referenced by foreign keys. The session
//! therefore disables `FOREIGN_KEY_CHECKS` around the batch; since that
//! flag is session-scoped, every statement of the batch runs on one
//! acquired pool connection.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool};
use tracing::debug;

use crate::connection::{Connection, DbPool};
use crate::error::{FixtureError, Result};

use super::{quote_ident_mysql, TableSniffer};

pub struct MysqlTableSniffer {
    connection: String,
    pool: MySqlPool,
}

impl MysqlTableSniffer {
    pub fn new(connection: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            connection: connection.into(),
            pool,
        }
    }

    fn fail(&self, table: Option<&str>, source: sqlx::Error) -> FixtureError {
        FixtureError::sniffer(&self.connection, table, source)
    }

    async fn acquire(&self) -> Result<PoolConnection<MySql>> {
        self.pool.acquire().await.map_err(|e| self.fail(None, e))
    }

    /// Run `statements` with FOREIGN_KEY_CHECKS off, re-enabling the flag
    /// on the session even when a statement fails.
    async fn run_without_fk_checks(&self, statements: &[(String, String)]) -> Result<()> {
        let mut conn = self.acquire().await?;

        sqlx::query("SET FOREIGN_KEY_CHECKS = 0")
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

        let reenable = sqlx::query("SET FOREIGN_KEY_CHECKS = 1")
            .execute(&mut *conn)
            .await
            .map_err(|e| self.fail(None, e));

        outcome.and(reenable.map(|_| ()))
    }
}

#[async_trait]
impl TableSniffer for MysqlTableSniffer {
    fn connection_name(&self) -> &str {
        &self.connection
    }

    async fn all_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.fail(None, e))
    }

    async fn dirty_tables(&self) -> Result<BTreeSet<String>> {
        // Advanced AUTO_INCREMENT counters catch tables whose rows were
        // inserted and already deleted again. MySQL 8 serves these columns
        // from cached statistics (information_schema_stats_expiry, default
        // one day), so the cache must be bypassed on the session running
        // the scan or the counter read goes stale. The variable does not
        // exist before 8.0, where the statistics are always live, hence
        // the ignored result.
        let mut conn = self.acquire().await?;
        let _ = sqlx::query("SET SESSION information_schema_stats_expiry = 0")
            .execute(&mut *conn)
            .await;
        let advanced: Vec<String> = sqlx::query_scalar(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             AND auto_increment IS NOT NULL AND auto_increment > 1",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| self.fail(None, e))?;
        drop(conn);

        let mut dirty: BTreeSet<String> = advanced.into_iter().collect();

        for table in self.all_tables().await? {
            if dirty.contains(&table) {
                continue;
            }
            let sql = format!(
                "SELECT EXISTS (SELECT 1 FROM {} LIMIT 1)",
                quote_ident_mysql(&table)
            );
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
        debug!(connection = %self.connection, count = tables.len(), "truncating mysql tables");

        let statements: Vec<(String, String)> = tables
            .iter()
            .map(|t| {
                (
                    t.clone(),
                    format!("TRUNCATE TABLE {}", quote_ident_mysql(t)),
                )
            })
            .collect();
        self.run_without_fk_checks(&statements).await
    }

    async fn drop_all_tables(&self) -> Result<()> {
        let tables = self.all_tables().await?;
        if tables.is_empty() {
            return Ok(());
        }
        debug!(connection = %self.connection, count = tables.len(), "dropping all mysql tables");

        let statements: Vec<(String, String)> = tables
            .iter()
            .map(|t| (t.clone(), format!("DROP TABLE {}", quote_ident_mysql(t))))
            .collect();
        self.run_without_fk_checks(&statements).await
    }
}

/// Factory entry for the sniffer registry.
pub(super) fn make_sniffer(connection: Connection) -> Result<Box<dyn TableSniffer>> {
    match connection.pool() {
        DbPool::MySql(pool) => Ok(Box::new(MysqlTableSniffer::new(
            connection.name(),
            pool.clone(),
        ))),
        _ => Err(FixtureError::Configuration(format!(
            "connection `{}` does not hold a MySQL pool",
            connection.name()
        ))),
    }
}
