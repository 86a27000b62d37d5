//! PostgreSQL table sniffer.
//!
//! `TRUNCATE` is transactional here and takes the whole batch in one
//! statement: `RESTART IDENTITY` resets owned sequences and `CASCADE`
//! clears referencing tables instead of tripping over foreign keys. A
//! cascaded table outside the requested set is either already in the
//! dirty set (soundness) or empty, so the cascade cannot lose state.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::connection::{Connection, DbPool};
use crate::error::{FixtureError, Result};

use super::{quote_ident, TableSniffer};

/// Tables whose owned sequence has produced at least one value. Joins the
/// `pg_sequences` view (which exposes `last_value`, NULL until the first
/// `nextval`) back to the owning table through `pg_depend`. SERIAL columns
/// register their sequence as an auto dependency (`'a'`), identity columns
/// as an internal one (`'i'`); both must count, or an insert-then-delete
/// on an identity-keyed table goes undetected.
const CONSUMED_SEQUENCE_TABLES: &str = "\
    SELECT tab.relname \
    FROM pg_sequences s \
    JOIN pg_namespace ns ON ns.nspname = s.schemaname \
    JOIN pg_class seq ON seq.relname = s.sequencename AND seq.relnamespace = ns.oid \
    JOIN pg_depend dep ON dep.objid = seq.oid AND dep.deptype IN ('a', 'i') \
    JOIN pg_class tab ON tab.oid = dep.refobjid \
    WHERE s.schemaname = current_schema() AND s.last_value IS NOT NULL";

pub struct PostgresTableSniffer {
    connection: String,
    pool: PgPool,
}

impl PostgresTableSniffer {
    pub fn new(connection: impl Into<String>, pool: PgPool) -> Self {
        Self {
            connection: connection.into(),
            pool,
        }
    }

    fn fail(&self, table: Option<&str>, source: sqlx::Error) -> FixtureError {
        FixtureError::sniffer(&self.connection, table, source)
    }
}

#[async_trait]
impl TableSniffer for PostgresTableSniffer {
    fn connection_name(&self) -> &str {
        &self.connection
    }

    async fn all_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT tablename FROM pg_catalog.pg_tables \
             WHERE schemaname = current_schema() \
             ORDER BY tablename",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.fail(None, e))
    }

    async fn dirty_tables(&self) -> Result<BTreeSet<String>> {
        let consumed: Vec<String> = sqlx::query_scalar(CONSUMED_SEQUENCE_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.fail(None, e))?;

        let mut dirty: BTreeSet<String> = consumed.into_iter().collect();

        for table in self.all_tables().await? {
            if dirty.contains(&table) {
                continue;
            }
            let sql = format!("SELECT EXISTS (SELECT 1 FROM {} LIMIT 1)", quote_ident(&table));
            let has_rows: bool = sqlx::query_scalar(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| self.fail(Some(&table), e))?;
            if has_rows {
                dirty.insert(table);
            }
        }

        Ok(dirty)
    }

    async fn truncate_tables(&self, tables: &BTreeSet<String>) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        debug!(connection = %self.connection, count = tables.len(), "truncating postgres tables");

        let list = tables
            .iter()
            .map(|t| quote_ident(t))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("TRUNCATE TABLE {list} RESTART IDENTITY CASCADE");
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| self.fail(None, e))
    }

    async fn drop_all_tables(&self) -> Result<()> {
        let tables = self.all_tables().await?;
        if tables.is_empty() {
            return Ok(());
        }
        debug!(connection = %self.connection, count = tables.len(), "dropping all postgres tables");

        let list = tables
            .iter()
            .map(|t| quote_ident(t))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("DROP TABLE IF EXISTS {list} CASCADE");
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| self.fail(None, e))
    }
}

/// Factory entry for the sniffer registry.
pub(super) fn make_sniffer(connection: Connection) -> Result<Box<dyn TableSniffer>> {
    match connection.pool() {
        DbPool::Postgres(pool) => Ok(Box::new(PostgresTableSniffer::new(
            connection.name(),
            pool.clone(),
        ))),
        _ => Err(FixtureError::Configuration(format!(
            "connection `{}` does not hold a PostgreSQL pool",
            connection.name()
        ))),
    }
}
