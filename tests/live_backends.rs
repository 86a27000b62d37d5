//! Sniffer behavior against live MySQL and PostgreSQL servers.
//!
//! These need running databases, so they are ignored by default:
//!
//! ```text
//! MYSQL_TEST_URL=mysql://root@localhost/tsl_test cargo test -- --ignored
//! POSTGRES_TEST_URL=postgres://postgres@localhost/tsl_test cargo test -- --ignored
//! ```

use std::collections::BTreeSet;

use sqlx::{MySqlPool, PgPool};
use test_suite_light::{MysqlTableSniffer, PostgresTableSniffer, TableSniffer};

#[tokio::test]
#[ignore = "requires a running MySQL server (MYSQL_TEST_URL)"]
async fn mysql_truncation_resets_auto_increment_across_foreign_keys() {
    let url = std::env::var("MYSQL_TEST_URL").expect("MYSQL_TEST_URL");
    let pool = MySqlPool::connect(&url).await.expect("mysql pool");

    sqlx::query("DROP TABLE IF EXISTS posts, authors, drafts")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE authors (id INT AUTO_INCREMENT PRIMARY KEY, name TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE drafts (id INT AUTO_INCREMENT PRIMARY KEY, note TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE posts (id INT AUTO_INCREMENT PRIMARY KEY, \
         author_id INT NOT NULL, FOREIGN KEY (author_id) REFERENCES authors (id))",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO authors (name) VALUES ('a'), ('b')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO posts (author_id) VALUES (1)")
        .execute(&pool)
        .await
        .unwrap();

    // Rows already deleted again: the AUTO_INCREMENT scan must read the
    // live counter, not the cached statistics, to see this table.
    sqlx::query("INSERT INTO drafts (note) VALUES ('transient')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM drafts").execute(&pool).await.unwrap();

    let sniffer = MysqlTableSniffer::new("test", pool.clone());
    let dirty = sniffer.dirty_tables().await.unwrap();
    assert!(dirty.contains("authors") && dirty.contains("posts"));
    assert!(
        dirty.contains("drafts"),
        "advanced counter must mark the emptied table dirty"
    );

    sniffer.truncate_tables(&dirty).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
    sqlx::query("INSERT INTO authors (name) VALUES ('fresh')")
        .execute(&pool)
        .await
        .unwrap();
    let id: i64 = sqlx::query_scalar("SELECT id FROM authors")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(id, 1);

    sniffer.drop_all_tables().await.unwrap();
    assert!(sniffer.all_tables().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server (POSTGRES_TEST_URL)"]
async fn postgres_truncation_restarts_identity_and_cascades() {
    let url = std::env::var("POSTGRES_TEST_URL").expect("POSTGRES_TEST_URL");
    let pool = PgPool::connect(&url).await.expect("postgres pool");

    sqlx::query("DROP TABLE IF EXISTS posts, authors, drafts CASCADE")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE authors (id BIGSERIAL PRIMARY KEY, name TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE posts (id BIGSERIAL PRIMARY KEY, \
         author_id BIGINT NOT NULL REFERENCES authors (id))",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE drafts (id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY, note TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO authors (name) VALUES ('a'), ('b')")
        .execute(&pool)
        .await
        .unwrap();

    // Identity column, rows already gone again: only the consumed
    // sequence gives this table away.
    sqlx::query("INSERT INTO drafts (note) VALUES ('transient')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM drafts").execute(&pool).await.unwrap();

    let sniffer = PostgresTableSniffer::new("test", pool.clone());
    let dirty = sniffer.dirty_tables().await.unwrap();
    assert!(dirty.contains("authors"));
    assert!(
        dirty.contains("drafts"),
        "identity-owned sequence advance must mark the table dirty"
    );

    sniffer
        .truncate_tables(&BTreeSet::from(["drafts".to_string()]))
        .await
        .unwrap();
    let id: i64 = sqlx::query_scalar("INSERT INTO drafts (note) VALUES ('fresh') RETURNING id")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(id, 1);

    // Only authors is named; CASCADE covers the referencing posts table.
    sniffer
        .truncate_tables(&BTreeSet::from(["authors".to_string()]))
        .await
        .unwrap();

    let id: i64 = sqlx::query_scalar("INSERT INTO authors (name) VALUES ('fresh') RETURNING id")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(id, 1);

    sniffer.drop_all_tables().await.unwrap();
    assert!(sniffer.all_tables().await.unwrap().is_empty());
}
