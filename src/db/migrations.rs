use sqlx::{Pool, Sqlite};
use tracing::info;

use super::error::StoreError;
use super::identifier::SqlIdent;

/// Create the queue and result tables if they are missing
///
/// Table names come from configuration, so the statements are assembled from
/// validated, quoted identifiers instead of embedded migration files. Safe to run on
/// every startup, from the API and the worker alike.
pub async fn ensure_schema(
    pool: &Pool<Sqlite>,
    queue_table: &SqlIdent,
    result_table: &SqlIdent,
) -> Result<(), StoreError> {
    info!("Ensuring schema for tables {} and {}", queue_table, result_table);

    let index = SqlIdent::parse(&format!("idx_{}_status_created", queue_table))?;
    let queue = queue_table.quoted();
    let results = result_table.quoted();
    let index = index.quoted();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {queue} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_data_folder TEXT NOT NULL,
            output_folder TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'QUEUED',
            retry_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            success INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {index} ON {queue} (status, created_at, id)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {results} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            product TEXT NOT NULL,
            output_folder TEXT NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
