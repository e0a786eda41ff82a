use thiserror::Error;

/// Errors from the job and result stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Identifier rejected before any SQL was built
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Row {id} not found in {table}")]
    NotFound { table: String, id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
