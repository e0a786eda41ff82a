use serde_json::{Map, Value};
use sqlx::{Pool, Sqlite};
use tracing::debug;

use super::error::StoreError;
use super::identifier::SqlIdent;
use super::models::{Fields, ResultRow};
use super::table::Table;

/// Placeholder for descriptive fields the processor did not report
const MISSING: &str = "?";

/// Append-only log of completed jobs
#[derive(Clone, Debug)]
pub struct ResultRepository {
    table: Table,
}

impl ResultRepository {
    pub fn new(pool: Pool<Sqlite>, table: SqlIdent) -> Self {
        Self {
            table: Table::new(pool, table),
        }
    }

    /// Record a completed job from the processor payload
    ///
    /// `name`, `date` and `product` are copied from the payload; strings are
    /// taken verbatim, other JSON values in their serialized form.
    pub async fn append(
        &self,
        payload: &Map<String, Value>,
        output_folder: &str,
    ) -> Result<i64, StoreError> {
        let fields = Fields::new()
            .with("name", payload_text(payload, "name"))
            .with("date", payload_text(payload, "date"))
            .with("product", payload_text(payload, "product"))
            .with("output_folder", output_folder);

        let id = self.table.insert(&fields).await?;
        debug!("Result row {} appended for {}", id, output_folder);
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<ResultRow>, StoreError> {
        self.table.find(&Fields::new()).await
    }
}

fn payload_text(payload: &Map<String, Value>, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => MISSING.to_string(),
        Some(other) => other.to_string(),
    }
}
