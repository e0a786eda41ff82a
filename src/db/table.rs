use sqlx::query::{Query, QueryAs};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Pool, Sqlite};
use tracing::debug;

use super::error::StoreError;
use super::identifier::SqlIdent;
use super::models::{FieldValue, Fields};

/// Row access to one table
///
/// Table and column names are validated identifiers, always emitted quoted;
/// every value is a bound parameter.
#[derive(Clone, Debug)]
pub struct Table {
    pool: Pool<Sqlite>,
    name: SqlIdent,
}

impl Table {
    pub fn new(pool: Pool<Sqlite>, name: SqlIdent) -> Self {
        Self { pool, name }
    }

    pub fn name(&self) -> &SqlIdent {
        &self.name
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Insert a row and return the id assigned by the database
    pub async fn insert(&self, fields: &Fields) -> Result<i64, StoreError> {
        let (columns, values) = split(fields)?;
        if columns.is_empty() {
            return Err(StoreError::Validation(
                "insert requires at least one column".to_string(),
            ));
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name.quoted(),
            quoted_list(&columns),
            placeholders
        );

        let result = bind_all(sqlx::query(&sql), values)
            .execute(&self.pool)
            .await?;
        let id = result.last_insert_rowid();
        debug!(table = %self.name, id, "Row inserted");
        Ok(id)
    }

    pub async fn get_by_id<T>(&self, id: i64) -> Result<T, StoreError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let sql = format!("SELECT * FROM {} WHERE id = ?", self.name.quoted());
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// Rows matching every `column = value` pair in `filter`, in id order
    ///
    /// An empty filter matches every row; no match yields an empty vector.
    pub async fn find<T>(&self, filter: &Fields) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.select(filter, &[SqlIdent::from_static("id")], None)
            .await
    }

    /// First row matching `filter` under the given ordering
    pub async fn find_first<T>(
        &self,
        filter: &Fields,
        order_by: &[SqlIdent],
    ) -> Result<Option<T>, StoreError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(self.select(filter, order_by, Some(1)).await?.into_iter().next())
    }

    /// Overwrite exactly the named columns of one row
    pub async fn update(&self, id: i64, fields: &Fields) -> Result<(), StoreError> {
        let (columns, values) = split(fields)?;
        if columns.is_empty() {
            return Err(StoreError::Validation(
                "update requires at least one column".to_string(),
            ));
        }

        let assignments = columns
            .iter()
            .map(|c| format!("{} = ?", c.quoted()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.name.quoted(),
            assignments
        );

        let result = bind_all(sqlx::query(&sql), values)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(id));
        }
        debug!(table = %self.name, id, columns = ?columns, "Row updated");
        Ok(())
    }

    async fn select<T>(
        &self,
        filter: &Fields,
        order_by: &[SqlIdent],
        limit: Option<i64>,
    ) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let (columns, values) = split(filter)?;

        let mut sql = format!("SELECT * FROM {}", self.name.quoted());
        if !columns.is_empty() {
            let conditions = columns
                .iter()
                .map(|c| format!("{} = ?", c.quoted()))
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&quoted_list(order_by));
        }
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = bind_all_as(sqlx::query_as::<_, T>(&sql), values);
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    fn not_found(&self, id: i64) -> StoreError {
        StoreError::NotFound {
            table: self.name.to_string(),
            id,
        }
    }
}

/// Validate every column name before any SQL is built
fn split(fields: &Fields) -> Result<(Vec<SqlIdent>, Vec<FieldValue>), StoreError> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (column, value) in fields.iter() {
        columns.push(SqlIdent::parse(column)?);
        values.push(value.clone());
    }
    Ok((columns, values))
}

fn quoted_list(idents: &[SqlIdent]) -> String {
    idents
        .iter()
        .map(SqlIdent::quoted)
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<FieldValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            FieldValue::Text(s) => query.bind(s),
            FieldValue::Integer(i) => query.bind(i),
            FieldValue::Null => query.bind(None::<String>),
        };
    }
    query
}

fn bind_all_as<'q, T>(
    mut query: QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    values: Vec<FieldValue>,
) -> QueryAs<'q, Sqlite, T, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            FieldValue::Text(s) => query.bind(s),
            FieldValue::Integer(i) => query.bind(i),
            FieldValue::Null => query.bind(None::<String>),
        };
    }
    query
}
