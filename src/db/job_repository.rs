use std::time::Duration;

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::debug;

use super::error::StoreError;
use super::identifier::SqlIdent;
use super::models::{format_timestamp, generate_timestamp, Fields, JobRow, JobStatus};
use super::table::Table;

/// Repository for queued job rows
///
/// Each state transition is a single UPDATE that also refreshes `updated_at`.
#[derive(Clone, Debug)]
pub struct JobRepository {
    table: Table,
}

impl JobRepository {
    pub fn new(pool: Pool<Sqlite>, table: SqlIdent) -> Self {
        Self {
            table: Table::new(pool, table),
        }
    }

    /// Insert a QUEUED job and return the full job record
    pub async fn create(
        &self,
        raw_data_folder: &str,
        output_folder: &str,
    ) -> Result<JobRow, StoreError> {
        debug!(
            "Creating job: raw_data_folder={}, output_folder={}",
            raw_data_folder, output_folder
        );

        let now = generate_timestamp();
        let id = self
            .table
            .insert(
                &Fields::new()
                    .with("raw_data_folder", raw_data_folder)
                    .with("output_folder", output_folder)
                    .with("status", JobStatus::Queued)
                    .with("retry_count", 0_i64)
                    .with("created_at", now.clone())
                    .with("updated_at", now),
            )
            .await?;

        debug!("Job created with id={}", id);
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<JobRow, StoreError> {
        self.table.get_by_id(id).await
    }

    /// Exact-match lookup over arbitrary columns
    pub async fn find(&self, filter: &Fields) -> Result<Vec<JobRow>, StoreError> {
        self.table.find(filter).await
    }

    /// All jobs, or only those in `status`, in id order
    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobRow>, StoreError> {
        let filter = match status {
            Some(status) => Fields::new().with("status", status),
            None => Fields::new(),
        };
        self.find(&filter).await
    }

    /// Oldest QUEUED job; ties on `created_at` go to the lower id
    pub async fn next_queued(&self) -> Result<Option<JobRow>, StoreError> {
        self.table
            .find_first(
                &Fields::new().with("status", JobStatus::Queued),
                &[
                    SqlIdent::from_static("created_at"),
                    SqlIdent::from_static("id"),
                ],
            )
            .await
    }

    /// Partial update of the named columns
    pub async fn update(&self, id: i64, fields: &Fields) -> Result<(), StoreError> {
        self.table.update(id, fields).await
    }

    pub async fn mark_processing(&self, id: i64) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Processing, Fields::new())
            .await
    }

    pub async fn mark_completed(&self, id: i64) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Completed, Fields::new().with("success", 1_i64))
            .await
    }

    /// Put a job back in the queue after a reported failure
    pub async fn requeue(&self, id: i64, retry_count: i64) -> Result<(), StoreError> {
        self.transition(
            id,
            JobStatus::Queued,
            Fields::new().with("retry_count", retry_count),
        )
        .await
    }

    pub async fn mark_failed(
        &self,
        id: i64,
        error_message: &str,
        retry_count: i64,
    ) -> Result<(), StoreError> {
        self.transition(
            id,
            JobStatus::Failed,
            Fields::new()
                .with("error_message", error_message)
                .with("retry_count", retry_count)
                .with("success", 0_i64),
        )
        .await
    }

    pub async fn mark_error(&self, id: i64, error_message: &str) -> Result<(), StoreError> {
        self.transition(
            id,
            JobStatus::Error,
            Fields::new()
                .with("error_message", error_message)
                .with("success", 0_i64),
        )
        .await
    }

    /// Requeue PROCESSING rows whose last transition is older than `older_than`
    ///
    /// Such rows were left behind by a worker that died mid-job. `retry_count`
    /// is left alone: the interrupted attempt never reported an outcome.
    /// An age reaching past the representable calendar matches no row.
    pub async fn requeue_stale_processing(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = match chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().naive_utc().checked_sub_signed(age))
        {
            Some(cutoff) => format_timestamp(&cutoff),
            None => {
                debug!(?older_than, "Stale cutoff out of range, nothing to requeue");
                return Ok(0);
            }
        };
        let sql = format!(
            "UPDATE {} SET status = ?, updated_at = ? WHERE status = ? AND updated_at <= ?",
            self.table.name().quoted()
        );

        let result = sqlx::query(&sql)
            .bind(JobStatus::Queued.as_str())
            .bind(generate_timestamp())
            .bind(JobStatus::Processing.as_str())
            .bind(cutoff)
            .execute(self.table.pool())
            .await?;

        Ok(result.rows_affected())
    }

    async fn transition(
        &self,
        id: i64,
        status: JobStatus,
        extra: Fields,
    ) -> Result<(), StoreError> {
        let fields = extra
            .with("status", status)
            .with("updated_at", generate_timestamp());
        self.table.update(id, &fields).await?;
        debug!("Job {} moved to {}", id, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connection, migrations};

    async fn repo() -> JobRepository {
        let pool = connection::connect_in_memory().await.unwrap();
        let queue = SqlIdent::parse("miner_queue").unwrap();
        let results = SqlIdent::parse("speed_data").unwrap();
        migrations::ensure_schema(&pool, &queue, &results)
            .await
            .unwrap();
        JobRepository::new(pool, queue)
    }

    #[tokio::test]
    async fn created_jobs_start_queued_with_no_retries() {
        let repo = repo().await;
        let job = repo.create("/tmp/in", "/tmp/out").await.unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.raw_data_folder, "/tmp/in");
        assert_eq!(job.output_folder, "/tmp/out");
        assert!(job.error_message.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[tokio::test]
    async fn ids_follow_insertion_order() {
        let repo = repo().await;
        let a = repo.create("/a", "/out").await.unwrap();
        let b = repo.create("/b", "/out").await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn get_missing_row_is_not_found() {
        let repo = repo().await;
        match repo.get(42).await {
            Err(StoreError::NotFound { id, .. }) => assert_eq!(id, 42),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let repo = repo().await;
        let result = repo.mark_processing(7).await;
        assert!(matches!(result, Err(StoreError::NotFound { id: 7, .. })));
    }

    #[tokio::test]
    async fn find_without_matches_is_empty() {
        let repo = repo().await;
        repo.create("/a", "/out").await.unwrap();

        let rows = repo
            .find(&Fields::new().with("status", JobStatus::Failed))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn find_is_an_exact_conjunction() {
        let repo = repo().await;
        let a = repo.create("/data/a", "/out").await.unwrap();
        repo.create("/data/a", "/elsewhere").await.unwrap();
        repo.create("/data/ab", "/out").await.unwrap();

        let rows = repo
            .find(
                &Fields::new()
                    .with("raw_data_folder", "/data/a")
                    .with("output_folder", "/out"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, a.id);
    }

    #[tokio::test]
    async fn update_touches_only_named_columns() {
        let repo = repo().await;
        let job = repo.create("/a", "/out").await.unwrap();

        repo.update(job.id, &Fields::new().with("output_folder", "/moved"))
            .await
            .unwrap();

        let after = repo.get(job.id).await.unwrap();
        assert_eq!(after.output_folder, "/moved");
        assert_eq!(after.raw_data_folder, "/a");
        assert_eq!(after.status, JobStatus::Queued);
        assert_eq!(after.updated_at, job.updated_at);
    }

    #[tokio::test]
    async fn invalid_column_names_are_rejected_for_every_operation() {
        let repo = repo().await;
        let job = repo.create("/a", "/out").await.unwrap();
        let bad = Fields::new().with("status = 'x'; --", "y");

        assert!(matches!(
            repo.update(job.id, &bad).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(repo.find(&bad).await, Err(StoreError::Validation(_))));
        assert!(matches!(
            repo.table.insert(&bad).await,
            Err(StoreError::Validation(_))
        ));

        // The row is untouched
        assert_eq!(repo.get(job.id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn next_queued_prefers_oldest_then_lowest_id() {
        let repo = repo().await;
        let a = repo.create("/a", "/out").await.unwrap();
        let b = repo.create("/b", "/out").await.unwrap();

        // Force identical creation times so the id decides
        let same = Fields::new().with("created_at", "2024-01-01 00:00:00.000000");
        repo.update(a.id, &same).await.unwrap();
        repo.update(b.id, &same).await.unwrap();
        assert_eq!(repo.next_queued().await.unwrap().unwrap().id, a.id);

        // An older b now wins regardless of id
        repo.update(
            b.id,
            &Fields::new().with("created_at", "2023-12-31 23:59:59.000000"),
        )
        .await
        .unwrap();
        assert_eq!(repo.next_queued().await.unwrap().unwrap().id, b.id);

        repo.mark_processing(b.id).await.unwrap();
        repo.mark_processing(a.id).await.unwrap();
        assert!(repo.next_queued().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_transitions_record_outcome() {
        let repo = repo().await;
        let done = repo.create("/a", "/out").await.unwrap();
        let failed = repo.create("/b", "/out").await.unwrap();
        let errored = repo.create("/c", "/out").await.unwrap();

        repo.mark_completed(done.id).await.unwrap();
        repo.mark_failed(failed.id, "bad input", 3).await.unwrap();
        repo.mark_error(errored.id, "parser crashed").await.unwrap();

        let done = repo.get(done.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.success, Some(true));
        assert!(done.updated_at >= done.created_at);

        let failed = repo.get(failed.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("bad input"));
        assert_eq!(failed.retry_count, 3);

        let errored = repo.get(errored.id).await.unwrap();
        assert_eq!(errored.status, JobStatus::Error);
        assert_eq!(errored.error_message.as_deref(), Some("parser crashed"));
    }

    #[tokio::test]
    async fn stale_processing_rows_are_requeued() {
        let repo = repo().await;
        let stale = repo.create("/a", "/out").await.unwrap();
        let fresh = repo.create("/b", "/out").await.unwrap();

        repo.update(
            stale.id,
            &Fields::new()
                .with("status", JobStatus::Processing)
                .with("retry_count", 2_i64)
                .with("created_at", "2000-01-01 00:00:00.000000")
                .with("updated_at", "2000-01-01 00:00:00.000000"),
        )
        .await
        .unwrap();
        repo.mark_processing(fresh.id).await.unwrap();

        let requeued = repo
            .requeue_stale_processing(Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(requeued, 1);

        let stale = repo.get(stale.id).await.unwrap();
        assert_eq!(stale.status, JobStatus::Queued);
        assert_eq!(stale.retry_count, 2);
        assert_eq!(
            repo.get(fresh.id).await.unwrap().status,
            JobStatus::Processing
        );
    }

    #[tokio::test]
    async fn stale_cutoff_beyond_the_calendar_requeues_nothing() {
        let repo = repo().await;
        let job = repo.create("/a", "/out").await.unwrap();
        repo.update(
            job.id,
            &Fields::new()
                .with("status", JobStatus::Processing)
                .with("updated_at", "2000-01-01 00:00:00.000000"),
        )
        .await
        .unwrap();

        for older_than in [Duration::from_secs(10_000_000_000_000), Duration::MAX] {
            let requeued = repo.requeue_stale_processing(older_than).await.unwrap();
            assert_eq!(requeued, 0);
        }
        assert_eq!(repo.get(job.id).await.unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn column_names_with_spaces_stay_one_identifier() {
        let repo = repo().await;
        repo.create("/a", "/out").await.unwrap();
        repo.create("/b", "/out").await.unwrap();

        // Unquoted this would read `id OR id = ?` and match every row
        match repo.find(&Fields::new().with("id OR id", 1_i64)).await {
            Ok(rows) => assert!(rows.is_empty(), "matched {} rows", rows.len()),
            Err(StoreError::Database(_)) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn table_names_with_spaces_work_end_to_end() {
        let pool = connection::connect_in_memory().await.unwrap();
        let queue = SqlIdent::parse("miner queue").unwrap();
        let results = SqlIdent::parse("speed data").unwrap();
        migrations::ensure_schema(&pool, &queue, &results)
            .await
            .unwrap();
        // Idempotent with quoted names too
        migrations::ensure_schema(&pool, &queue, &results)
            .await
            .unwrap();

        let repo = JobRepository::new(pool, queue);
        let job = repo.create("/a", "/out").await.unwrap();
        assert_eq!(repo.next_queued().await.unwrap().unwrap().id, job.id);

        repo.update(
            job.id,
            &Fields::new()
                .with("status", JobStatus::Processing)
                .with("updated_at", "2000-01-01 00:00:00.000000"),
        )
        .await
        .unwrap();
        assert_eq!(
            repo.requeue_stale_processing(Duration::from_secs(60))
                .await
                .unwrap(),
            1
        );
        assert_eq!(repo.list(Some(JobStatus::Queued)).await.unwrap().len(), 1);
    }
}
