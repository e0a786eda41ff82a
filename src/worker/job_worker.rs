use std::path::PathBuf;
use std::sync::Arc;

use sqlx::{Pool, Sqlite};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::{JobRepository, JobRow, ResultRepository, StoreError};
use crate::processor::{ProcessOutcome, Processor, ProcessorFault};

/// Result of one pass over the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was QUEUED
    Idle,
    Completed { job_id: i64 },
    /// Processor reported failure; the job is QUEUED again
    Retried { job_id: i64, retry_count: i64 },
    /// Processor reported failure with no retries left
    Failed { job_id: i64 },
    /// Processor faulted; the job is parked in ERROR
    Errored { job_id: i64 },
}

/// Background worker draining the queue table one job at a time
///
/// Only one worker may run against a queue table: claiming a row is a read
/// followed by a separate update, so two workers could pick the same job.
pub struct QueueWorker {
    jobs: JobRepository,
    results: ResultRepository,
    processor: Arc<dyn Processor>,
    poll_interval: Duration,
    max_retries: i64,
    stale_processing_after: Duration,
}

impl QueueWorker {
    /// Create a new QueueWorker instance
    pub fn new(config: &Config, pool: Pool<Sqlite>, processor: Arc<dyn Processor>) -> Self {
        Self {
            jobs: JobRepository::new(pool.clone(), config.queue_table.clone()),
            results: ResultRepository::new(pool, config.result_table.clone()),
            processor,
            poll_interval: config.poll_interval,
            max_retries: config.max_retries,
            stale_processing_after: config.stale_processing_after,
        }
    }

    /// Run until `shutdown` flips to true
    ///
    /// # Loop
    /// - Requeues PROCESSING rows abandoned by a previous run
    /// - Claims the oldest QUEUED job and processes it to completion
    /// - Sleeps for the poll interval when the queue is empty or the store
    ///   fails; that sleep is the only place a shutdown request interrupts
    ///
    /// A job in flight when shutdown is requested is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Queue worker started: poll_interval={:?}, max_retries={}",
            self.poll_interval, self.max_retries
        );

        match self.recover_stale_jobs().await {
            Ok(0) => {}
            Ok(count) => warn!("Requeued {} jobs left in PROCESSING by a previous run", count),
            Err(e) => error!("Failed to requeue stale jobs: {}", e),
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.tick().await {
                Ok(TickOutcome::Idle) => true,
                Ok(outcome) => {
                    debug!("Tick finished: {:?}", outcome);
                    false
                }
                Err(e) => {
                    error!("Worker encountered database error: {}", e);
                    true
                }
            };

            if idle && self.wait_or_shutdown(&mut shutdown).await {
                break;
            }
        }

        info!("Queue worker stopped");
    }

    /// Requeue PROCESSING rows older than the staleness threshold
    pub async fn recover_stale_jobs(&self) -> Result<u64, StoreError> {
        self.jobs
            .requeue_stale_processing(self.stale_processing_after)
            .await
    }

    /// Claim and process at most one job
    pub async fn tick(&self) -> Result<TickOutcome, StoreError> {
        match self.jobs.next_queued().await? {
            Some(job) => self.process_job(job).await,
            None => Ok(TickOutcome::Idle),
        }
    }

    async fn process_job(&self, job: JobRow) -> Result<TickOutcome, StoreError> {
        let job_id = job.id;
        info!(
            job_id,
            "Processing request {}: {} -> {}", job_id, job.raw_data_folder, job.output_folder
        );

        // Visible before the processor starts; a crash from here on leaves
        // the row in PROCESSING until the next startup recovery.
        self.jobs.mark_processing(job_id).await?;

        match self.invoke(&job).await {
            Ok(outcome) if outcome.success => {
                self.jobs.mark_completed(job_id).await?;
                self.results
                    .append(&outcome.payload, &job.output_folder)
                    .await?;
                info!(job_id, "Successfully processed request {}", job_id);
                Ok(TickOutcome::Completed { job_id })
            }
            Ok(outcome) => self.handle_reported_failure(&job, &outcome).await,
            Err(fault) => {
                let message = fault.to_string();
                error!(job_id, error = %message, "Processor fault on request {}", job_id);
                self.jobs.mark_error(job_id, &message).await?;
                Ok(TickOutcome::Errored { job_id })
            }
        }
    }

    async fn handle_reported_failure(
        &self,
        job: &JobRow,
        outcome: &ProcessOutcome,
    ) -> Result<TickOutcome, StoreError> {
        let job_id = job.id;

        if job.retry_count < self.max_retries {
            let retry_count = job.retry_count + 1;
            self.jobs.requeue(job_id, retry_count).await?;
            warn!(
                job_id,
                error = outcome.error_message(),
                "Retrying request {} (attempt {})",
                job_id,
                retry_count
            );
            Ok(TickOutcome::Retried {
                job_id,
                retry_count,
            })
        } else {
            self.jobs
                .mark_failed(job_id, outcome.error_message(), job.retry_count)
                .await?;
            warn!(
                job_id,
                error = outcome.error_message(),
                "Failed request {} after {} attempts",
                job_id,
                self.max_retries
            );
            Ok(TickOutcome::Failed { job_id })
        }
    }

    /// Run the processor on its own task so a panic surfaces as a fault
    async fn invoke(&self, job: &JobRow) -> Result<ProcessOutcome, ProcessorFault> {
        let processor = Arc::clone(&self.processor);
        let input = PathBuf::from(&job.raw_data_folder);
        let output = PathBuf::from(&job.output_folder);

        tokio::spawn(async move { processor.process(&input, &output).await })
            .await
            .map_err(|e| ProcessorFault::Crashed(panic_message(e)))?
    }

    /// Sleep for one poll interval; true when shutdown was requested meanwhile
    async fn wait_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = sleep(self.poll_interval) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "processor panicked".to_string()
    }
}
