use std::path::{Path, PathBuf};

use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, info, warn};

use super::dto::JobListResponse;
use super::models::{ProcessRequest, INVALID_RAW_DATA_FOLDER};
use crate::api::validation::ErrorResponse;
use crate::db::{JobRepository, JobRow, JobStatus, StoreError};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Input folder missing or not a directory
    #[error("{}", INVALID_RAW_DATA_FOLDER)]
    InvalidFolder,

    /// Request parameter rejected
    #[error("{0}")]
    ValidationError(String),

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(i64),

    /// Store operation failed
    #[error("{0}")]
    DatabaseError(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => ServiceError::NotFound(id),
            other => ServiceError::DatabaseError(other),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::DatabaseError(e) => {
                error!("Database error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string()))
            }
            ServiceError::InvalidFolder | ServiceError::ValidationError(_) => {
                warn!("Rejected request: {}", self);
                HttpResponse::BadRequest().json(ErrorResponse::new(self.to_string()))
            }
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse::new(format!(
                    "Job with id {} not found",
                    id
                )))
            }
        }
    }
}

/// Job service containing the submission and lookup logic
pub struct JobService {
    jobs: JobRepository,
    default_output_dir: PathBuf,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(jobs: JobRepository, default_output_dir: PathBuf) -> Self {
        Self {
            jobs,
            default_output_dir,
        }
    }

    /// Queue a folder for processing
    ///
    /// # Business Logic
    /// - `raw_data_folder` must name an existing directory
    /// - `output_folder` defaults to the configured output directory
    /// - The job is stored as QUEUED with no retries
    ///
    /// # Returns
    /// - `Ok(JobRow)` - the freshly created row, including its id
    /// - `Err(ServiceError)` - invalid folder or store failure
    pub async fn submit(&self, request: &ProcessRequest) -> Result<JobRow, ServiceError> {
        let raw_data_folder = match request.raw_data_folder.as_deref() {
            Some(folder) if !folder.is_empty() && Path::new(folder).is_dir() => folder,
            _ => return Err(ServiceError::InvalidFolder),
        };

        let output_folder = match request.output_folder.as_deref() {
            Some(folder) if !folder.is_empty() => folder.to_string(),
            _ => self.default_output_dir.to_string_lossy().into_owned(),
        };

        info!(
            "Service: Queueing {} -> {}",
            raw_data_folder, output_folder
        );

        let job = self
            .jobs
            .create(raw_data_folder, &output_folder)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!("Service: Job queued with id={}", job.id);
        Ok(job)
    }

    pub async fn get(&self, id: i64) -> Result<JobRow, ServiceError> {
        Ok(self.jobs.get(id).await?)
    }

    /// List queue rows, optionally restricted to one status
    pub async fn list(&self, status: Option<&str>) -> Result<JobListResponse, ServiceError> {
        let status = status
            .map(str::parse::<JobStatus>)
            .transpose()
            .map_err(ServiceError::ValidationError)?;

        let jobs = self.jobs.list(status).await?;
        Ok(JobListResponse {
            count: jobs.len(),
            pending: jobs.iter().filter(|job| !job.status.is_terminal()).count(),
            jobs,
        })
    }
}
