use serde::Serialize;

use crate::db::JobRow;

/// Response for job listing
#[derive(Serialize)]
pub struct JobListResponse {
    pub count: usize,
    /// Listed jobs still QUEUED or PROCESSING
    pub pending: usize,
    pub jobs: Vec<JobRow>,
}
