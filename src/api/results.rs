use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use super::job::ServiceError;
use crate::db::{ResultRepository, ResultRow};

/// Response for result listing
#[derive(Serialize)]
struct ResultListResponse {
    count: usize,
    results: Vec<ResultRow>,
}

/// Result records of completed jobs, oldest first
#[get("/results")]
async fn list_results(
    results: web::Data<ResultRepository>,
) -> Result<HttpResponse, ServiceError> {
    let results = results.list().await?;
    Ok(HttpResponse::Ok().json(ResultListResponse {
        count: results.len(),
        results,
    }))
}

pub fn results_config(config: &mut web::ServiceConfig) {
    config.service(list_results);
}
