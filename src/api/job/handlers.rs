use actix_web::{
    get, post,
    web::{Data, Path, Query, ServiceConfig},
    HttpResponse,
};
use actix_web_validator::Json;

use super::models::{JobListQuery, ProcessRequest};
use super::service::{JobService, ServiceError};

/// Queue a processing job; answers 202 with the stored row
#[post("/process_data")]
async fn process_data(
    service: Data<JobService>,
    request: Json<ProcessRequest>,
) -> Result<HttpResponse, ServiceError> {
    let job = service.submit(&request).await?;
    Ok(HttpResponse::Accepted().json(job))
}

#[get("/jobs")]
async fn list_jobs(
    service: Data<JobService>,
    query: Query<JobListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.list(query.status.as_deref()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/jobs/{id}")]
async fn get_job(
    service: Data<JobService>,
    id: Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let job = service.get(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(job))
}

pub fn job_config(config: &mut ServiceConfig) {
    config
        .service(process_data)
        .service(list_jobs)
        .service(get_job);
}
