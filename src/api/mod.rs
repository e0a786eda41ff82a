pub mod health;
pub mod job;
pub mod results;
pub mod validation;

use actix_web::web;

/// Register every HTTP route of the miner API
pub fn routes(config: &mut web::ServiceConfig) {
    config
        .configure(health::health_config)
        .configure(job::handlers::job_config)
        .configure(results::results_config);
}
