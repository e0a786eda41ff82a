use std::path::Path;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing::info;

use miner::api::{self, job::JobService, validation};
use miner::config::Config;
use miner::db::{self, JobRepository, ResultRepository};
use miner::processor::{CommandProcessor, Processor, SimulatedProcessor};
use miner::shutdown::{ServerParts, ShutdownCoordinator};
use miner::worker::QueueWorker;

/// Folder-processing job queue: HTTP submission API and background worker
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Start only the API server
    #[arg(long, conflicts_with = "worker_only")]
    api_only: bool,

    /// Start only the background worker
    #[arg(long)]
    worker_only: bool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().map_err(std::io::Error::other)?;

    miner::logging::init(Path::new(&config.log_dir))?;

    info!("Starting miner");
    info!("Configuration loaded successfully:");
    info!("  - Database: {}", config.database_path);
    info!("  - Queue table: {}", config.queue_table);
    info!("  - Result table: {}", config.result_table);
    info!("  - Poll interval: {:?}", config.poll_interval);
    info!("  - Max retries: {}", config.max_retries);
    info!("  - Default output dir: {}", config.default_output_dir.display());

    std::fs::create_dir_all(&config.default_output_dir)?;

    let pool = db::connection::get_connection(&config.database_path, config.max_db_connections)
        .await
        .map_err(std::io::Error::other)?;
    info!("Database connection pool established");

    db::migrations::ensure_schema(&pool, &config.queue_table, &config.result_table)
        .await
        .map_err(std::io::Error::other)?;

    // watch channel: every receiver sees the latest shutdown flag
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let worker_handle = if cli.api_only {
        None
    } else {
        let processor: Arc<dyn Processor> = match config
            .processor_command
            .as_deref()
            .and_then(CommandProcessor::from_command_line)
        {
            Some(command) => {
                info!("Using external processor: {:?}", command);
                Arc::new(command)
            }
            None => {
                info!("No PROCESSOR_COMMAND set, using simulated processor");
                Arc::new(SimulatedProcessor::default())
            }
        };

        let worker = QueueWorker::new(&config, pool.clone(), processor);
        Some(tokio::spawn(async move { worker.run(shutdown_rx).await }))
    };

    let server = if cli.worker_only {
        None
    } else {
        let server_pool = pool.clone();
        let jobs = JobRepository::new(pool.clone(), config.queue_table.clone());
        let job_service = web::Data::new(JobService::new(jobs, config.default_output_dir.clone()));
        let results = web::Data::new(ResultRepository::new(
            pool.clone(),
            config.result_table.clone(),
        ));
        let max_payload_size = config.max_payload_size;

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(server_pool.clone()))
                .app_data(job_service.clone())
                .app_data(results.clone())
                .app_data(web::PayloadConfig::default().limit(max_payload_size))
                .app_data(validation::json_config().limit(max_payload_size))
                .configure(api::routes)
        })
        .bind(config.bind_address.as_str())?
        .run();

        info!("Server listening on http://{}", config.bind_address);

        let handle = server.handle();
        Some(ServerParts {
            handle,
            task: tokio::spawn(server),
        })
    };

    ShutdownCoordinator::new(server, worker_handle, shutdown_tx, pool)
        .wait_for_shutdown()
        .await
}
