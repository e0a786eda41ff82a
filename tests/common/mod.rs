#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use miner::config::Config;
use miner::db::{self, Fields, JobRepository, JobStatus, ResultRepository};
use miner::processor::{ProcessOutcome, Processor, ProcessorFault};
use serde_json::{json, Map, Value};
use sqlx::{Pool, Sqlite};

/// Fresh in-memory database with the schema in place
pub async fn setup() -> (Config, Pool<Sqlite>) {
    let config = Config {
        poll_interval: Duration::from_millis(10),
        ..Config::default()
    };
    let pool = db::connection::connect_in_memory().await.unwrap();
    db::migrations::ensure_schema(&pool, &config.queue_table, &config.result_table)
        .await
        .unwrap();
    (config, pool)
}

pub fn jobs(config: &Config, pool: &Pool<Sqlite>) -> JobRepository {
    JobRepository::new(pool.clone(), config.queue_table.clone())
}

pub fn results(config: &Config, pool: &Pool<Sqlite>) -> ResultRepository {
    ResultRepository::new(pool.clone(), config.result_table.clone())
}

pub fn success_payload(name: &str) -> Map<String, Value> {
    json!({"name": name, "date": "2024-05-01", "product": "speed"})
        .as_object()
        .unwrap()
        .clone()
}

/// One scripted processor reaction
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(Map<String, Value>),
    Fail(String),
    FailWithoutMessage,
    Fault(String),
    Panic,
}

/// Processor replaying a script and recording what it saw
///
/// Each call records the input folder and the job's status as stored at the
/// moment the processor ran. Once the script is exhausted every call succeeds.
pub struct ScriptedProcessor {
    jobs: JobRepository,
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(PathBuf, JobStatus)>>,
}

impl ScriptedProcessor {
    pub fn new(jobs: JobRepository, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            jobs,
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(PathBuf, JobStatus)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor for ScriptedProcessor {
    async fn process(
        &self,
        input_folder: &Path,
        _output_folder: &Path,
    ) -> Result<ProcessOutcome, ProcessorFault> {
        let rows = self
            .jobs
            .find(&Fields::new().with("raw_data_folder", input_folder.to_string_lossy().into_owned()))
            .await
            .unwrap();
        let status = rows.last().map(|r| r.status).unwrap();
        self.calls
            .lock()
            .unwrap()
            .push((input_folder.to_path_buf(), status));

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Succeed(payload)) => Ok(ProcessOutcome::succeeded(payload)),
            Some(Step::Fail(message)) => Ok(ProcessOutcome::failed(message)),
            Some(Step::FailWithoutMessage) => Ok(ProcessOutcome {
                success: false,
                payload: Map::new(),
            }),
            Some(Step::Fault(message)) => Err(ProcessorFault::Crashed(message)),
            Some(Step::Panic) => panic!("parser blew up"),
            None => Ok(ProcessOutcome::succeeded(success_payload("default"))),
        }
    }
}
