use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::info;

use super::{ProcessOutcome, Processor, ProcessorFault};

/// Stand-in processor for running the service without a real parser
///
/// Sleeps for a random delay and then reports success with the configured
/// probability.
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    max_delay: Duration,
    success_percent: u32,
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(5),
            success_percent: 77,
        }
    }
}

impl SimulatedProcessor {
    pub fn new(max_delay: Duration, success_percent: u32) -> Self {
        Self {
            max_delay,
            success_percent: success_percent.min(100),
        }
    }
}

#[async_trait]
impl Processor for SimulatedProcessor {
    async fn process(
        &self,
        input_folder: &Path,
        output_folder: &Path,
    ) -> Result<ProcessOutcome, ProcessorFault> {
        // ThreadRng is not Send; draw everything before the first await
        let (delay, roll) = {
            let mut rng = rand::thread_rng();
            let max_ms = self.max_delay.as_millis() as u64;
            (
                Duration::from_millis(rng.gen_range(0..=max_ms)),
                rng.gen_range(0..100),
            )
        };

        info!(
            "Simulating processing of {} for {:?}",
            input_folder.display(),
            delay
        );
        sleep(delay).await;

        if roll >= self.success_percent {
            return Ok(ProcessOutcome::failed(format!(
                "simulated failure for {}",
                input_folder.display()
            )));
        }

        let name = input_folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_folder.display().to_string());

        let mut payload = Map::new();
        payload.insert("name".to_string(), Value::String(name));
        payload.insert(
            "date".to_string(),
            Value::String(Utc::now().format("%Y-%m-%d").to_string()),
        );
        payload.insert("product".to_string(), Value::String("simulated".to_string()));
        payload.insert(
            "output_folder".to_string(),
            Value::String(output_folder.display().to_string()),
        );
        Ok(ProcessOutcome::succeeded(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds_at_full_rate() {
        let processor = SimulatedProcessor::new(Duration::ZERO, 100);
        let outcome = processor
            .process(Path::new("/data/run-42"), Path::new("/out"))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.payload.get("name").unwrap(), "run-42");
        assert_eq!(outcome.payload.get("product").unwrap(), "simulated");
    }

    #[tokio::test]
    async fn always_fails_at_zero_rate() {
        let processor = SimulatedProcessor::new(Duration::ZERO, 0);
        let outcome = processor
            .process(Path::new("/data/run-42"), Path::new("/out"))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error_message().contains("/data/run-42"));
    }
}
