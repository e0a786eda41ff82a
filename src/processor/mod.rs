//! Processing adapter boundary
//!
//! The worker hands each job's folders to a [`Processor`] and only looks at
//! the reported outcome. A reported failure (`success == false`) and a fault
//! (`Err`) are different things: the first is retried, the second is not.

pub mod command;
pub mod simulated;

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use command::CommandProcessor;
pub use simulated::SimulatedProcessor;

/// Message recorded when a failed outcome carries none
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// What the processor reported for one job
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub success: bool,
    /// Descriptive fields on success, `error_message` on failure
    pub payload: Map<String, Value>,
}

impl ProcessOutcome {
    pub fn succeeded(payload: Map<String, Value>) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert(
            "error_message".to_string(),
            Value::String(error_message.into()),
        );
        Self {
            success: false,
            payload,
        }
    }

    pub fn error_message(&self) -> &str {
        self.payload
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ERROR)
    }
}

/// The processor could not produce an outcome at all
#[derive(Error, Debug)]
pub enum ProcessorFault {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable processor output: {0}")]
    Output(String),

    #[error("processor crashed: {0}")]
    Crashed(String),
}

/// Performs the real work for one job
///
/// Runs to completion before the worker looks at the queue again.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        input_folder: &Path,
        output_folder: &Path,
    ) -> Result<ProcessOutcome, ProcessorFault>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_defaults_when_absent() {
        let outcome = ProcessOutcome {
            success: false,
            payload: Map::new(),
        };
        assert_eq!(outcome.error_message(), UNKNOWN_ERROR);

        let outcome = ProcessOutcome {
            success: false,
            payload: json!({"error_message": 5}).as_object().unwrap().clone(),
        };
        assert_eq!(outcome.error_message(), UNKNOWN_ERROR);
    }

    #[test]
    fn failed_outcome_carries_message() {
        let outcome = ProcessOutcome::failed("no sensor files");
        assert!(!outcome.success);
        assert_eq!(outcome.error_message(), "no sensor files");
    }
}
