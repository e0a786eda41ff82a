use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::{ProcessOutcome, Processor, ProcessorFault};

/// Runs an external program per job
///
/// The program is invoked as `<program> <args..> <input_folder> <output_folder>`
/// and must print one JSON object on stdout with a boolean `success` key; the
/// remaining keys become the outcome payload.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
}

impl CommandProcessor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace separated command line
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl Processor for CommandProcessor {
    async fn process(
        &self,
        input_folder: &Path,
        output_folder: &Path,
    ) -> Result<ProcessOutcome, ProcessorFault> {
        debug!(
            "Running {} on {} -> {}",
            self.program,
            input_folder.display(),
            output_folder.display()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input_folder)
            .arg(output_folder)
            .output()
            .await
            .map_err(|source| ProcessorFault::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ProcessorFault::Output(format!("stdout is not UTF-8: {}", e)))?;

        match parse_outcome(&stdout) {
            Some(outcome) => Ok(outcome),
            None if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ProcessorFault::Crashed(format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                )))
            }
            None => Err(ProcessorFault::Output(format!(
                "expected a JSON object with a boolean \"success\", got {:?}",
                stdout.trim()
            ))),
        }
    }
}

/// Last non-empty stdout line holding `{"success": bool, ...}`
fn parse_outcome(stdout: &str) -> Option<ProcessOutcome> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    let Value::Object(mut payload) = serde_json::from_str::<Value>(line.trim()).ok()? else {
        return None;
    };
    let success = payload.remove("success")?.as_bool()?;
    Some(ProcessOutcome { success, payload })
}
