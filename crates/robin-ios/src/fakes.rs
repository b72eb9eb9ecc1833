//! In-process fakes for the runner seam (testing only)
//!
//! [`ScriptedRunner`] records every invocation and answers with scripted
//! outcomes, so orchestration can be tested without Xcode installed.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::runner::{Invocation, ProcessRunner, FAILURE_MARKER};

#[derive(Debug, Clone)]
struct Script {
    needle: String,
    outcome: Outcome,
}

#[derive(Debug, Clone)]
enum Outcome {
    Fail(i32),
    Output(String),
}

/// Recording [`ProcessRunner`] with scripted results.
///
/// A script entry applies to an invocation when its needle equals the
/// program's file name or one of the arguments. The first matching entry wins;
/// unmatched invocations succeed with no output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Vec<Script>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make matching invocations exit with `exit_code`.
    pub fn fail_on(mut self, needle: &str, exit_code: i32) -> Self {
        self.scripts.push(Script {
            needle: needle.to_string(),
            outcome: Outcome::Fail(exit_code),
        });
        self
    }

    /// Make matching invocations succeed and print `output`.
    pub fn with_output(mut self, needle: &str, output: &str) -> Self {
        self.scripts.push(Script {
            needle: needle.to_string(),
            outcome: Outcome::Output(output.to_string()),
        });
        self
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any recorded invocation matches `needle`.
    pub fn was_called(&self, needle: &str) -> bool {
        self.calls().iter().any(|inv| matches(inv, needle))
    }

    fn record(&self, invocation: &Invocation) -> Option<Outcome> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
        self.scripts
            .iter()
            .find(|s| matches(invocation, &s.needle))
            .map(|s| s.outcome.clone())
    }
}

fn matches(invocation: &Invocation, needle: &str) -> bool {
    invocation
        .program
        .file_name()
        .is_some_and(|name| name == needle)
        || invocation.has_arg(needle)
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        log_path: &Path,
        _echo: bool,
    ) -> Result<(), ProcessError> {
        let outcome = self.record(invocation);

        let mut log = format!("$ {}\n", invocation.display());
        match &outcome {
            Some(Outcome::Output(text)) => log.push_str(text),
            Some(Outcome::Fail(code)) => log.push_str(&format!(
                "{FAILURE_MARKER} {} exited with code {code}\n",
                invocation.program_name()
            )),
            None => {}
        }
        tokio::fs::write(log_path, log)
            .await
            .map_err(|source| ProcessError::LogCreation {
                path: log_path.to_path_buf(),
                source,
            })?;

        match outcome {
            Some(Outcome::Fail(exit_code)) => Err(ProcessError::Execution {
                program: invocation.program_name(),
                exit_code,
                log_path: Some(log_path.to_path_buf()),
            }),
            _ => Ok(()),
        }
    }

    async fn capture(&self, invocation: &Invocation) -> Result<String, ProcessError> {
        match self.record(invocation) {
            Some(Outcome::Fail(exit_code)) => Err(ProcessError::Execution {
                program: invocation.program_name(),
                exit_code,
                log_path: None,
            }),
            Some(Outcome::Output(text)) => Ok(text),
            None => Ok(String::new()),
        }
    }
}
