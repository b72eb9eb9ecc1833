//! Error types for iOS build orchestration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::stage::Stage;

fn log_hint(log_path: &Option<PathBuf>) -> String {
    log_path
        .as_ref()
        .map(|p| format!("; see log at {}", p.display()))
        .unwrap_or_default()
}

/// Failure of a single external toolchain invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The log file could not be created before starting the process.
    #[error("could not create log file {}: {source}", .path.display())]
    LogCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program could not be started (not found, not executable, ...).
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully. `-1` means killed by a signal.
    #[error("`{program}` exited with code {exit_code}{}", log_hint(.log_path))]
    Execution {
        program: String,
        exit_code: i32,
        log_path: Option<PathBuf>,
    },

    /// The program, or output it left open, outlived its deadline.
    #[error("`{program}` timed out after {}s{}", .limit.as_secs(), log_hint(.log_path))]
    Timeout {
        program: String,
        limit: Duration,
        log_path: Option<PathBuf>,
    },

    /// I/O failed while waiting for the program or draining its output.
    #[error("failed to capture output of `{program}`: {source}")]
    Capture {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Log file to show the operator, when the failure has one.
    pub fn log_path(&self) -> Option<&PathBuf> {
        match self {
            ProcessError::Execution { log_path, .. } | ProcessError::Timeout { log_path, .. } => {
                log_path.as_ref()
            }
            ProcessError::LogCreation { .. }
            | ProcessError::Spawn { .. }
            | ProcessError::Capture { .. } => None,
        }
    }

    /// Exit code, for failures where the program actually ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Execution { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Errors that can end (or, for the build number, degrade) an iOS build run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An artifact directory could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A relative artifact path could not be made absolute.
    #[error("failed to resolve path {}: {source}", .path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export manifest could not be written.
    #[error("failed to write export manifest {}: {source}", .path.display())]
    ManifestGeneration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive or export toolchain failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Build number bump failed. Never aborts a run.
    #[error("build number increment failed: {0}")]
    BuildNumberIncrement(#[source] ProcessError),
}

/// Terminal failure of an orchestrated run, tagged with the stage that failed.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct StageFailure {
    pub stage: Stage,

    /// Toolchain log for archive/export failures.
    pub log_path: Option<PathBuf>,

    #[source]
    pub cause: BuildError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_mentions_code_and_log() {
        let err = ProcessError::Execution {
            program: "xcodebuild".to_string(),
            exit_code: 65,
            log_path: Some(PathBuf::from("/tmp/xcodebuild-20250101-120000.log")),
        };
        let msg = err.to_string();
        assert!(msg.contains("65"));
        assert!(msg.contains("/tmp/xcodebuild-20250101-120000.log"));
        assert_eq!(err.exit_code(), Some(65));
    }

    #[test]
    fn test_execution_error_without_log() {
        let err = ProcessError::Execution {
            program: "agvtool".to_string(),
            exit_code: 1,
            log_path: None,
        };
        assert_eq!(err.to_string(), "`agvtool` exited with code 1");
        assert!(err.log_path().is_none());
    }

    #[test]
    fn test_timeout_error_displays_limit() {
        let err = ProcessError::Timeout {
            program: "xcodebuild".to_string(),
            limit: Duration::from_secs(90),
            log_path: None,
        };
        assert!(err.to_string().contains("90s"));
        assert!(err.exit_code().is_none());
    }

    #[test]
    fn test_stage_failure_is_stage_labelled() {
        let failure = StageFailure {
            stage: Stage::Export,
            log_path: None,
            cause: BuildError::Process(ProcessError::Execution {
                program: "xcodebuild".to_string(),
                exit_code: 70,
                log_path: None,
            }),
        };
        assert!(failure.to_string().starts_with("export stage failed"));
    }
}
