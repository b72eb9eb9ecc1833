//! Build number increment via `agvtool`.
//!
//! Output is captured for diagnostics only; it is not written to the run's
//! log file.

use robin_core::BuildSpec;
use tracing::{debug, info};

use crate::error::ProcessError;
use crate::runner::ProcessRunner;
use crate::xcode::Toolchain;

/// Bumps the build number of every target in the project.
pub struct BuildNumberIncrementer<'a> {
    runner: &'a dyn ProcessRunner,
    toolchain: &'a Toolchain,
}

impl<'a> BuildNumberIncrementer<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, toolchain: &'a Toolchain) -> Self {
        Self { runner, toolchain }
    }

    /// Run `agvtool next-version -all` in the project directory.
    ///
    /// Returns the new build number when agvtool reports one.
    pub async fn increment(&self, spec: &BuildSpec) -> Result<Option<String>, ProcessError> {
        info!(project = %spec.project_path.display(), "Incrementing build number");
        let output = self
            .runner
            .capture(&self.toolchain.next_version(spec))
            .await?;
        debug!(output = %output.trim(), "agvtool output");

        let version = parse_new_version(&output);
        info!(version = version.as_deref().unwrap_or("unknown"), "Build number incremented");
        Ok(version)
    }
}

/// Extract the version from agvtool's "Setting version of project X to:"
/// report. The number may sit on the same line or the next one.
pub fn parse_new_version(output: &str) -> Option<String> {
    const PREFIX: &str = "Setting version of project";

    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        if !line.trim_start().starts_with(PREFIX) {
            continue;
        }
        let (_, tail) = line.rsplit_once("to:")?;
        let candidate = if tail.trim().is_empty() {
            lines.next().unwrap_or_default()
        } else {
            tail
        };
        let version = candidate.trim().trim_end_matches('.');
        return (!version.is_empty()).then(|| version.to_string());
    }
    None
}
