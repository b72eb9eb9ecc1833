//! iOS build orchestration.
//!
//! One run is: optional build number bump (best effort), artifact path
//! preparation, export manifest generation, `xcodebuild archive`, then
//! `xcodebuild -exportArchive`. Every step after the bump short-circuits the
//! run on failure, so export never starts without a completed archive.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use robin_core::{BuildSpec, Credentials};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{BuildError, StageFailure};
use crate::manifest;
use crate::paths::ArtifactPaths;
use crate::runner::ProcessRunner;
use crate::stage::Stage;
use crate::version::BuildNumberIncrementer;
use crate::xcode::Toolchain;

/// What happened to the build number during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IncrementOutcome {
    /// `increment_build_number` was off.
    Skipped,
    /// agvtool succeeded; `version` is the new build number if it was reported.
    Incremented { version: Option<String> },
    /// agvtool failed. The run carried on.
    Failed { reason: String },
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub paths: ArtifactPaths,
    pub build_number: IncrementOutcome,
    pub duration_ms: u64,
}

/// Terminal outcome of one orchestrated run.
#[derive(Debug)]
pub enum RunResult {
    Success(RunReport),
    Failed(StageFailure),
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success(_))
    }

    /// Stage that ended the run, if it failed.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            RunResult::Success(_) => None,
            RunResult::Failed(failure) => Some(failure.stage),
        }
    }

    pub fn into_result(self) -> Result<RunReport, StageFailure> {
        match self {
            RunResult::Success(report) => Ok(report),
            RunResult::Failed(failure) => Err(failure),
        }
    }
}

impl From<Result<RunReport, StageFailure>> for RunResult {
    fn from(result: Result<RunReport, StageFailure>) -> Self {
        match result {
            Ok(report) => RunResult::Success(report),
            Err(failure) => RunResult::Failed(failure),
        }
    }
}

/// Sequences the steps of an iOS build.
///
/// Holds no per-run state; one orchestrator can drive any number of
/// sequential runs.
pub struct BuildOrchestrator {
    runner: Arc<dyn ProcessRunner>,
    toolchain: Toolchain,
    log_dir: PathBuf,
}

impl BuildOrchestrator {
    /// Orchestrator with the default toolchain, logging to the OS temp dir.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            toolchain: Toolchain::default(),
            log_dir: std::env::temp_dir(),
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Directory for `xcodebuild-*.log` files.
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Archive and export the app described by `spec`.
    pub async fn run_ios_build(&self, spec: BuildSpec, credentials: &Credentials) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "ios_build",
            run_id = %run_id,
            app = %spec.app_name,
            scheme = %spec.scheme,
        );
        self.run_stages(run_id, &spec, credentials)
            .instrument(span)
            .await
            .into()
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        spec: &BuildSpec,
        credentials: &Credentials,
    ) -> Result<RunReport, StageFailure> {
        let started = Instant::now();
        info!(export_method = %spec.export_method, "Starting iOS build");

        let build_number = self.increment_build_number(spec).await;

        let paths = ArtifactPaths::derive(spec, &self.log_dir, Local::now());
        let paths = paths.absolute().map_err(|cause| fail(Stage::Prepare, None, cause))?;
        paths
            .ensure_dirs()
            .await
            .map_err(|cause| fail(Stage::Prepare, None, cause))?;

        manifest::generate(
            &paths.export_manifest,
            &spec.export_method,
            &credentials.team_id,
        )
        .await
        .map_err(|source| {
            let cause = BuildError::ManifestGeneration {
                path: paths.export_manifest.clone(),
                source,
            };
            fail(Stage::Manifest, None, cause)
        })?;

        info!(archive = %paths.archive.display(), "Archiving the project");
        self.runner
            .run(&self.toolchain.archive(spec, &paths), &paths.log, spec.verbose)
            .await
            .map_err(|e| fail(Stage::Archive, Some(paths.log.as_path()), e.into()))?;

        info!(export = %paths.export.display(), "Exporting IPA");
        self.runner
            .run(&self.toolchain.export(spec, &paths), &paths.log, spec.verbose)
            .await
            .map_err(|e| fail(Stage::Export, Some(paths.log.as_path()), e.into()))?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(duration_ms, "Build completed successfully");

        Ok(RunReport {
            run_id,
            paths,
            build_number,
            duration_ms,
        })
    }

    async fn increment_build_number(&self, spec: &BuildSpec) -> IncrementOutcome {
        if !spec.increment_build_number {
            return IncrementOutcome::Skipped;
        }

        let incrementer = BuildNumberIncrementer::new(self.runner.as_ref(), &self.toolchain);
        match incrementer.increment(spec).await {
            Ok(version) => IncrementOutcome::Incremented { version },
            Err(e) => {
                let cause = BuildError::BuildNumberIncrement(e);
                warn!(stage = %Stage::Increment, error = %cause, "Continuing without a new build number");
                IncrementOutcome::Failed {
                    reason: cause.to_string(),
                }
            }
        }
    }
}

fn fail(stage: Stage, log_path: Option<&Path>, cause: BuildError) -> StageFailure {
    match log_path {
        Some(log) => error!(%stage, error = %cause, log = %log.display(), "Stage failed"),
        None => error!(%stage, error = %cause, "Stage failed"),
    }
    StageFailure {
        stage,
        log_path: log_path.map(Path::to_path_buf),
        cause,
    }
}
