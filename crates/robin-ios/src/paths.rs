//! Artifact locations derived from a [`BuildSpec`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use robin_core::BuildSpec;
use serde::Serialize;

use crate::error::BuildError;
use crate::manifest::EXPORT_OPTIONS_FILE;

/// Where a run reads and writes its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    /// `outputDir/Archives/{appName}.xcarchive`
    pub archive: PathBuf,

    /// `outputDir/IPA`
    pub export: PathBuf,

    /// `projectPath/ExportOptions.plist`
    pub export_manifest: PathBuf,

    /// `logDir/xcodebuild-{YYYYMMDD-HHMMSS}.log`
    pub log: PathBuf,
}

impl ArtifactPaths {
    /// Derive the paths for one run. Pure: no filesystem access.
    pub fn derive(spec: &BuildSpec, log_dir: &Path, started_at: DateTime<Local>) -> Self {
        Self {
            archive: spec
                .output_dir
                .join("Archives")
                .join(format!("{}.xcarchive", spec.app_name)),
            export: spec.output_dir.join("IPA"),
            export_manifest: spec.project_path.join(EXPORT_OPTIONS_FILE),
            log: log_dir.join(log_file_name(started_at)),
        }
    }

    /// Same paths, made absolute against the current directory.
    ///
    /// Toolchain processes run inside the project directory, so relative
    /// paths would otherwise resolve against the wrong base.
    pub fn absolute(&self) -> Result<Self, BuildError> {
        Ok(Self {
            archive: absolute(&self.archive)?,
            export: absolute(&self.export)?,
            export_manifest: absolute(&self.export_manifest)?,
            log: absolute(&self.log)?,
        })
    }

    /// Create every directory the run writes into. Safe to call repeatedly.
    pub async fn ensure_dirs(&self) -> Result<(), BuildError> {
        let dirs = [
            self.archive.parent(),
            Some(self.export.as_path()),
            self.export_manifest.parent(),
            self.log.parent(),
        ];
        for dir in dirs.into_iter().flatten() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| BuildError::DirectoryCreation {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// `xcodebuild-YYYYMMDD-HHMMSS.log`
pub fn log_file_name(started_at: DateTime<Local>) -> String {
    format!("xcodebuild-{}.log", started_at.format("%Y%m%d-%H%M%S"))
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(path).map_err(|source| BuildError::PathResolution {
        path: path.to_path_buf(),
        source,
    })
}
