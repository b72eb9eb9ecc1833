//! Stages of an iOS build run.

use serde::{Deserialize, Serialize};

/// Steps of a run, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// agvtool next-version -all (best effort)
    Increment,

    /// Path resolution and artifact directory creation
    Prepare,

    /// ExportOptions.plist generation
    Manifest,

    /// xcodebuild archive
    Archive,

    /// xcodebuild -exportArchive
    Export,
}

impl Stage {
    /// All stages in the order a run visits them.
    pub const ALL: [Stage; 5] = [
        Stage::Increment,
        Stage::Prepare,
        Stage::Manifest,
        Stage::Archive,
        Stage::Export,
    ];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Increment => "increment",
            Stage::Prepare => "prepare",
            Stage::Manifest => "manifest",
            Stage::Archive => "archive",
            Stage::Export => "export",
        }
    }

    /// Whether a failure in this stage ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Stage::Increment)
    }

    /// Whether this stage drives the toolchain with a persisted log.
    pub fn writes_log(&self) -> bool {
        matches!(self, Stage::Archive | Stage::Export)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
