//! Robin iOS - archive and export orchestration
//!
//! Drives the Xcode toolchain for one release build:
//! - bumps the build number with `agvtool` (best effort)
//! - writes `ExportOptions.plist`
//! - runs `xcodebuild archive` and `xcodebuild -exportArchive`
//! - captures toolchain output to a timestamped log file

pub mod error;
pub mod fakes;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod version;
pub mod xcode;

// Re-export key types
pub use error::{BuildError, ProcessError, StageFailure};
pub use paths::ArtifactPaths;
pub use pipeline::{BuildOrchestrator, IncrementOutcome, RunReport, RunResult};
pub use runner::{Invocation, ProcessRunner, SystemRunner, FAILURE_MARKER};
pub use stage::Stage;
pub use version::BuildNumberIncrementer;
pub use xcode::Toolchain;
