//! Robin Core
//!
//! Configuration model shared by the Robin crates:
//! - `robin.yml` build configuration and `robin_credentials.yml` credentials
//! - [`BuildSpec`], the per-run input to the iOS orchestrator
//! - project scaffolding for `robin init`
//! - tracing setup

pub mod config;
pub mod error;
pub mod scaffold;
pub mod spec;
pub mod telemetry;

pub use config::{
    BuildSection, Environment, IosConfig, RobinConfig, CONFIG_FILE, CREDENTIALS_FILE,
    DEFAULT_ENVIRONMENT,
};
pub use error::{ConfigError, ConfigResult};
pub use scaffold::{detect_project_type, init_project, ProjectInfo, ProjectType};
pub use spec::{BuildSpec, Credentials};
pub use telemetry::init_tracing;
