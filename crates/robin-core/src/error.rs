//! Error types for configuration, credentials and scaffolding.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading or writing Robin's configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not valid YAML for the expected shape.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A configuration value could not be rendered as YAML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// The file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested environment is not defined under `build.ios.environments`.
    #[error("environment `{name}` is not defined under build.ios.environments")]
    MissingEnvironment { name: String },

    /// A credential required by the build is empty.
    #[error("credential `{field}` is missing or empty")]
    MissingCredential { field: &'static str },

    /// `init` refused to overwrite an existing configuration.
    #[error("{} already exists (use --force to overwrite)", .path.display())]
    AlreadyExists { path: PathBuf },

    /// Project detection could not read the project manifest.
    #[error("failed to inspect {}: {reason}", .path.display())]
    Detect { path: PathBuf, reason: String },
}

/// Convenience result alias.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
