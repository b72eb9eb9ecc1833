//! `robin.yml` model and loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::spec::BuildSpec;

/// Default build configuration file name.
pub const CONFIG_FILE: &str = "robin.yml";

/// Default credentials file name.
pub const CREDENTIALS_FILE: &str = "robin_credentials.yml";

/// Environment selected when the caller does not name one.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Top-level `robin.yml` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobinConfig {
    pub build: BuildSection,
}

/// The `build:` section. Only iOS is supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
    pub ios: IosConfig,
}

/// The `build.ios:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IosConfig {
    pub app_name: String,
    pub project_path: PathBuf,
    pub output_dir: PathBuf,

    /// Named build flavours (`development`, `production`, ...).
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

/// One entry under `build.ios.environments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub scheme: String,

    #[serde(default)]
    pub increment_build_number: bool,

    pub export_method: String,
}

impl RobinConfig {
    /// Parse a configuration document. `origin` is only used in error messages.
    pub fn from_yaml_str(text: &str, origin: impl Into<PathBuf>) -> ConfigResult<Self> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.into(),
            source,
        })
    }

    /// Load a configuration file from disk.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        debug!(path = %path.display(), "Loading build configuration");
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }

    /// Write the configuration to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let yaml = self.to_yaml_string()?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up an environment by name.
    pub fn environment(&self, name: &str) -> ConfigResult<&Environment> {
        self.build
            .ios
            .environments
            .get(name)
            .ok_or_else(|| ConfigError::MissingEnvironment {
                name: name.to_string(),
            })
    }

    /// Combine the iOS section with one environment into a [`BuildSpec`].
    pub fn ios_build_spec(
        &self,
        environment: &str,
        verbose: bool,
        timeout: Option<Duration>,
    ) -> ConfigResult<BuildSpec> {
        let ios = &self.build.ios;
        let env = self.environment(environment)?;
        Ok(BuildSpec {
            app_name: ios.app_name.clone(),
            project_path: ios.project_path.clone(),
            output_dir: ios.output_dir.clone(),
            scheme: env.scheme.clone(),
            export_method: env.export_method.clone(),
            increment_build_number: env.increment_build_number,
            verbose,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
build:
  ios:
    app_name: Demo
    project_path: ./ios
    output_dir: ./builds
    environments:
      development:
        scheme: Demo
        increment_build_number: true
        export_method: development
      production:
        scheme: DemoRelease
        export_method: app-store
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = RobinConfig::from_yaml_str(SAMPLE, CONFIG_FILE).unwrap();
        let ios = &config.build.ios;
        assert_eq!(ios.app_name, "Demo");
        assert_eq!(ios.project_path, PathBuf::from("./ios"));
        assert_eq!(ios.output_dir, PathBuf::from("./builds"));
        assert_eq!(ios.environments.len(), 2);
    }

    #[test]
    fn test_increment_build_number_defaults_to_false() {
        let config = RobinConfig::from_yaml_str(SAMPLE, CONFIG_FILE).unwrap();
        let prod = config.environment("production").unwrap();
        assert!(!prod.increment_build_number);
        assert_eq!(prod.export_method, "app-store");
    }

    #[test]
    fn test_build_spec_from_development_environment() {
        let config = RobinConfig::from_yaml_str(SAMPLE, CONFIG_FILE).unwrap();
        let spec = config
            .ios_build_spec(DEFAULT_ENVIRONMENT, true, Some(Duration::from_secs(30)))
            .unwrap();

        assert_eq!(spec.app_name, "Demo");
        assert_eq!(spec.scheme, "Demo");
        assert_eq!(spec.export_method, "development");
        assert!(spec.increment_build_number);
        assert!(spec.verbose);
        assert_eq!(spec.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_unknown_environment_is_an_error() {
        let config = RobinConfig::from_yaml_str(SAMPLE, CONFIG_FILE).unwrap();
        let err = config.ios_build_spec("staging", false, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvironment { name } if name == "staging"));
    }

    #[test]
    fn test_missing_ios_section_is_a_parse_error() {
        let err = RobinConfig::from_yaml_str("build: {}\n", CONFIG_FILE).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_save_then_load_preserves_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = RobinConfig::from_yaml_str(SAMPLE, CONFIG_FILE).unwrap();

        config.save(&path).unwrap();
        let loaded = RobinConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
