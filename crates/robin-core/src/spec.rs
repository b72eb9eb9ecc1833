//! Build and credential records handed to the orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Everything the orchestrator needs to archive and export one iOS app.
///
/// Built once per run (usually from `robin.yml` plus CLI flags) and then
/// handed to the orchestrator by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    /// App name; also names the `.xcworkspace` and the `.xcarchive`.
    pub app_name: String,

    /// Directory containing the Xcode workspace. Tools run from here.
    pub project_path: PathBuf,

    /// Root directory for archives and exported packages.
    pub output_dir: PathBuf,

    /// Xcode scheme to archive.
    pub scheme: String,

    /// Export method written to the export manifest (`development`, `app-store`, ...).
    pub export_method: String,

    /// Run `agvtool next-version -all` before archiving.
    pub increment_build_number: bool,

    /// Echo toolchain output to the console while it runs.
    pub verbose: bool,

    /// Upper bound for each toolchain invocation. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Apple developer account details read from `robin_credentials.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub app_identifier: String,

    #[serde(default)]
    pub apple_id: String,

    #[serde(default)]
    pub itc_team_id: String,

    #[serde(default)]
    pub team_id: String,
}

impl Credentials {
    /// Parse credentials from YAML text and check the fields a build needs.
    pub fn from_yaml_str(text: &str, origin: impl Into<PathBuf>) -> ConfigResult<Self> {
        let credentials: Credentials =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.into(),
                source,
            })?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load credentials from a file.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// The export manifest cannot be signed without a team identifier.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.team_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential { field: "team_id" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREDENTIALS: &str = r#"
app_identifier: com.example.demo
apple_id: dev@example.com
itc_team_id: "118929512"
team_id: ABCDE12345
"#;

    #[test]
    fn test_credentials_parse_all_fields() {
        let creds = Credentials::from_yaml_str(CREDENTIALS, "robin_credentials.yml").unwrap();
        assert_eq!(creds.app_identifier, "com.example.demo");
        assert_eq!(creds.apple_id, "dev@example.com");
        assert_eq!(creds.itc_team_id, "118929512");
        assert_eq!(creds.team_id, "ABCDE12345");
    }

    #[test]
    fn test_credentials_without_team_id_rejected() {
        let err = Credentials::from_yaml_str("apple_id: dev@example.com\n", "creds.yml")
            .expect_err("team_id is required");
        assert!(matches!(
            err,
            ConfigError::MissingCredential { field: "team_id" }
        ));
    }

    #[test]
    fn test_credentials_malformed_yaml_reports_origin() {
        let err = Credentials::from_yaml_str("team_id: [unclosed", "creds.yml").unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, PathBuf::from("creds.yml")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_credentials_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(dir.path().join("robin_credentials.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
