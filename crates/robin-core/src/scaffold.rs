//! Project detection and default `robin.yml` generation for `robin init`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::config::{BuildSection, Environment, IosConfig, RobinConfig, CONFIG_FILE};
use crate::error::{ConfigError, ConfigResult};

const EXPO_MANIFEST: &str = "app.json";
const FALLBACK_APP_NAME: &str = "MyApp";

/// Kind of project found in a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    /// An Expo (React Native) project with an `app.json`.
    Expo,
    /// Nothing recognised; defaults are used.
    Unknown,
}

/// Names pulled out of a project manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub app_name: String,
    pub scheme: String,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            app_name: FALLBACK_APP_NAME.to_string(),
            scheme: FALLBACK_APP_NAME.to_string(),
        }
    }
}

/// Detect the project type of `dir`.
pub fn detect_project_type(dir: &Path) -> ProjectType {
    if dir.join(EXPO_MANIFEST).is_file() {
        ProjectType::Expo
    } else {
        ProjectType::Unknown
    }
}

/// Read app name and scheme from an Expo `app.json`.
///
/// The app name comes from `expo.name`, falling back to `expo.slug`. The
/// scheme falls back to the app name.
pub fn read_expo_project(dir: &Path) -> ConfigResult<ProjectInfo> {
    let path = dir.join(EXPO_MANIFEST);
    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Detect {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let manifest: Value = serde_json::from_str(&text).map_err(|e| ConfigError::Detect {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let expo = &manifest["expo"];
    let app_name = expo["name"]
        .as_str()
        .or_else(|| expo["slug"].as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Detect {
            path: path.clone(),
            reason: "expo.name and expo.slug are both missing".to_string(),
        })?;
    let scheme = expo["scheme"]
        .as_str()
        .filter(|scheme| !scheme.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| app_name.clone());

    Ok(ProjectInfo { app_name, scheme })
}

/// Default configuration with a `development` and a `production` environment.
pub fn default_config(info: &ProjectInfo) -> RobinConfig {
    let environment = |export_method: &str| Environment {
        scheme: info.scheme.clone(),
        increment_build_number: true,
        export_method: export_method.to_string(),
    };

    let mut environments = BTreeMap::new();
    environments.insert("development".to_string(), environment("development"));
    environments.insert("production".to_string(), environment("app-store"));

    RobinConfig {
        build: BuildSection {
            ios: IosConfig {
                app_name: info.app_name.clone(),
                project_path: PathBuf::from("./ios"),
                output_dir: PathBuf::from("./builds"),
                environments,
            },
        },
    }
}

/// Detect the project in `dir` and write `dir/robin.yml`.
///
/// An existing `robin.yml` is only replaced when `force` is set.
pub fn init_project(dir: &Path, force: bool) -> ConfigResult<(ProjectType, PathBuf)> {
    let target = dir.join(CONFIG_FILE);
    if target.exists() && !force {
        return Err(ConfigError::AlreadyExists { path: target });
    }

    let project_type = detect_project_type(dir);
    let info = match project_type {
        ProjectType::Expo => {
            info!("Detected Expo project");
            read_expo_project(dir)?
        }
        ProjectType::Unknown => {
            info!("Could not detect a known project type, using defaults");
            ProjectInfo::default()
        }
    };

    default_config(&info).save(&target)?;
    info!(path = %target.display(), app = %info.app_name, "Wrote build configuration");
    Ok((project_type, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_app_json(dir: &Path, body: &str) {
        std::fs::write(dir.join(EXPO_MANIFEST), body).unwrap();
    }

    #[test]
    fn test_detect_unknown_without_app_json() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_project_type(dir.path()), ProjectType::Unknown);
    }

    #[test]
    fn test_detect_expo_with_app_json() {
        let dir = tempfile::tempdir().unwrap();
        write_app_json(dir.path(), r#"{"expo": {"name": "Demo"}}"#);
        assert_eq!(detect_project_type(dir.path()), ProjectType::Expo);
    }

    #[test]
    fn test_expo_scheme_falls_back_to_name() {
        let dir = tempfile::tempdir().unwrap();
        write_app_json(dir.path(), r#"{"expo": {"name": "Demo"}}"#);
        let info = read_expo_project(dir.path()).unwrap();
        assert_eq!(info.app_name, "Demo");
        assert_eq!(info.scheme, "Demo");
    }

    #[test]
    fn test_expo_slug_used_when_name_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_app_json(dir.path(), r#"{"expo": {"slug": "demo-app", "scheme": "demoapp"}}"#);
        let info = read_expo_project(dir.path()).unwrap();
        assert_eq!(info.app_name, "demo-app");
        assert_eq!(info.scheme, "demoapp");
    }

    #[test]
    fn test_expo_without_name_or_slug_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_app_json(dir.path(), r#"{"expo": {}}"#);
        assert!(matches!(
            read_expo_project(dir.path()),
            Err(ConfigError::Detect { .. })
        ));
    }

    #[test]
    fn test_default_config_environments() {
        let config = default_config(&ProjectInfo::default());
        let dev = config.environment("development").unwrap();
        let prod = config.environment("production").unwrap();
        assert_eq!(dev.export_method, "development");
        assert_eq!(prod.export_method, "app-store");
        assert!(dev.increment_build_number && prod.increment_build_number);
        assert_eq!(config.build.ios.app_name, "MyApp");
    }

    #[test]
    fn test_init_project_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        write_app_json(dir.path(), r#"{"expo": {"name": "Demo", "scheme": "demo"}}"#);

        let (kind, path) = init_project(dir.path(), false).unwrap();
        assert_eq!(kind, ProjectType::Expo);

        let config = RobinConfig::load(&path).unwrap();
        assert_eq!(config.build.ios.app_name, "Demo");
        assert_eq!(config.environment("production").unwrap().scheme, "demo");
    }

    #[test]
    fn test_init_project_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "build: {}\n").unwrap();

        let err = init_project(dir.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists { .. }));

        let (kind, _) = init_project(dir.path(), true).unwrap();
        assert_eq!(kind, ProjectType::Unknown);
    }
}
