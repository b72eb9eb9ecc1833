//! Xcode toolchain commands.

use std::path::PathBuf;

use robin_core::BuildSpec;

use crate::paths::ArtifactPaths;
use crate::runner::Invocation;

/// Archive destination: any iOS device.
pub const GENERIC_IOS_DESTINATION: &str = "generic/platform=iOS";

/// Executables used for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub xcodebuild: PathBuf,
    pub agvtool: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            xcodebuild: PathBuf::from("xcodebuild"),
            agvtool: PathBuf::from("agvtool"),
        }
    }
}

impl Toolchain {
    /// Defaults, overridden by `ROBIN_XCODEBUILD` / `ROBIN_AGVTOOL` when set.
    pub fn from_env() -> Self {
        let mut toolchain = Self::default();
        if let Some(path) = std::env::var_os("ROBIN_XCODEBUILD").filter(|v| !v.is_empty()) {
            toolchain.xcodebuild = PathBuf::from(path);
        }
        if let Some(path) = std::env::var_os("ROBIN_AGVTOOL").filter(|v| !v.is_empty()) {
            toolchain.agvtool = PathBuf::from(path);
        }
        toolchain
    }

    /// `xcodebuild -workspace {app}.xcworkspace -scheme {scheme} -destination generic/platform=iOS -archivePath {archive} archive`
    pub fn archive(&self, spec: &BuildSpec, paths: &ArtifactPaths) -> Invocation {
        Invocation::new(&self.xcodebuild, &spec.project_path)
            .arg("-workspace")
            .arg(format!("{}.xcworkspace", spec.app_name))
            .arg("-scheme")
            .arg(&spec.scheme)
            .arg("-destination")
            .arg(GENERIC_IOS_DESTINATION)
            .arg("-archivePath")
            .arg(&paths.archive)
            .arg("archive")
            .with_timeout(spec.timeout)
    }

    /// `xcodebuild -exportArchive -archivePath {archive} -exportPath {export} -exportOptionsPlist {manifest}`
    pub fn export(&self, spec: &BuildSpec, paths: &ArtifactPaths) -> Invocation {
        Invocation::new(&self.xcodebuild, &spec.project_path)
            .arg("-exportArchive")
            .arg("-archivePath")
            .arg(&paths.archive)
            .arg("-exportPath")
            .arg(&paths.export)
            .arg("-exportOptionsPlist")
            .arg(&paths.export_manifest)
            .with_timeout(spec.timeout)
    }

    /// `agvtool next-version -all`
    pub fn next_version(&self, spec: &BuildSpec) -> Invocation {
        Invocation::new(&self.agvtool, &spec.project_path)
            .args(["next-version", "-all"])
            .with_timeout(spec.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::ffi::OsString;
    use std::path::Path;

    fn spec() -> BuildSpec {
        BuildSpec {
            app_name: "Demo".to_string(),
            project_path: PathBuf::from("/work/ios"),
            output_dir: PathBuf::from("/work/builds"),
            scheme: "DemoDev".to_string(),
            export_method: "development".to_string(),
            increment_build_number: false,
            verbose: false,
            timeout: None,
        }
    }

    fn strings(inv: &Invocation) -> Vec<String> {
        inv.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_archive_invocation() {
        let spec = spec();
        let paths = ArtifactPaths::derive(&spec, Path::new("/tmp"), Local::now());
        let inv = Toolchain::default().archive(&spec, &paths);

        assert_eq!(inv.program, PathBuf::from("xcodebuild"));
        assert_eq!(inv.working_dir, PathBuf::from("/work/ios"));
        assert_eq!(
            strings(&inv),
            vec![
                "-workspace",
                "Demo.xcworkspace",
                "-scheme",
                "DemoDev",
                "-destination",
                "generic/platform=iOS",
                "-archivePath",
                "/work/builds/Archives/Demo.xcarchive",
                "archive",
            ]
        );
    }

    #[test]
    fn test_export_invocation() {
        let spec = spec();
        let paths = ArtifactPaths::derive(&spec, Path::new("/tmp"), Local::now());
        let inv = Toolchain::default().export(&spec, &paths);

        assert!(inv.has_arg("-exportArchive"));
        assert_eq!(
            strings(&inv)[1..],
            [
                "-archivePath",
                "/work/builds/Archives/Demo.xcarchive",
                "-exportPath",
                "/work/builds/IPA",
                "-exportOptionsPlist",
                "/work/ios/ExportOptions.plist",
            ]
        );
    }

    #[test]
    fn test_next_version_invocation_carries_timeout() {
        let mut spec = spec();
        spec.timeout = Some(std::time::Duration::from_secs(60));
        let inv = Toolchain::default().next_version(&spec);

        assert_eq!(inv.program, PathBuf::from("agvtool"));
        assert_eq!(
            inv.args,
            vec![OsString::from("next-version"), OsString::from("-all")]
        );
        assert_eq!(inv.timeout, spec.timeout);
    }
}
