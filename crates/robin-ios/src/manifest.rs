//! ExportOptions.plist generation.
//!
//! The manifest is regenerated on every run because the export method
//! differs between environments. Only `method` and `teamID` vary.

use std::path::Path;

use tracing::info;

/// File name of the export manifest inside the project directory.
pub const EXPORT_OPTIONS_FILE: &str = "ExportOptions.plist";

/// Render the export manifest for `export_method` and `team_id`.
pub fn export_options_plist(export_method: &str, team_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>method</key><string>{method}</string>
    <key>teamID</key><string>{team}</string>
    <key>compileBitcode</key><true/>
    <key>destination</key><string>export</string>
    <key>signingStyle</key><string>automatic</string>
    <key>stripSwiftSymbols</key><true/>
</dict>
</plist>"#,
        method = xml_escape(export_method),
        team = xml_escape(team_id),
    )
}

/// Write the export manifest to `path`, replacing any existing file.
pub async fn generate(path: &Path, export_method: &str, team_id: &str) -> std::io::Result<()> {
    tokio::fs::write(path, export_options_plist(export_method, team_id)).await?;
    info!(path = %path.display(), method = export_method, "Export manifest written");
    Ok(())
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_STORE_MANIFEST: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">
<plist version=\"1.0\">
<dict>
    <key>method</key><string>app-store</string>
    <key>teamID</key><string>ABCDE12345</string>
    <key>compileBitcode</key><true/>
    <key>destination</key><string>export</string>
    <key>signingStyle</key><string>automatic</string>
    <key>stripSwiftSymbols</key><true/>
</dict>
</plist>";

    #[test]
    fn test_manifest_matches_template() {
        assert_eq!(
            export_options_plist("app-store", "ABCDE12345"),
            APP_STORE_MANIFEST
        );
    }

    #[test]
    fn test_manifest_escapes_markup() {
        let plist = export_options_plist("development", "A&B<C>");
        assert!(plist.contains("<string>A&amp;B&lt;C&gt;</string>"));
    }

    #[tokio::test]
    async fn test_generate_writes_byte_identical_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_OPTIONS_FILE);

        generate(&path, "app-store", "ABCDE12345").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), APP_STORE_MANIFEST);
    }

    #[tokio::test]
    async fn test_generate_overwrites_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_OPTIONS_FILE);

        generate(&path, "development", "ABCDE12345").await.unwrap();
        generate(&path, "app-store", "ABCDE12345").await.unwrap();
        generate(&path, "app-store", "ABCDE12345").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), APP_STORE_MANIFEST);
    }

    #[tokio::test]
    async fn test_generate_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join(EXPORT_OPTIONS_FILE);
        assert!(generate(&path, "development", "T").await.is_err());
    }
}
