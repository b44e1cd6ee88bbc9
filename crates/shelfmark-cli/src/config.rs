//! Credential resolution.
//!
//! The embedding API key is looked up in priority order: an explicit
//! `--api-key` flag, a settings file (`--settings` or the per-user config
//! directory), then the `OPENAI_API_KEY` environment variable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use directories::ProjectDirs;
use serde::Deserialize;

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Deserialize)]
struct Settings {
    api_key: Option<String>,
}

/// Resolves the API key, or explains where it was looked for.
pub fn require_api_key(explicit: Option<&str>, settings: Option<&Path>) -> Result<String> {
    if let Some(key) = resolve_api_key(explicit, settings) {
        return Ok(key);
    }
    bail!(
        "no API key found; pass --api-key, put {{\"api_key\": \"...\"}} in a settings \
         file (--settings or {}), or set {API_KEY_ENV}",
        default_settings_file()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "the user config directory".to_string())
    )
}

pub fn resolve_api_key(explicit: Option<&str>, settings: Option<&Path>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    let settings_file = settings
        .map(Path::to_path_buf)
        .or_else(default_settings_file);
    if let Some(key) = settings_file.as_deref().and_then(read_settings_key) {
        return Some(key);
    }
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Missing or unreadable settings files are not an error; the next source
/// in the chain is tried instead.
fn read_settings_key(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let settings: Settings = serde_json::from_slice(&bytes).ok()?;
    settings.api_key.filter(|k| !k.is_empty())
}

fn default_settings_file() -> Option<PathBuf> {
    ProjectDirs::from("dev", "shelfmark", "shelfmark")
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_key_wins() {
        assert_eq!(
            resolve_api_key(Some("sk-explicit"), None).as_deref(),
            Some("sk-explicit")
        );
    }

    #[test]
    fn settings_file_key_is_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"api_key": "sk-from-file"}"#).unwrap();
        assert_eq!(
            resolve_api_key(None, Some(&path)).as_deref(),
            Some("sk-from-file")
        );
    }

    #[test]
    fn explicit_key_beats_settings_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"api_key": "sk-from-file"}"#).unwrap();
        assert_eq!(
            resolve_api_key(Some("sk-explicit"), Some(&path)).as_deref(),
            Some("sk-explicit")
        );
    }

    #[test]
    fn malformed_settings_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json at all").unwrap();
        assert!(read_settings_key(&path).is_none());
    }

    #[test]
    fn empty_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"api_key": ""}"#).unwrap();
        assert!(read_settings_key(&path).is_none());
        assert!(resolve_api_key(Some(""), Some(&path)).is_none() || std::env::var(API_KEY_ENV).is_ok());
    }
}
