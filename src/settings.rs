//! CLI-level settings stored as JSON in the OS config directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Settings file format version.
const SETTINGS_VERSION: u32 = 1;

// ── Error type ──────────────────────────────────────────────────

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "I/O error: {e}"),
            SettingsError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

// ── Settings ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub version: u32,
    /// Directory that relative script paths resolve against.
    #[serde(default)]
    pub script_dir: Option<PathBuf>,
    /// Default the CLI to JSON reports instead of streaming text.
    #[serde(default)]
    pub json_output: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            script_dir: None,
            json_output: false,
        }
    }
}

/// Platform settings path, e.g. `~/.config/snapscript/settings.json`.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "snapscript")
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

pub fn load(path: &Path) -> Result<AppSettings, SettingsError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Load from an explicit path or the platform default, falling back to
/// defaults when nothing is readable.
pub fn load_or_default(explicit: Option<&Path>) -> AppSettings {
    let path = explicit.map(Path::to_path_buf).or_else(default_path);
    match path {
        Some(p) => load(&p).unwrap_or_default(),
        None => AppSettings::default(),
    }
}

pub fn save(settings: &AppSettings, path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(settings)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let settings = AppSettings {
            version: SETTINGS_VERSION,
            script_dir: Some(PathBuf::from("/tmp/scripts")),
            json_output: true,
        };
        let text = serde_json::to_string(&settings).unwrap();
        let back: AppSettings = serde_json::from_str(&text).unwrap();
        assert_eq!(back.script_dir, settings.script_dir);
        assert!(back.json_output);
    }

    #[test]
    fn missing_fields_default() {
        let back: AppSettings = serde_json::from_str("{\"version\": 1}").unwrap();
        assert_eq!(back.script_dir, None);
        assert!(!back.json_output);
    }
}
