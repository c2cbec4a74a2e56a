//! Small JSON preference store persisted between runs
//! (`~/.google-image-gen/preferences.json`).
//!
//! No cross-process locking: concurrent invocations may overwrite each other.

use crate::models::Vendor;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub last_output_dir: Option<PathBuf>,
    pub last_json_dir: Option<PathBuf>,
    pub default_api: Option<Vendor>,
    /// Proxy that last completed a request; offered as the fallback route.
    pub proxy: Option<String>,
    pub api_key: Option<String>,
}

pub fn default_preferences_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".google-image-gen"))
        .unwrap_or_else(|| PathBuf::from(".google-image-gen"))
}

/// File-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    dir: PathBuf,
}

impl PreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn new_default() -> Self {
        Self::new(default_preferences_dir())
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(PREFERENCES_FILE)
    }

    /// Missing or unreadable preferences fall back to defaults.
    pub fn load(&self) -> Preferences {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt preferences at {}: {}", path.display(), e);
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                tracing::warn!("Could not read preferences at {}: {}", path.display(), e);
                Preferences::default()
            }
        }
    }

    pub fn save(&self, preferences: &Preferences) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(preferences)?;
        fs::write(self.path(), json)?;
        tracing::debug!("Saved preferences to {}", self.path().display());
        Ok(())
    }
}

impl Preferences {
    /// Records the directories and vendor of a completed run.
    pub fn remember_run(&mut self, vendor: Vendor, output_dir: &Path, json_dir: &Path) {
        self.default_api = Some(vendor);
        self.last_output_dir = Some(output_dir.to_path_buf());
        self.last_json_dir = Some(json_dir.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path().join("prefs"));
        assert_eq!(store.load(), Preferences::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path().join("prefs"));
        let mut prefs = Preferences::default();
        prefs.remember_run(Vendor::Gemini, Path::new("out"), Path::new("out/json"));
        prefs.proxy = Some("http://proxy.local:3128".to_string());

        store.save(&prefs).unwrap();

        assert_eq!(store.load(), prefs);
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"defaultApi\": \"gemini\""));
        assert!(text.contains("\"lastOutputDir\""));
    }

    #[test]
    fn test_corrupt_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), Preferences::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path());
        fs::write(store.path(), r#"{"defaultApi": "imagen"}"#).unwrap();
        let prefs = store.load();
        assert_eq!(prefs.default_api, Some(Vendor::Imagen));
        assert_eq!(prefs.last_output_dir, None);
    }
}
