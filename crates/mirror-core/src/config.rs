//! Configuration surfaces. These are deliberately two separate things:
//!
//! - [`HostConfig`]/[`ViewerConfig`] — session configuration, populated once
//!   from CLI flags/env at launch and never persisted.
//! - [`Settings`] — the opaque persisted key/value store, loaded from and
//!   saved to a JSON file under the platform config directory.
//!
//! Mixing the two was flagged as a footgun during design: session
//! configuration governs one run's wire behavior and must never silently
//! diverge from what the CLI asked for, while persisted settings are meant to
//! survive across runs for things the desktop-I/O or presentation
//! collaborators want to remember (out of scope here, but the store is).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub monitor_id: u32,
    pub tile_size: u16,
    pub fallback_threshold: f32,
    pub capture_interval: Duration,
    pub jpeg_quality: u8,
    pub webp_quality: u8,
    pub bind_host: String,
    pub bind_port: u16,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub host: String,
    pub port: u16,
    pub initial_reconnect_delay: Duration,
    pub default_width: u32,
    pub default_height: u32,
    pub tile_size: u16,
}

/// Opaque persisted key/value store. Load/save failures are non-fatal: a
/// missing or unreadable file just means defaults, per the error handling
/// design's IOError-on-settings rule.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Settings(HashMap<String, String>);

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "mirror", "mirror")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "settings file is malformed, using defaults");
                    Settings::default()
                }
            },
            Err(e) => {
                debug!(error = %e, path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.0)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let path = Path::new("/nonexistent/definitely/not/here/settings.json");
        let settings = Settings::load(path);
        assert_eq!(settings.get("anything"), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("mirror-settings-test-{}", std::process::id()));
        let path = dir.join("settings.json");
        let mut settings = Settings::default();
        settings.set("last_host", "example.com");
        settings.save(&path).expect("save should succeed");

        let loaded = Settings::load(&path);
        assert_eq!(loaded.get("last_host"), Some("example.com"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_falls_back_to_default() {
        let dir = std::env::temp_dir().join(format!("mirror-settings-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, b"not valid json").unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.get("anything"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
