// SPDX-License-Identifier: GPL-3.0-only

//! Session configuration
//!
//! Operational settings for the capture session, persisted as JSON under the
//! user config directory. Missing or unreadable config falls back to
//! defaults; saving is best-effort.

use crate::backend::CameraPosition;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Default maximum recording length in seconds
const DEFAULT_MAX_RECORDING_SECS: u64 = 600;

/// Folder name under the user's Pictures/Videos directories
const DEFAULT_SAVE_FOLDER: &str = "CaptureSession";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Camera position selected at initialization
    pub default_position: CameraPosition,
    /// Upper bound after which an unterminated recording self-terminates
    pub max_recording_secs: u64,
    /// Directory for recorded videos (None = ~/Videos/CaptureSession)
    pub video_dir: Option<PathBuf>,
    /// Directory for saved photos (None = ~/Pictures/CaptureSession)
    pub photo_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_position: CameraPosition::default(),
            max_recording_secs: DEFAULT_MAX_RECORDING_SECS,
            video_dir: None,
            photo_dir: None,
        }
    }
}

impl SessionConfig {
    /// Maximum recording duration
    pub fn max_recording(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_recording_secs.max(1))
    }

    /// Directory where recordings land
    pub fn video_dir(&self) -> PathBuf {
        self.video_dir.clone().unwrap_or_else(|| {
            dirs::video_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(DEFAULT_SAVE_FOLDER)
        })
    }

    /// Directory where photos land
    pub fn photo_dir(&self) -> PathBuf {
        self.photo_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(DEFAULT_SAVE_FOLDER)
        })
    }

    /// Timestamped output path for the next recording
    pub fn video_output_path(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        self.video_dir().join(format!("video_{}.gif", timestamp))
    }

    /// Timestamped output path for the next saved photo
    pub fn photo_output_path(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        self.photo_dir().join(format!("photo_{}.png", timestamp))
    }

    /// Config file location (~/.config/capture-session/config.json)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("capture-session").join("config.json"))
    }

    /// Load the config file, falling back to defaults on any failure
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded session config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist the config as pretty-printed JSON
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        info!(path = %path.display(), "Saved session config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.default_position, CameraPosition::Back);
        assert_eq!(config.max_recording().as_secs(), DEFAULT_MAX_RECORDING_SECS);
    }

    #[test]
    fn test_max_recording_never_zero() {
        let config = SessionConfig {
            max_recording_secs: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.max_recording().as_secs(), 1);
    }

    #[test]
    fn test_roundtrip_json() {
        let config = SessionConfig {
            default_position: CameraPosition::Front,
            max_recording_secs: 30,
            video_dir: Some(PathBuf::from("/tmp/videos")),
            photo_dir: None,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, SessionConfig::default());
    }
}
