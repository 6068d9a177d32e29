use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::serial::FRAME_SIZE;

/// Tunables for a `ConnectionSession`.
///
/// Line parameters are fixed (9600-8-N-1) and are not part of the settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize, // bytes, at least one frame
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64, // bounds how long disconnect waits for the reader
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize, // bytes per transport read
}

fn default_buffer_capacity() -> usize {
    1024
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_read_chunk_size() -> usize {
    256
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            read_timeout_ms: default_read_timeout_ms(),
            read_chunk_size: default_read_chunk_size(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write settings {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

impl SessionSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.buffer_capacity < FRAME_SIZE {
            return Err(SettingsError::Invalid {
                field: "buffer_capacity",
                reason: format!("must be at least {} bytes", FRAME_SIZE),
            });
        }
        if self.read_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "read_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.read_chunk_size == 0 {
            return Err(SettingsError::Invalid {
                field: "read_chunk_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// `<config_dir>/scalelink/settings.json`
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    dirs::config_dir()
        .map(|dir| dir.join("scalelink").join("settings.json"))
        .ok_or(SettingsError::NoConfigDir)
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<SessionSettings, SettingsError> {
    if !path.exists() {
        return Ok(SessionSettings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let settings: SessionSettings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &SessionSettings) -> Result<(), SettingsError> {
    settings.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
