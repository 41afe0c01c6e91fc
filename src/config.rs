//! Configuration management for framegrab
//!
//! Settings live in a TOML file. A host process that loads the shared library
//! cannot pass settings through the foreign interface, so the file location can
//! also be supplied through the `FRAMEGRAB_CONFIG` environment variable.

use crate::errors::RecordingError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "FRAMEGRAB_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramegrabConfig {
    pub capture: CaptureSettings,
    pub recording: RecordingSettings,
    pub logging: LoggingSettings,
}

/// Capture engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Capture size [width, height] for recordings; the primary display size when unset
    pub region: Option<[u32; 2]>,
}

/// What the capture loop does with a frame whose grab failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the frame; the output has a gap
    #[default]
    Skip,
    /// Re-emit the last good frame to hold the output frame rate
    RepeatLast,
}

/// Where captured frames go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Raw BGRA frames appended to the output file
    #[default]
    Raw,
    /// Frames are discarded
    Null,
}

/// Recording controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Frame rate used by the CLI when none is given
    pub default_fps: u32,
    /// How often a paused loop re-checks its flags, in milliseconds
    pub pause_poll_interval_ms: u64,
    pub failure_policy: FailurePolicy,
    pub sink: SinkKind,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            default_fps: 30,
            pause_poll_interval_ms: 10,
            failure_policy: FailurePolicy::Skip,
            sink: SinkKind::Raw,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "framegrab=info".to_string(),
        }
    }
}

impl FramegrabConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecordingError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RecordingError::IoError(format!("Failed to read config file: {}", e))
        })?;

        let config: FramegrabConfig = toml::from_str(&contents).map_err(|e| {
            RecordingError::InvalidConfiguration(format!("Failed to parse config file: {}", e))
        })?;

        config.validate().map_err(RecordingError::InvalidConfiguration)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecordingError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RecordingError::IoError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            RecordingError::InvalidConfiguration(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            RecordingError::IoError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// `$FRAMEGRAB_CONFIG` if set, otherwise `framegrab.toml`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("framegrab.toml"))
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if let Some([width, height]) = self.capture.region {
            if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
                return Err(format!("Invalid capture region {}x{}", width, height));
            }
        }

        if self.recording.default_fps == 0 {
            return Err("Default FPS must be positive".to_string());
        }
        if self.recording.pause_poll_interval_ms == 0 || self.recording.pause_poll_interval_ms > 1000 {
            return Err("Pause poll interval must be between 1 and 1000 ms".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FramegrabConfig::default();
        assert_eq!(config.capture.region, None);
        assert_eq!(config.recording.default_fps, 30);
        assert_eq!(config.recording.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.recording.sink, SinkKind::Raw);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_region = FramegrabConfig::default();
        bad_region.capture.region = Some([0, 1080]);
        assert!(bad_region.validate().is_err());

        let mut bad_fps = FramegrabConfig::default();
        bad_fps.recording.default_fps = 0;
        assert!(bad_fps.validate().is_err());

        let mut bad_poll = FramegrabConfig::default();
        bad_poll.recording.pause_poll_interval_ms = 0;
        assert!(bad_poll.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("framegrab.toml");

        let mut config = FramegrabConfig::default();
        config.capture.region = Some([640, 480]);
        config.recording.failure_policy = FailurePolicy::RepeatLast;
        config.save_to_file(&config_path).unwrap();

        let loaded = FramegrabConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_format() {
        let config = FramegrabConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("pause_poll_interval_ms"));
        assert!(toml_string.contains("failure_policy = \"skip\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: FramegrabConfig = toml::from_str(
            "[recording]\nfailure_policy = \"repeat_last\"\n",
        )
        .unwrap();
        assert_eq!(config.recording.failure_policy, FailurePolicy::RepeatLast);
        assert_eq!(config.recording.default_fps, 30);
        assert_eq!(config.logging.filter, "framegrab=info");
    }

    #[test]
    fn test_sink_settings_written_out() {
        let text = toml::to_string(&FramegrabConfig::default()).unwrap();
        assert!(text.contains("sink = \"raw\""));
        assert!(!text.contains("capacity"));

        // files from older releases may still carry a queue depth
        let config: FramegrabConfig =
            toml::from_str("[recording]\nsink = \"null\"\nchannel_capacity = 8\n").unwrap();
        assert_eq!(config.recording.sink, SinkKind::Null);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[recording]\ndefault_fps = 0\n").unwrap();
        assert!(matches!(
            FramegrabConfig::load_from_file(&path),
            Err(RecordingError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = FramegrabConfig::load_from_file("nonexistent_framegrab.toml");
        assert_eq!(result.unwrap().recording.default_fps, 30);
    }
}
