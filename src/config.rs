//! Configuration management for rawstreamer
//!
//! Provides loading, saving and validation of the camera core's runtime
//! options: default camera and frame rate, manual raw-capture parameters and
//! the background executor.

use crate::errors::CameraError;
use crate::request::RawSettings;
use crate::results::DEFAULT_IGNORED_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RawStreamerConfig {
    pub camera: CameraConfig,
    pub raw: RawConfig,
    pub executor: ExecutorConfig,
}

/// Camera selection and stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Logical id opened when the caller does not name one
    pub default_camera_id: String,
    /// Target frames per second
    pub target_fps: u32,
    /// Cycle physical sub-sensors of composite cameras on lens switch
    pub physical_switching: bool,
    /// Re-open once after a graceful disconnect
    pub auto_reopen_on_disconnect: bool,
}

/// Manual template values for raw capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Exposure time in nanoseconds
    pub exposure_time_ns: u64,
    /// Sensor sensitivity
    pub iso: u32,
    /// Focus distance in diopters
    pub focus_distance: f32,
    /// Raw reader buffer depth
    pub max_images: u32,
    /// Capture result keys never diffed
    pub ignored_result_prefixes: Vec<String>,
}

/// Background executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Name of the worker thread
    pub thread_name: String,
    /// How long deactivation waits for teardown and join, in milliseconds
    pub teardown_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_camera_id: "0".to_string(),
            target_fps: 30,
            physical_switching: true,
            auto_reopen_on_disconnect: false,
        }
    }
}

impl Default for RawConfig {
    fn default() -> Self {
        let settings = RawSettings::default();
        Self {
            exposure_time_ns: settings.exposure_time_ns,
            iso: settings.iso,
            focus_distance: settings.focus_distance,
            max_images: 50,
            ignored_result_prefixes: vec![DEFAULT_IGNORED_PREFIX.to_string()],
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: "rawstreamer-camera".to_string(),
            teardown_timeout_ms: 2000,
        }
    }
}

impl RawConfig {
    pub fn settings(&self) -> RawSettings {
        RawSettings {
            exposure_time_ns: self.exposure_time_ns,
            iso: self.iso,
            focus_distance: self.focus_distance,
        }
    }
}

impl ExecutorConfig {
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}

impl RawStreamerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: RawStreamerConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(CameraError::ConfigError)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("rawstreamer.toml")
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
        if self.camera.target_fps == 0 || self.camera.target_fps > 240 {
            return Err("Invalid target FPS (must be 1-240)".to_string());
        }

        if self.raw.iso == 0 {
            return Err("ISO must be positive".to_string());
        }
        if self.raw.exposure_time_ns == 0 {
            return Err("Exposure time must be positive".to_string());
        }
        if !self.raw.focus_distance.is_finite() || self.raw.focus_distance < 0.0 {
            return Err("Focus distance must be a non-negative number".to_string());
        }
        if self.raw.max_images == 0 || self.raw.max_images > 64 {
            return Err("Raw buffer depth must be between 1 and 64".to_string());
        }

        if self.executor.thread_name.trim().is_empty() {
            return Err("Executor thread name cannot be empty".to_string());
        }
        if self.executor.teardown_timeout_ms == 0 {
            return Err("Teardown timeout must be positive".to_string());
        }

        Ok(())
    }
}
