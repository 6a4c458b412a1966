//! Runtime configuration handling
//!
//! Configuration is loaded from `entrylink.{toml,yaml}` (cwd or XDG config),
//! then environment overrides are applied on top. The backend base URL is
//! deliberately permissive: an empty string is a valid (if useless) value and
//! degrades to error results at request time.

#[cfg(feature = "camera")]
use crate::camera::{CameraConfig, PixelFormat};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Camera capture configuration overrides
    pub camera: CameraOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
    /// Check-in backend configuration
    pub backend: BackendOptions,
}

impl EntryConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No entrylink.toml / entrylink.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["entrylink.toml", "entrylink.yaml", "entrylink.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("entrylink");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.camera.apply_env_overrides();
        self.logging.apply_env_overrides();
        self.backend.apply_env_overrides();
    }

    /// Produce a fully resolved camera configuration ready to open the V4L2 device.
    #[cfg(feature = "camera")]
    pub fn camera_config(&self) -> Result<CameraConfig> {
        self.camera.to_camera_config()
    }
}

/// User-friendly camera overrides that are merged on top of `CameraConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Override for the numeric camera index (e.g. `/dev/video2`).
    pub device_index: Option<usize>,
    /// Override for the camera name substring match.
    pub device_name: Option<String>,
    /// Override for desired frame width in pixels.
    pub width: Option<u32>,
    /// Override for desired frame height in pixels.
    pub height: Option<u32>,
    /// Override for desired frames per second.
    pub fps: Option<u32>,
    /// Override for pixel format string (mjpeg/yuyv/rgb24).
    pub format: Option<String>,
    /// Override for number of V4L2 buffers to allocate.
    pub buffer_count: Option<u32>,
}

impl CameraOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("ENTRYLINK_CAMERA_DEVICE") {
            self.device_name = Some(name);
            self.device_index = None;
        }
        if let Ok(index) = env::var("ENTRYLINK_CAMERA_INDEX") {
            if let Ok(parsed) = index.parse::<usize>() {
                self.device_index = Some(parsed);
                self.device_name = None;
            }
        }
        if let Ok(width) = env::var("ENTRYLINK_CAMERA_WIDTH") {
            self.width = width.parse::<u32>().ok();
        }
        if let Ok(height) = env::var("ENTRYLINK_CAMERA_HEIGHT") {
            self.height = height.parse::<u32>().ok();
        }
        if let Ok(fps) = env::var("ENTRYLINK_CAMERA_FPS") {
            self.fps = fps.parse::<u32>().ok();
        }
        if let Ok(format) = env::var("ENTRYLINK_CAMERA_FORMAT") {
            self.format = Some(format);
        }
        if let Ok(buffers) = env::var("ENTRYLINK_CAMERA_BUFFERS") {
            self.buffer_count = buffers.parse::<u32>().ok();
        }
    }

    /// Merge overrides onto the default camera configuration.
    #[cfg(feature = "camera")]
    pub fn to_camera_config(&self) -> Result<CameraConfig> {
        let mut config = CameraConfig::default();

        if let Some(name) = &self.device_name {
            config.device_name = Some(name.clone());
            config.device_index = None;
        }

        if let Some(index) = self.device_index {
            config.device_index = Some(index);
            if self.device_name.is_none() {
                config.device_name = None;
            }
        }

        if let Some(width) = self.width {
            config.width = width;
        }

        if let Some(height) = self.height {
            config.height = height;
        }

        if let Some(fps) = self.fps {
            config.fps = fps.max(1);
        }

        if let Some(format) = &self.format {
            config.format = PixelFormat::from_str(format).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown pixel format '{}'. Use mjpeg, yuyv, or rgb24",
                    format
                ))
            })?;
        }

        if let Some(buffers) = self.buffer_count {
            config.buffer_count = buffers.max(2);
        }

        Ok(config)
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `ENTRYLINK_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
    pub color: bool,
    /// Enable periodic metrics summaries over tracing
    pub metrics: bool,
    /// Interval in seconds for emitting aggregated metrics when enabled
    pub metrics_interval_secs: u64,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
    /// Optional bind address for exposing runtime metrics over HTTP (e.g., "127.0.0.1:9900")
    pub metrics_endpoint: Option<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            metrics: false,
            metrics_interval_secs: 60,
            rotation: None,
            metrics_endpoint: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("ENTRYLINK_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("ENTRYLINK_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("ENTRYLINK_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(metrics) = env::var("ENTRYLINK_LOG_METRICS") {
            match metrics.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => self.metrics = true,
                "0" | "false" | "off" => self.metrics = false,
                _ => {}
            }
        }
        if let Ok(interval) = env::var("ENTRYLINK_LOG_METRICS_INTERVAL") {
            if let Ok(value) = interval.parse::<u64>() {
                self.metrics_interval_secs = value.max(5);
            }
        }
        if let Ok(rotation) = env::var("ENTRYLINK_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::from_str(&rotation) {
                self.rotation = Some(parsed);
            }
        }
        if let Ok(endpoint) = env::var("ENTRYLINK_METRICS_ENDPOINT") {
            self.metrics_endpoint = Some(endpoint);
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

/// Check-in backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Base URL of the check-in service. Empty means "not configured";
    /// requests against it degrade to error results instead of panicking.
    pub base_url: String,
}

impl BackendOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("ENTRYLINK_BACKEND_URL") {
            self.base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_empty_backend_url() {
        let config = EntryConfig::default();
        assert_eq!(config.backend.base_url, "");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn toml_round_trip() {
        let raw = r#"
            [backend]
            base_url = "https://example.test/exec"

            [camera]
            device_index = 2
            fps = 15

            [logging]
            level = "debug"
            metrics = true
        "#;

        let config: EntryConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.backend.base_url, "https://example.test/exec");
        assert_eq!(config.camera.device_index, Some(2));
        assert_eq!(config.camera.fps, Some(15));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.metrics);
    }

    #[test]
    fn yaml_parses_partial_config() {
        let raw = "backend:\n  base_url: https://example.test/exec\n";
        let config: EntryConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.backend.base_url, "https://example.test/exec");
        assert!(config.camera.device_index.is_none());
    }

    #[cfg(feature = "camera")]
    #[test]
    fn camera_overrides_merge_onto_defaults() {
        let options = CameraOptions {
            width: Some(640),
            height: Some(480),
            format: Some("yuyv".to_string()),
            ..Default::default()
        };

        let config = options.to_camera_config().unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.format, crate::camera::PixelFormat::Yuyv);
    }

    #[cfg(feature = "camera")]
    #[test]
    fn unknown_pixel_format_is_a_config_error() {
        let options = CameraOptions {
            format: Some("nv12".to_string()),
            ..Default::default()
        };
        assert!(options.to_camera_config().is_err());
    }
}
