use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// "mjpeg" or "directory".
    #[serde(default = "default_source_mode")]
    pub mode: String,
    /// MJPEG stream URL (mjpeg mode).
    #[serde(default)]
    pub url: Option<String>,
    /// Directory of still images (directory mode).
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// "replay" or "subprocess".
    #[serde(default = "default_detector_mode")]
    pub mode: String,
    /// JSON Lines detections file (replay mode).
    #[serde(default)]
    pub path: Option<String>,
    /// Sidecar executable (subprocess mode).
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Landmarks are reported in 0..1 and must be scaled by frame size.
    #[serde(default = "default_normalized")]
    pub normalized: bool,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
    /// Pixels added around the hand's bounding box when cropping.
    #[serde(default = "default_margin")]
    pub margin: i32,
    /// Side of the square target region centered on the frame.
    #[serde(default = "default_region_side")]
    pub region_side: u32,
    /// Explicit region; overrides `region_side` when set.
    #[serde(default)]
    pub region: Option<RegionConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegionConfig {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// "prompt", "keep" or "discard".
    #[serde(default = "default_decision")]
    pub decision: String,
    /// Stop after this many kept captures.
    #[serde(default)]
    pub max_captures: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            margin: default_margin(),
            region_side: default_region_side(),
            region: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            prefix: default_storage_prefix(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decision: default_decision(),
            max_captures: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_source_mode() -> String {
    "mjpeg".into()
}
fn default_fps() -> f64 {
    10.0
}
fn default_channel_capacity() -> usize {
    4
}
fn default_detector_mode() -> String {
    "subprocess".into()
}
fn default_normalized() -> bool {
    true
}
fn default_min_confidence() -> f32 {
    0.5
}
fn default_dwell_ms() -> u64 {
    3000
}
fn default_margin() -> i32 {
    30
}
fn default_region_side() -> u32 {
    500
}
fn default_storage_dir() -> String {
    "captures".into()
}
fn default_storage_prefix() -> String {
    "capture".into()
}
fn default_decision() -> String {
    "prompt".into()
}
fn default_log_level() -> String {
    "info".into()
}
