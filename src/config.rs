//! Configuration management for the camera streamer and collector

use crate::transport::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration, loaded once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub collector: CollectorConfig,
}

/// Collector endpoint and connection timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Collector host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Collector TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout for a single connect attempt (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for a blocking write (milliseconds)
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Fixed pause after a failed connect attempt (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl NetworkConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Capture loop pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Minimum interval between the starts of two cycles (milliseconds)
    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,

    /// Log statistics every N sent frames (0 disables)
    #[serde(default = "default_stats_interval_frames")]
    pub stats_interval_frames: u64,
}

impl StreamConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pacing_interval_ms: default_pacing_interval_ms(),
            stats_interval_frames: default_stats_interval_frames(),
        }
    }
}

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraSource {
    /// Synthesized JPEG-shaped frames
    TestPattern,

    /// JPEG files replayed from a directory
    Directory,

    /// Live sensor through GStreamer (requires the `gstreamer` feature)
    Gstreamer,
}

/// Sensor output resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSize {
    Qqvga,
    Qvga,
    Cif,
    Vga,
    Svga,
    Xga,
    Sxga,
    Uxga,
}

impl FrameSize {
    /// Returns `(width, height)` in pixels
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }
}

/// How the driver fills its buffers while the loop is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrabMode {
    /// Overwrite stale buffers so capture returns the newest frame
    Latest,

    /// Only fill buffers that are free
    WhenEmpty,
}

/// Sensor wiring; a negative pin number means "not connected"
///
/// The defaults are the AI Thinker ESP32-CAM mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConfig {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sccb_sda: i32,
    pub sccb_scl: i32,
    /// D0..D7
    pub data: [i32; 8],
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
    pub flash_led: i32,
}

impl PinConfig {
    /// Pins that must be wired for the sensor to work
    fn required(&self) -> Vec<(&'static str, i32)> {
        let mut pins = vec![
            ("xclk", self.xclk),
            ("sccb_sda", self.sccb_sda),
            ("sccb_scl", self.sccb_scl),
            ("vsync", self.vsync),
            ("href", self.href),
            ("pclk", self.pclk),
        ];
        const DATA_NAMES: [&str; 8] = ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7"];
        pins.extend(DATA_NAMES.iter().copied().zip(self.data.iter().copied()));
        pins
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = self.required();

        if let Some((name, _)) = required.iter().find(|(_, pin)| *pin < 0) {
            return Err(ConfigError::Invalid(format!(
                "camera.pins.{} must be connected",
                name
            )));
        }

        let mut assigned: Vec<(&str, i32)> = required;
        assigned.extend(
            [
                ("pwdn", self.pwdn),
                ("reset", self.reset),
                ("flash_led", self.flash_led),
            ]
            .into_iter()
            .filter(|(_, pin)| *pin >= 0),
        );

        for (i, (name, pin)) in assigned.iter().enumerate() {
            if let Some((other, _)) = assigned[i + 1..].iter().find(|(_, p)| p == pin) {
                return Err(ConfigError::Invalid(format!(
                    "camera.pins.{} and camera.pins.{} both use GPIO {}",
                    name, other, pin
                )));
            }
        }

        Ok(())
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            pwdn: 32,
            reset: -1,
            xclk: 0,
            sccb_sda: 26,
            sccb_scl: 27,
            data: [5, 18, 19, 21, 36, 39, 34, 35],
            vsync: 25,
            href: 23,
            pclk: 22,
            flash_led: 4,
        }
    }
}

/// Camera driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_source")]
    pub source: CameraSource,

    #[serde(default = "default_frame_size")]
    pub frame_size: FrameSize,

    /// JPEG quality, 10-63 (lower = better)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Number of frame buffers in the driver pool
    #[serde(default = "default_fb_count")]
    pub fb_count: usize,

    #[serde(default = "default_grab_mode")]
    pub grab_mode: GrabMode,

    /// Sensor master clock (Hz)
    #[serde(default = "default_xclk_freq_hz")]
    pub xclk_freq_hz: u32,

    /// Capture device for the GStreamer source
    /// - macOS: "0" for first webcam
    /// - Raspberry Pi: libcamera camera name
    /// - Linux: "/dev/video0"
    #[serde(default)]
    pub device: Option<String>,

    /// Image directory for the directory source
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// How long a capture may wait for the driver (milliseconds)
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    #[serde(default)]
    pub pins: PinConfig,
}

impl CameraConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            frame_size: default_frame_size(),
            jpeg_quality: default_jpeg_quality(),
            fb_count: default_fb_count(),
            grab_mode: default_grab_mode(),
            xclk_freq_hz: default_xclk_freq_hz(),
            device: None,
            directory: None,
            capture_timeout_ms: default_capture_timeout_ms(),
            pins: PinConfig::default(),
        }
    }
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Records declaring more than this many bytes drop the client
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "192.168.0.102".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_write_timeout_ms() -> u64 {
    5000
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_pacing_interval_ms() -> u64 {
    100
}
fn default_stats_interval_frames() -> u64 {
    100
}
fn default_source() -> CameraSource {
    CameraSource::TestPattern
}
fn default_frame_size() -> FrameSize {
    FrameSize::Qvga
}
fn default_jpeg_quality() -> u8 {
    12
}
fn default_fb_count() -> usize {
    2
}
fn default_grab_mode() -> GrabMode {
    GrabMode::Latest
}
fn default_xclk_freq_hz() -> u32 {
    20_000_000
}
fn default_capture_timeout_ms() -> u64 {
    1000
}
fn default_listen_address() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_max_frame_bytes() -> usize {
    4 * 1024 * 1024
}

impl Config {
    /// Loads configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let net = &self.network;
        if net.host.trim().is_empty() {
            return Err(ConfigError::Invalid("network.host must not be empty".into()));
        }
        if net.port == 0 {
            return Err(ConfigError::Invalid("network.port must be > 0".into()));
        }
        if net.connect_timeout_ms == 0 || net.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "network timeouts must be > 0".into(),
            ));
        }
        if net.retry_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "network.retry_delay_ms must be > 0".into(),
            ));
        }

        let cam = &self.camera;
        if !(10..=63).contains(&cam.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "camera.jpeg_quality must be between 10 and 63, got {}",
                cam.jpeg_quality
            )));
        }
        if cam.fb_count == 0 || cam.fb_count > 4 {
            return Err(ConfigError::Invalid(format!(
                "camera.fb_count must be between 1 and 4, got {}",
                cam.fb_count
            )));
        }
        if cam.xclk_freq_hz == 0 {
            return Err(ConfigError::Invalid("camera.xclk_freq_hz must be > 0".into()));
        }
        if cam.source == CameraSource::Directory && cam.directory.is_none() {
            return Err(ConfigError::Invalid(
                "camera.directory is required for the directory source".into(),
            ));
        }
        cam.pins.validate()?;

        if self.collector.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid(
                "collector.max_frame_bytes must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Saves configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
