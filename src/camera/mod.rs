//! Camera driver adapter
//!
//! A camera hands out [`Frame`]s from a fixed pool of buffers and takes them
//! back through [`Camera::release_frame`]. A frame that is never released
//! keeps its buffer, and once the pool is empty capture stalls.

mod directory;
#[cfg(feature = "gstreamer")]
mod gst;
mod pattern;
pub mod platform;
mod pool;

pub use directory::DirectoryCamera;
#[cfg(feature = "gstreamer")]
pub use gst::GstCamera;
pub use pattern::TestPatternCamera;
pub use platform::PlatformInfo;
pub use pool::{Frame, FrameBufferPool};

use crate::config::{CameraConfig, CameraSource};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum InitError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no JPEG images in {0}")]
    NoImages(PathBuf),

    #[error("camera.directory is not set")]
    MissingDirectory,

    #[error("camera source '{0}' requires the crate to be built with the matching feature")]
    SourceDisabled(&'static str),

    #[cfg(feature = "gstreamer")]
    #[error("GStreamer error: {0}")]
    Gst(#[from] ::gstreamer::glib::Error),

    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// Source of compressed frames
pub trait Camera {
    /// Returns the next frame, or `None` if none is ready
    fn capture_frame(&mut self) -> Option<Frame>;

    /// Gives a frame's buffer back to the driver
    fn release_frame(&mut self, frame: Frame);
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn capture_frame(&mut self) -> Option<Frame> {
        (**self).capture_frame()
    }

    fn release_frame(&mut self, frame: Frame) {
        (**self).release_frame(frame)
    }
}

/// Stand-in after a failed initialization: never produces a frame
#[derive(Debug, Default)]
pub struct UnavailableCamera;

impl Camera for UnavailableCamera {
    fn capture_frame(&mut self) -> Option<Frame> {
        None
    }

    fn release_frame(&mut self, _frame: Frame) {}
}

/// Initializes the configured camera source once
pub fn initialize(config: &CameraConfig) -> Result<Box<dyn Camera>, InitError> {
    let (width, height) = config.frame_size.dimensions();
    info!(
        source = ?config.source,
        resolution = %format!("{}x{}", width, height),
        quality = config.jpeg_quality,
        fb_count = config.fb_count,
        grab_mode = ?config.grab_mode,
        xclk_hz = config.xclk_freq_hz,
        "Initializing camera"
    );
    debug!(pins = ?config.pins, platform = ?platform::detect_platform(), "Camera wiring");

    match config.source {
        CameraSource::TestPattern => Ok(Box::new(TestPatternCamera::new(config))),
        CameraSource::Directory => {
            let dir = config
                .directory
                .as_deref()
                .ok_or(InitError::MissingDirectory)?;
            Ok(Box::new(DirectoryCamera::open(dir, config.fb_count)?))
        }
        #[cfg(feature = "gstreamer")]
        CameraSource::Gstreamer => Ok(Box::new(GstCamera::open(config)?)),
        #[cfg(not(feature = "gstreamer"))]
        CameraSource::Gstreamer => Err(InitError::SourceDisabled("gstreamer")),
    }
}

/// Like [`initialize`], but a failure is reported once and replaced by an
/// [`UnavailableCamera`] so the process keeps running
pub fn initialize_or_unavailable(config: &CameraConfig) -> Box<dyn Camera> {
    match initialize(config) {
        Ok(camera) => camera,
        Err(e) => {
            error!(error = %e, "Camera init failed; capture will report no frames");
            Box::new(UnavailableCamera)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_test_pattern() {
        let mut camera = initialize(&CameraConfig::default()).unwrap();
        let frame = camera.capture_frame().unwrap();
        assert!(!frame.is_empty());
        camera.release_frame(frame);
    }

    #[test]
    fn test_directory_source_without_path() {
        let config = CameraConfig {
            source: CameraSource::Directory,
            ..Default::default()
        };
        assert!(matches!(initialize(&config), Err(InitError::MissingDirectory)));
    }

    #[test]
    fn test_failed_init_yields_unavailable_camera() {
        let config = CameraConfig {
            source: CameraSource::Directory,
            directory: Some(PathBuf::from("/nonexistent/camstream")),
            ..Default::default()
        };

        let mut camera = initialize_or_unavailable(&config);
        for _ in 0..3 {
            assert!(camera.capture_frame().is_none());
        }
    }
}
