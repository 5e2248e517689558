//! GStreamer-based JPEG capture

use super::platform::{self, PlatformInfo};
use super::{Camera, Frame, FrameBufferPool, InitError};
use crate::config::{CameraConfig, GrabMode};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use tracing::{debug, info, warn};

/// Live sensor pulled synchronously from an appsink
pub struct GstCamera {
    pipeline: gst::Pipeline,
    app_sink: gst_app::AppSink,
    pool: FrameBufferPool,
    timeout: gst::ClockTime,
}

impl GstCamera {
    pub fn open(config: &CameraConfig) -> Result<Self, InitError> {
        gst::init()?;

        let platform = platform::detect_platform();
        let pipeline_desc = build_pipeline_string(config, platform);
        debug!(pipeline = %pipeline_desc, "Creating GStreamer pipeline");

        let pipeline = gst::parse::launch(&pipeline_desc)?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| InitError::Pipeline("Not a pipeline".to_string()))?;

        let app_sink = pipeline
            .by_name("sink")
            .ok_or_else(|| InitError::Pipeline("No appsink found".to_string()))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| InitError::Pipeline("Not an appsink".to_string()))?;

        // The appsink queue is the driver's buffer pool
        app_sink.set_property("max-buffers", config.fb_count as u32);
        app_sink.set_property("drop", config.grab_mode == GrabMode::Latest);
        app_sink.set_property("emit-signals", false);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| InitError::Pipeline(format!("{:?}", e)))?;

        info!(?platform, "GStreamer capture started");

        Ok(Self {
            pipeline,
            app_sink,
            pool: FrameBufferPool::new(config.fb_count),
            timeout: gst::ClockTime::from_mseconds(config.capture_timeout_ms),
        })
    }
}

/// Maps sensor quality (10-63, lower = better) onto jpegenc (1-100, higher = better)
fn encoder_quality(jpeg_quality: u8) -> u32 {
    let q = jpeg_quality.min(63) as u32;
    (100 - q * 100 / 63).clamp(1, 100)
}

fn build_pipeline_string(config: &CameraConfig, platform: PlatformInfo) -> String {
    let (width, height) = config.frame_size.dimensions();
    let device = config
        .device
        .as_deref()
        .unwrap_or_else(|| platform::default_device(platform));

    format!(
        "{} ! video/x-raw,width={},height={} ! queue max-size-buffers={} leaky=downstream ! videoconvert ! jpegenc quality={} ! appsink name=sink",
        platform::source_element(platform, device),
        width,
        height,
        config.fb_count,
        encoder_quality(config.jpeg_quality)
    )
}

impl Camera for GstCamera {
    fn capture_frame(&mut self) -> Option<Frame> {
        let Some(sample) = self.app_sink.try_pull_sample(self.timeout) else {
            if self.app_sink.is_eos() {
                warn!("GStreamer capture reached end of stream");
            }
            return None;
        };

        let buffer = sample.buffer()?;
        let map = buffer.map_readable().ok()?;
        self.pool.fill(|buf| {
            buf.extend_from_slice(map.as_slice());
            true
        })
    }

    fn release_frame(&mut self, frame: Frame) {
        self.pool.release(frame);
    }
}

impl Drop for GstCamera {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_quality_mapping() {
        assert_eq!(encoder_quality(10), 85);
        assert_eq!(encoder_quality(12), 81);
        assert_eq!(encoder_quality(63), 1);
    }

    #[test]
    fn test_pipeline_string() {
        let config = CameraConfig {
            device: Some("/dev/video2".to_string()),
            ..Default::default()
        };

        let desc = build_pipeline_string(&config, PlatformInfo::Linux);
        assert!(desc.starts_with("v4l2src device=/dev/video2"));
        assert!(desc.contains("width=320,height=240"));
        assert!(desc.contains("jpegenc quality=81"));
        assert!(desc.ends_with("appsink name=sink"));
    }
}
