//! Synthesized JPEG-shaped frames
//!
//! Frames carry real SOI/SOF0/SOS/EOI markers with the configured
//! dimensions, so a receiver's marker checks pass, but the scan data is a
//! byte pattern and does not decode to a picture.

use super::{Camera, Frame, FrameBufferPool};
use crate::config::CameraConfig;
use crate::jpeg::markers;

/// Camera that fabricates frames without hardware
pub struct TestPatternCamera {
    pool: FrameBufferPool,
    width: u16,
    height: u16,
    scan_len: usize,
    frames: u64,
}

impl TestPatternCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let (width, height) = config.frame_size.dimensions();

        Self {
            pool: FrameBufferPool::new(config.fb_count),
            width: width as u16,
            height: height as u16,
            scan_len: scan_len(width, height, config.jpeg_quality),
            frames: 0,
        }
    }

    /// Free buffers in the pool
    pub fn available_buffers(&self) -> usize {
        self.pool.available()
    }
}

/// Rough compressed size: lower quality numbers mean larger frames
fn scan_len(width: u32, height: u32, quality: u8) -> usize {
    let pixels = (width as usize) * (height as usize);
    let keep = 64usize.saturating_sub(quality.min(63) as usize);
    (pixels / 8 * keep / 64).max(16)
}

fn write_frame(buf: &mut Vec<u8>, width: u16, height: u16, scan_len: usize, counter: u64) {
    buf.reserve(scan_len + 48);

    buf.extend_from_slice(&[0xFF, markers::SOI]);

    // Comment segment carrying the frame counter
    buf.extend_from_slice(&[0xFF, markers::COM, 0x00, 0x0A]);
    buf.extend_from_slice(&counter.to_be_bytes());

    // Baseline frame header: one 8-bit grayscale component
    buf.extend_from_slice(&[0xFF, markers::SOF0, 0x00, 0x0B, 0x08]);
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(&width.to_be_bytes());
    buf.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);

    buf.extend_from_slice(&[0xFF, markers::SOS, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);

    // Values stay below 0xFF so no marker appears inside the scan
    let shift = counter as usize;
    buf.extend((0..scan_len).map(|i| ((i + shift) % 251) as u8));

    buf.extend_from_slice(&[0xFF, markers::EOI]);
}

impl Camera for TestPatternCamera {
    fn capture_frame(&mut self) -> Option<Frame> {
        let (width, height, scan_len, counter) = (self.width, self.height, self.scan_len, self.frames);
        let frame = self.pool.fill(|buf| {
            write_frame(buf, width, height, scan_len, counter);
            true
        })?;

        self.frames += 1;
        Some(frame)
    }

    fn release_frame(&mut self, frame: Frame) {
        self.pool.release(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameSize;
    use crate::jpeg;

    #[test]
    fn test_frames_look_like_jpeg() {
        let config = CameraConfig::default();
        let mut camera = TestPatternCamera::new(&config);

        let frame = camera.capture_frame().unwrap();
        assert!(jpeg::validate_jpeg(frame.data()).is_ok());
        assert_eq!(jpeg::dimensions(frame.data()), Some((320, 240)));
        camera.release_frame(frame);
    }

    #[test]
    fn test_consecutive_frames_differ() {
        let mut camera = TestPatternCamera::new(&CameraConfig::default());

        let first = camera.capture_frame().unwrap();
        let first_data = first.data().to_vec();
        camera.release_frame(first);

        let second = camera.capture_frame().unwrap();
        assert_eq!(first_data.len(), second.len());
        assert_ne!(first_data, second.data());
    }

    #[test]
    fn test_quality_scales_size() {
        let fine = CameraConfig {
            jpeg_quality: 10,
            frame_size: FrameSize::Vga,
            ..Default::default()
        };
        let coarse = CameraConfig {
            jpeg_quality: 60,
            ..fine.clone()
        };

        let mut fine = TestPatternCamera::new(&fine);
        let mut coarse = TestPatternCamera::new(&coarse);
        let a = fine.capture_frame().unwrap();
        let b = coarse.capture_frame().unwrap();
        assert!(a.len() > b.len());
    }

    #[test]
    fn test_stalls_without_release() {
        let mut camera = TestPatternCamera::new(&CameraConfig::default());

        let _a = camera.capture_frame().unwrap();
        let _b = camera.capture_frame().unwrap();
        assert_eq!(camera.available_buffers(), 0);
        assert!(camera.capture_frame().is_none());
    }
}
