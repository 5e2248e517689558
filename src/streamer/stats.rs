//! Streaming statistics

use serde::{Deserialize, Serialize};

/// Counters kept by the capture-and-stream loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerStats {
    /// Cycles started
    pub cycles: u64,

    /// Frames written completely
    pub frames_sent: u64,

    /// Cycles that found no frame ready
    pub frames_skipped: u64,

    /// Frames the transport did not fully accept
    pub send_mismatches: u64,

    /// Connect calls made
    pub connect_attempts: u64,

    /// Connect calls that failed
    pub connect_failures: u64,

    /// Bytes written, length prefixes included
    pub bytes_sent: u64,
}

impl StreamerStats {
    /// Calculates frame rate based on delta
    pub fn calculate_fps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let frames_delta = self.frames_sent.saturating_sub(previous.frames_sent);
        frames_delta as f64 / elapsed_secs
    }

    /// Calculates bitrate in kbps based on delta
    pub fn calculate_bitrate_kbps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let bytes_delta = self.bytes_sent.saturating_sub(previous.bytes_sent);
        (bytes_delta as f64 * 8.0) / elapsed_secs / 1000.0
    }
}
