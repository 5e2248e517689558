//! Capture-and-stream loop
//!
//! Every cycle runs, strictly in order: connection check, capture, length
//! prefix, payload, release, pacing. One frame is in flight at a time and the
//! frame is always handed back to the camera before the cycle ends.

mod stats;

pub use stats::StreamerStats;

use crate::camera::{Camera, Frame};
use crate::config::Config;
use crate::connection::{ConnectOutcome, ConnectionManager};
use crate::protocol::{self, LENGTH_PREFIX_SIZE};
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Time source and sleep, injected so the loop runs without real delays in tests
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Loop timing
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Minimum time between the starts of two cycles
    pub pacing_interval: Duration,

    /// Fixed pause after a failed connect
    pub retry_delay: Duration,

    /// Log statistics every N sent frames (0 disables)
    pub stats_interval_frames: u64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for StreamerConfig {
    fn from(config: &Config) -> Self {
        Self {
            pacing_interval: config.stream.pacing_interval(),
            retry_delay: config.network.retry_delay(),
            stats_interval_frames: config.stream.stats_interval_frames,
        }
    }
}

/// What a single cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Record written in full (`bytes` includes the prefix)
    Sent { bytes: usize },

    /// Camera had no frame; nothing touched the network
    NoFrame,

    /// Connect attempt failed; the camera was not touched
    ConnectFailed,

    /// Transport accepted fewer payload bytes than declared; connection closed
    SendMismatch { declared: usize, accepted: usize },

    /// Frame too large for a 32-bit length prefix; nothing written
    FrameTooLarge { len: usize },
}

/// Frame borrowed from the camera for one cycle
///
/// Releases the frame when dropped, so every exit path gives the buffer back.
struct FrameLease<'a, C: Camera + ?Sized> {
    camera: &'a mut C,
    frame: Option<Frame>,
}

impl<'a, C: Camera + ?Sized> FrameLease<'a, C> {
    fn capture(camera: &'a mut C) -> Option<Self> {
        let frame = camera.capture_frame()?;
        Some(Self {
            camera,
            frame: Some(frame),
        })
    }

    fn data(&self) -> &[u8] {
        self.frame.as_ref().map(Frame::data).unwrap_or_default()
    }
}

impl<C: Camera + ?Sized> Drop for FrameLease<'_, C> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.camera.release_frame(frame);
        }
    }
}

/// Writes one record: length prefix, then payload
///
/// Any short write closes the connection so the next cycle reconnects.
fn send_record<T: Transport>(connection: &mut ConnectionManager<T>, payload: &[u8]) -> CycleOutcome {
    let declared = payload.len();

    let prefix = match protocol::encode_length_prefix(declared) {
        Ok(prefix) => prefix,
        Err(e) => {
            error!(error = %e, "Frame cannot be framed");
            return CycleOutcome::FrameTooLarge { len: declared };
        }
    };

    let prefix_written = connection.write(&prefix);
    if prefix_written != LENGTH_PREFIX_SIZE {
        error!(written = prefix_written, "Send failed: length prefix not accepted");
        connection.disconnect();
        return CycleOutcome::SendMismatch {
            declared,
            accepted: 0,
        };
    }

    let accepted = connection.write(payload);
    if accepted != declared {
        error!(declared, accepted, "Send failed");
        connection.disconnect();
        return CycleOutcome::SendMismatch { declared, accepted };
    }

    CycleOutcome::Sent {
        bytes: LENGTH_PREFIX_SIZE + declared,
    }
}

/// Drives the camera and the connection, one frame per cycle
pub struct FrameStreamer<T: Transport, C: Camera, K: Clock> {
    connection: ConnectionManager<T>,
    camera: C,
    clock: K,
    config: StreamerConfig,
    stats: StreamerStats,
    last_report: (Instant, StreamerStats),
}

impl<T: Transport, C: Camera, K: Clock> FrameStreamer<T, C, K> {
    pub fn new(connection: ConnectionManager<T>, camera: C, clock: K, config: StreamerConfig) -> Self {
        let last_report = (clock.now(), StreamerStats::default());

        Self {
            connection,
            camera,
            clock,
            config,
            stats: StreamerStats::default(),
            last_report,
        }
    }

    /// Runs cycles until the process is terminated
    pub fn run(&mut self) -> ! {
        info!(
            endpoint = %self.connection.endpoint(),
            pacing_ms = self.config.pacing_interval.as_millis() as u64,
            retry_ms = self.config.retry_delay.as_millis() as u64,
            "Frame streamer started"
        );

        loop {
            self.run_cycle();
        }
    }

    /// Runs one complete cycle, including the trailing pause
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let started = self.clock.now();
        self.stats.cycles += 1;

        let outcome = self.stream_one();
        self.stats.connect_attempts = self.connection.connect_attempts();

        match outcome {
            CycleOutcome::ConnectFailed => self.clock.sleep(self.config.retry_delay),
            _ => self.pace(started),
        }

        outcome
    }

    fn stream_one(&mut self) -> CycleOutcome {
        if let ConnectOutcome::Failed(_) = self.connection.ensure_connected() {
            self.stats.connect_failures += 1;
            return CycleOutcome::ConnectFailed;
        }

        let Some(frame) = FrameLease::capture(&mut self.camera) else {
            debug!("No frame available");
            self.stats.frames_skipped += 1;
            return CycleOutcome::NoFrame;
        };

        let outcome = send_record(&mut self.connection, frame.data());
        drop(frame);

        match outcome {
            CycleOutcome::Sent { bytes } => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += bytes as u64;
                self.maybe_report();
            }
            CycleOutcome::SendMismatch { .. } => self.stats.send_mismatches += 1,
            _ => {}
        }

        outcome
    }

    fn pace(&self, started: Instant) {
        let elapsed = self.clock.now().saturating_duration_since(started);
        if let Some(remaining) = self.config.pacing_interval.checked_sub(elapsed) {
            if !remaining.is_zero() {
                self.clock.sleep(remaining);
            }
        }
    }

    fn maybe_report(&mut self) {
        let every = self.config.stats_interval_frames;
        if every == 0 || self.stats.frames_sent % every != 0 {
            return;
        }

        let now = self.clock.now();
        let (since, previous) = &self.last_report;
        let secs = now.saturating_duration_since(*since).as_secs_f64();

        info!(
            sent = self.stats.frames_sent,
            skipped = self.stats.frames_skipped,
            mismatches = self.stats.send_mismatches,
            connect_failures = self.stats.connect_failures,
            fps = %format!("{:.1}", self.stats.calculate_fps(previous, secs)),
            kbps = %format!("{:.0}", self.stats.calculate_bitrate_kbps(previous, secs)),
            "Stats"
        );

        self.last_report = (now, self.stats.clone());
    }

    pub fn stats(&self) -> &StreamerStats {
        &self.stats
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}
