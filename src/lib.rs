//! Capture-and-stream loop for memory-constrained JPEG cameras
//!
//! The device side runs a single blocking loop that, once per cycle:
//! - makes sure a TCP connection to the collector exists
//! - captures one JPEG frame from a fixed-size buffer pool
//! - writes it as a length-prefixed record
//! - releases the frame buffer back to the camera
//! - sleeps to bound the frame rate
//!
//! The collector side receives the records with a Tokio listener.
//!
//! # Wire format
//!
//! Every record is `[u32 little-endian length][length bytes of JPEG]`.
//!
//! # Example
//!
//! ```no_run
//! use camstream::camera;
//! use camstream::config::Config;
//! use camstream::connection::ConnectionManager;
//! use camstream::streamer::{FrameStreamer, StreamerConfig, SystemClock};
//! use camstream::transport::TcpTransport;
//!
//! let config = Config::default();
//! let camera = camera::initialize_or_unavailable(&config.camera);
//! let transport = TcpTransport::from_config(&config.network);
//! let connection = ConnectionManager::new(transport, config.network.endpoint());
//! let mut streamer = FrameStreamer::new(
//!     connection,
//!     camera,
//!     SystemClock,
//!     StreamerConfig::from(&config),
//! );
//! streamer.run();
//! ```

pub mod camera;
pub mod collector;
pub mod config;
pub mod connection;
pub mod jpeg;
pub mod protocol;
pub mod streamer;
pub mod transport;

// Re-exports for convenience
pub use camera::{Camera, Frame, FrameBufferPool, InitError};
pub use collector::{Collector, CollectorStats, ReceivedFrame};
pub use connection::{ConnectOutcome, ConnectionManager, ConnectionState};
pub use protocol::{encode_record, RecordDecoder, LENGTH_PREFIX_SIZE};
pub use streamer::{Clock, CycleOutcome, FrameStreamer, StreamerConfig, StreamerStats, SystemClock};
pub use transport::{ConnectError, Endpoint, TcpTransport, Transport};
