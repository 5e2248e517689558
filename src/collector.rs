//! Receiving end of the stream
//!
//! Listens for the camera's TCP connection and decodes the length-prefixed
//! records back into JPEG payloads. One camera is served at a time; when it
//! disconnects the collector waits for it to reconnect.

use crate::jpeg;
use crate::protocol::{ProtocolError, RecordDecoder};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Pause after a failed accept so a persistent error (EMFILE) does not spin
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// One decoded image
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    /// Position in the collector's overall receive order, starting at 0
    pub seq: u64,

    pub payload: Bytes,

    /// `(width, height)` from the JPEG frame header, when present
    pub dimensions: Option<(u16, u16)>,

    /// Payload starts with SOI and ends with EOI
    pub valid_jpeg: bool,
}

/// Statistics for the collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorStats {
    pub clients: u64,
    pub frames_received: u64,
    pub invalid_jpeg: u64,
    pub bytes_received: u64,
}

#[derive(Default)]
struct Counters {
    clients: AtomicU64,
    frames_received: AtomicU64,
    invalid_jpeg: AtomicU64,
    bytes_received: AtomicU64,
}

/// How a client session ended
enum SessionEnd {
    PeerClosed,
    ReceiverGone,
}

/// TCP collector for length-prefixed JPEG records
pub struct Collector {
    listener: TcpListener,
    max_frame_bytes: usize,
    counters: Arc<Counters>,
}

impl Collector {
    pub async fn bind(addr: &str, max_frame_bytes: usize) -> Result<Self, CollectorError> {
        let listener = TcpListener::bind(addr).await?;
        info!(local = %listener.local_addr()?, "Collector listening");

        Ok(Self {
            listener,
            max_frame_bytes,
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CollectorError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for reading statistics after [`Collector::run`] takes ownership
    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle(Arc::clone(&self.counters))
    }

    pub fn stats(&self) -> CollectorStats {
        self.stats_handle().snapshot()
    }

    /// Accepts clients one after another and forwards their frames
    ///
    /// Returns once the receiving side of `frame_tx` is dropped.
    pub async fn run(self, frame_tx: mpsc::Sender<ReceivedFrame>) -> Result<(), CollectorError> {
        let mut seq = 0u64;

        loop {
            let (stream, peer) = tokio::select! {
                accepted = accept_retrying(|| self.listener.accept(), ACCEPT_RETRY_DELAY) => accepted,
                _ = frame_tx.closed() => return Ok(()),
            };

            self.counters.clients.fetch_add(1, Ordering::Relaxed);
            info!(peer = %peer, "Camera connected");

            match self.serve_client(stream, &frame_tx, &mut seq).await {
                Ok(SessionEnd::PeerClosed) => info!(peer = %peer, "Camera disconnected"),
                Ok(SessionEnd::ReceiverGone) => return Ok(()),
                Err(e) => warn!(peer = %peer, error = %e, "Dropping camera connection"),
            }
        }
    }

    async fn serve_client(
        &self,
        mut stream: TcpStream,
        frame_tx: &mpsc::Sender<ReceivedFrame>,
        seq: &mut u64,
    ) -> Result<SessionEnd, CollectorError> {
        let mut decoder = RecordDecoder::new(self.max_frame_bytes);
        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

        loop {
            while let Some(payload) = decoder.decode(&mut buf)? {
                let frame = self.inspect(payload, *seq);
                *seq += 1;

                if frame_tx.send(frame).await.is_err() {
                    return Ok(SessionEnd::ReceiverGone);
                }
            }

            if stream.read_buf(&mut buf).await? == 0 {
                if decoder.is_mid_record() || !buf.is_empty() {
                    warn!(buffered = buf.len(), "Connection closed mid-record");
                }
                return Ok(SessionEnd::PeerClosed);
            }
        }
    }

    fn inspect(&self, payload: Bytes, seq: u64) -> ReceivedFrame {
        let valid_jpeg = jpeg::validate_jpeg(&payload).is_ok();
        let dimensions = jpeg::dimensions(&payload);

        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_received
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        if !valid_jpeg {
            self.counters.invalid_jpeg.fetch_add(1, Ordering::Relaxed);
        }

        debug!(seq, len = payload.len(), valid_jpeg, ?dimensions, "Frame received");

        ReceivedFrame {
            seq,
            payload,
            dimensions,
            valid_jpeg,
        }
    }
}

/// Calls `accept` until it yields a connection
///
/// Accept errors only affect the pending connection, so they are logged and
/// the listener keeps going.
async fn accept_retrying<F, Fut, T>(mut accept: F, retry_delay: Duration) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Shared view of a running collector's counters
#[derive(Clone)]
pub struct StatsHandle(Arc<Counters>);

impl StatsHandle {
    pub fn snapshot(&self) -> CollectorStats {
        CollectorStats {
            clients: self.0.clients.load(Ordering::Relaxed),
            frames_received: self.0.frames_received.load(Ordering::Relaxed),
            invalid_jpeg: self.0.invalid_jpeg.load(Ordering::Relaxed),
            bytes_received: self.0.bytes_received.load(Ordering::Relaxed),
        }
    }
}
