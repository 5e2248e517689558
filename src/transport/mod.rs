//! Stream transport to the collector
//!
//! The streamer only needs four operations from the network: a connected
//! check, one connect attempt, a blocking write that reports how many bytes
//! were accepted, and close. [`TcpTransport`] implements them over
//! `std::net::TcpStream`.

mod tcp;

pub use tcp::TcpTransport;

use std::fmt;
use thiserror::Error;

/// Fixed collector address, configured once at startup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} resolved to no addresses")]
    NoAddress(Endpoint),

    #[error("connect to {endpoint} failed: {source}")]
    Io {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
}

/// Client side of a persistent byte stream
pub trait Transport {
    /// Reports whether the stream is still usable
    ///
    /// Takes `&mut self` so implementations can notice a peer disconnect and
    /// drop their handle.
    fn is_connected(&mut self) -> bool;

    /// Makes exactly one connection attempt
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), ConnectError>;

    /// Blocking write; returns the number of bytes the stream accepted
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Closes the stream. Closing a closed transport is a no-op.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn is_connected(&mut self) -> bool {
        (**self).is_connected()
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), ConnectError> {
        (**self).connect(endpoint)
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
