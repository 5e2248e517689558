//! Connection state machine
//!
//! `Disconnected --connect ok--> Connected`
//! `Connected --send mismatch--> Disconnected`
//! `Connected --peer disconnect--> Disconnected`
//!
//! The manager never retries on its own; the streamer calls
//! [`ConnectionManager::ensure_connected`] once per cycle.

use crate::transport::{ConnectError, Endpoint, Transport};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Result of [`ConnectionManager::ensure_connected`]
#[derive(Debug)]
pub enum ConnectOutcome {
    AlreadyConnected,
    NewlyConnected,
    Failed(ConnectError),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectOutcome::Failed(_))
    }
}

/// Owns the transport and the fixed endpoint it connects to
pub struct ConnectionManager<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    state: ConnectionState,
    connect_attempts: u64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
            state: ConnectionState::Disconnected,
            connect_attempts: 0,
        }
    }

    /// Makes sure the transport is connected, with at most one connect call
    pub fn ensure_connected(&mut self) -> ConnectOutcome {
        if self.transport.is_connected() {
            self.state = ConnectionState::Connected;
            return ConnectOutcome::AlreadyConnected;
        }

        if self.state == ConnectionState::Connected {
            warn!(endpoint = %self.endpoint, "Connection lost");
            self.state = ConnectionState::Disconnected;
        }

        self.connect_attempts += 1;
        match self.transport.connect(&self.endpoint) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!(endpoint = %self.endpoint, "Connected to collector");
                ConnectOutcome::NewlyConnected
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Connection failed");
                ConnectOutcome::Failed(e)
            }
        }
    }

    /// Writes through the transport; nothing is sent while disconnected
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.state == ConnectionState::Disconnected {
            return 0;
        }
        self.transport.write(bytes)
    }

    /// Closes the transport and forces `Disconnected`
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.state = ConnectionState::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of connect calls made so far
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeTransport {
        connected: bool,
        connect_results: VecDeque<bool>,
        connects: usize,
        closes: usize,
        written: Vec<u8>,
    }

    impl Transport for FakeTransport {
        fn is_connected(&mut self) -> bool {
            self.connected
        }

        fn connect(&mut self, endpoint: &Endpoint) -> Result<(), ConnectError> {
            self.connects += 1;
            if self.connect_results.pop_front().unwrap_or(true) {
                self.connected = true;
                Ok(())
            } else {
                Err(ConnectError::NoAddress(endpoint.clone()))
            }
        }

        fn write(&mut self, bytes: &[u8]) -> usize {
            self.written.extend_from_slice(bytes);
            bytes.len()
        }

        fn close(&mut self) {
            self.closes += 1;
            self.connected = false;
        }
    }

    fn manager(transport: FakeTransport) -> ConnectionManager<FakeTransport> {
        ConnectionManager::new(transport, Endpoint::new("collector", 8000))
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let mgr = manager(FakeTransport::default());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(mgr.connect_attempts(), 0);
    }

    #[test]
    fn test_connects_once() {
        let mut mgr = manager(FakeTransport::default());

        assert!(matches!(mgr.ensure_connected(), ConnectOutcome::NewlyConnected));
        assert_eq!(mgr.state(), ConnectionState::Connected);
        assert_eq!(mgr.transport().connects, 1);
    }

    #[test]
    fn test_already_connected_makes_no_connect_call() {
        let mut mgr = manager(FakeTransport::default());
        mgr.ensure_connected();

        for _ in 0..3 {
            assert!(matches!(mgr.ensure_connected(), ConnectOutcome::AlreadyConnected));
        }
        assert_eq!(mgr.transport().connects, 1);
        assert_eq!(mgr.connect_attempts(), 1);
    }

    #[test]
    fn test_failed_connect_does_not_retry() {
        let mut mgr = manager(FakeTransport {
            connect_results: VecDeque::from([false]),
            ..Default::default()
        });

        let outcome = mgr.ensure_connected();
        assert!(!outcome.is_connected());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(mgr.transport().connects, 1);
    }

    #[test]
    fn test_disconnect_then_reconnect() {
        let mut mgr = manager(FakeTransport::default());
        mgr.ensure_connected();

        mgr.disconnect();
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(mgr.transport().closes, 1);

        assert!(matches!(mgr.ensure_connected(), ConnectOutcome::NewlyConnected));
        assert_eq!(mgr.transport().connects, 2);
    }

    #[test]
    fn test_no_write_while_disconnected() {
        let mut mgr = manager(FakeTransport {
            connected: true,
            ..Default::default()
        });

        // Transport claims connected but the manager has not checked yet
        assert_eq!(mgr.write(b"abc"), 0);
        assert!(mgr.transport().written.is_empty());

        mgr.ensure_connected();
        assert_eq!(mgr.write(b"abc"), 3);
    }
}
