//! Blocking TCP transport

use super::{ConnectError, Endpoint, Transport};
use crate::config::NetworkConfig;
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// TCP client connection to the collector
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            stream: None,
            connect_timeout,
            write_timeout,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.connect_timeout(), config.write_timeout())
    }

    /// Address of the connected peer, if any
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    fn connect_addr(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Non-blocking peek: EOF or a socket error means the peer is gone
fn peer_alive(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return false;
    }

    let mut probe = [0u8; 1];
    let alive = match stream.peek(&mut probe) {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) => e.kind() == ErrorKind::WouldBlock,
    };

    alive && stream.set_nonblocking(false).is_ok()
}

impl Transport for TcpTransport {
    fn is_connected(&mut self) -> bool {
        let alive = self.stream.as_ref().is_some_and(peer_alive);
        if !alive {
            self.stream = None;
        }
        alive
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), ConnectError> {
        self.close();

        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                endpoint: endpoint.clone(),
                source,
            })?;

        let mut last_err = None;
        for addr in addrs {
            match self.connect_addr(addr) {
                Ok(stream) => {
                    debug!(peer = %addr, "TCP stream established");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    debug!(addr = %addr, error = %e, "TCP connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(source) => ConnectError::Io {
                endpoint: endpoint.clone(),
                source,
            },
            None => ConnectError::NoAddress(endpoint.clone()),
        })
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };

        let mut written = 0;
        while written < bytes.len() {
            match stream.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, written, requested = bytes.len(), "TCP write failed");
                    break;
                }
            }
        }

        written
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    fn transport() -> TcpTransport {
        TcpTransport::new(Duration::from_secs(1), Duration::from_secs(1))
    }

    fn local_endpoint(listener: &TcpListener) -> Endpoint {
        let addr = listener.local_addr().unwrap();
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    #[test]
    fn test_connect_and_write() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = local_endpoint(&listener);

        let mut transport = transport();
        assert!(!transport.is_connected());
        transport.connect(&endpoint).unwrap();
        assert!(transport.is_connected());

        let (mut peer, _) = listener.accept().unwrap();
        assert_eq!(transport.write(b"hello"), 5);

        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = local_endpoint(&listener);
        drop(listener);

        let mut transport = transport();
        let err = transport.connect(&endpoint).unwrap_err();
        assert!(matches!(err, ConnectError::Io { .. }), "unexpected: {err}");
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_write_when_closed_accepts_nothing() {
        let mut transport = transport();
        assert_eq!(transport.write(b"data"), 0);
        transport.close();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_detects_peer_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = local_endpoint(&listener);

        let mut transport = transport();
        transport.connect(&endpoint).unwrap();
        let (peer, _) = listener.accept().unwrap();
        drop(peer);

        // FIN delivery on loopback is fast but not synchronous
        let deadline = Instant::now() + Duration::from_secs(2);
        while transport.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        assert!(!transport.is_connected());
        assert!(transport.peer_addr().is_none());
    }
}
