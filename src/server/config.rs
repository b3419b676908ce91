//! Listening server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration options
///
/// The timeouts here exist to keep the close flag observable from
/// otherwise-blocking socket calls; they carry no retry or backoff
/// semantics.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Poll interval of the accept loop between close-flag checks
    pub accept_poll: Duration,

    /// Bounded receive timeout for bridge connections (the cancellation
    /// observability tick)
    pub recv_timeout: Duration,

    /// Pause after sending a CLOSE frame, letting the peer drain before
    /// the socket is shut down
    pub drain_pause: Duration,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:65432".parse().expect("static addr"),
            accept_poll: Duration::from_millis(100),
            recv_timeout: Duration::from_millis(100),
            drain_pause: Duration::from_millis(100),
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with a custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the accept-loop poll interval
    pub fn accept_poll(mut self, interval: Duration) -> Self {
        self.accept_poll = interval;
        self
    }

    /// Set the bridge receive timeout
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the post-CLOSE drain pause
    pub fn drain_pause(mut self, pause: Duration) -> Self {
        self.drain_pause = pause;
        self
    }
}
