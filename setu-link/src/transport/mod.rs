//! Transport layer: one blocking TCP connection to the AGV

use std::fmt;
use std::time::Duration;

#[cfg(test)]
pub mod mock;
mod tcp;

pub use tcp::Connection;

/// Connection lifecycle
///
/// ```text
/// Disconnected ──open──▶ Connecting ──▶ Connected
///      ▲                     │              │
///      └──── connect failed ─┘              │ transport error
///      └────────────────────────────────────┘
/// any state ──close──▶ Closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Remote host and port
#[derive(Debug, Clone, PartialEq, Eq)]
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

/// Socket and connect-retry settings
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Connect timeout, and the deadline for each send or receive
    pub timeout: Duration,
    /// Enable SO_KEEPALIVE on the socket
    pub keepalive: bool,
    /// Connect attempts before giving up (at least one is made)
    pub attempts: u32,
    /// Pause between connect attempts
    pub retry_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            keepalive: true,
            attempts: 3,
            retry_delay: Duration::from_secs(3),
        }
    }
}

/// Counters kept across reconnects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Successful connects, including reconnects
    pub connects: u64,
    /// Frames written in full
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}
