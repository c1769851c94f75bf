//! Error types for SetuLink

use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SetuLink error types
///
/// Transport variants (`Connectivity`, `Timeout`, `ShortRead`, `Io`) are
/// recovered by the request retry loop. Everything else reaches the caller
/// on first occurrence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connect or reconnect gave up after all attempts
    #[error("Cannot connect to {endpoint} after {attempts} attempt(s): {source}")]
    Connectivity {
        endpoint: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// Blocking read or write did not finish in time
    #[error("Timed out after {0:?} during {1}")]
    Timeout(Duration, &'static str),

    /// Peer closed the connection before the frame was complete
    #[error("Connection closed mid-read: received {received} of {expected} bytes")]
    ShortRead { expected: usize, received: usize },

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Declared payload length exceeds the protocol ceiling
    #[error("API {api}: declared payload of {length} bytes exceeds limit of {limit} bytes")]
    SizeLimit { api: u16, length: u32, limit: u32 },

    /// Request parameters could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Malformed header, UTF-8 or JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// Response type code does not belong to the request
    #[error("API {api}: expected response type {expected}, got {actual}")]
    ProtocolMismatch { api: u16, expected: u16, actual: u16 },

    /// Device rejected the command (`ret_code` != 0)
    #[error("API {api}: device returned ret_code {code}: {message}")]
    Application {
        api: u16,
        code: i64,
        message: String,
    },

    /// Every attempt failed on the transport
    #[error("API {api}: giving up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        api: u16,
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    /// Connection was shut down explicitly
    #[error("Connection closed")]
    Closed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures the retry loop handles by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Connectivity { .. } | Error::Timeout(..) | Error::ShortRead { .. } | Error::Io(_)
        )
    }

    /// The transport error behind `RetriesExhausted`, or `self` otherwise.
    pub fn last_cause(&self) -> &Error {
        match self {
            Error::RetriesExhausted { last, .. } => last.last_cause(),
            other => other,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
