//! Request/response client with bounded retry
//!
//! One call to [`RequestClient::send_request`] is one full exchange:
//!
//! ```text
//! encode ─▶ send ─▶ recv 16 B ─▶ decode header ─▶ size check ─▶ recv body ─▶ decode ─▶ validate
//!   ▲                                                                                   │
//!   └────── transport error: disconnect, wait, reconnect (up to max_retries) ◀──────────┘
//! ```
//!
//! Only transport failures are retried. A rejected command reached the
//! device, so sending it again would be a second, distinct action.

use crate::error::{Error, Result};
use crate::protocol::{
    Api, ApiKind, FrameHeader, HEADER_LEN, MAX_BODY_LEN, decode_body, decode_header, encode,
};
use crate::transport::{ConnectOptions, Connection, ConnectionState, Endpoint, TransportStats};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often and how fast to retry after a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Pause before each additional attempt
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(500),
        }
    }
}

/// Response body, tagged by the kind of API that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Accepted command (`ret_code` 0)
    Ack(Value),
    /// Status or sensor payload
    Status(Value),
}

impl Reply {
    pub fn body(&self) -> &Value {
        match self {
            Reply::Ack(body) | Reply::Status(body) => body,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            Reply::Ack(body) | Reply::Status(body) => body,
        }
    }
}

/// A validated response
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub api: Api,
    pub header: FrameHeader,
    pub reply: Reply,
}

/// Synchronous client owning one connection
pub struct RequestClient {
    conn: Connection,
    retry: RetryPolicy,
    next_sequence: u16,
}

impl RequestClient {
    /// Wrap a connection. It may still be disconnected; the first request
    /// connects it.
    pub fn new(conn: Connection, retry: RetryPolicy) -> Self {
        Self {
            conn,
            retry,
            next_sequence: 1,
        }
    }

    /// Connect to `endpoint` and wrap the connection
    pub fn connect(endpoint: Endpoint, options: ConnectOptions, retry: RetryPolicy) -> Result<Self> {
        Ok(Self::new(Connection::connect(endpoint, options)?, retry))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send with the configured retry policy and connection timeout
    pub fn send<T: Serialize + ?Sized>(&mut self, api: Api, params: &T) -> Result<ResponseEnvelope> {
        let timeout = self.conn.timeout();
        self.send_request(api, params, self.retry.max_retries, timeout)
    }

    /// Perform one exchange, retrying transport failures up to
    /// `max_retries` more times.
    ///
    /// `timeout` bounds each send and each receive of this call only; the
    /// connection's configured timeout is left untouched. A dropped socket
    /// is reopened with a single connect attempt per retry, so a dead robot
    /// costs at most `max_retries + 1` connect timeouts plus the retry
    /// delays.
    pub fn send_request<T: Serialize + ?Sized>(
        &mut self,
        api: Api,
        params: &T,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<ResponseEnvelope> {
        if timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }

        let attempts = max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                log::info!(
                    "API {} on {}: retrying in {:?} (attempt {}/{})",
                    api,
                    self.conn.endpoint(),
                    self.retry.delay,
                    attempt,
                    attempts
                );
                thread::sleep(self.retry.delay);
            }

            match self.exchange(api, params, timeout) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transport() => {
                    log::warn!("API {}: attempt {}/{} failed: {}", api, attempt, attempts, e);
                    self.conn.disconnect();
                    last_error = Some(e);
                }
                Err(e) => {
                    log::warn!("API {}: {}", api, e);
                    return Err(e);
                }
            }
        }

        let last = last_error.unwrap_or(Error::Closed);
        log::error!("API {}: failed after {} attempt(s)", api, attempts);
        Err(Error::RetriesExhausted {
            api: api.id,
            attempts,
            last: Box::new(last),
        })
    }

    /// Close the connection for good
    pub fn close(&mut self) {
        self.conn.close();
    }

    fn take_sequence(&mut self) -> u16 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    fn exchange<T: Serialize + ?Sized>(
        &mut self,
        api: Api,
        params: &T,
        timeout: Duration,
    ) -> Result<ResponseEnvelope> {
        if self.conn.state() == ConnectionState::Closed {
            return Err(Error::Closed);
        }

        let sequence = self.take_sequence();
        let frame = encode(sequence, api.id, params)?;

        if !self.conn.is_connected() {
            self.conn.reconnect_once()?;
        }

        self.conn.send_within(&frame, timeout)?;
        log::debug!(
            "API {}: sent seq {} ({} body bytes)",
            api,
            sequence,
            frame.len() - HEADER_LEN
        );

        let header_bytes = self.conn.recv_exact_within(HEADER_LEN, timeout)?;
        let header = match decode_header(&header_bytes) {
            Ok(header) => header,
            Err(e) => {
                // Frame boundary is lost; start over on a fresh socket
                self.conn.disconnect();
                return Err(e);
            }
        };
        log::debug!(
            "API {}: response header seq {} type {} length {}",
            api,
            header.sequence,
            header.message_type,
            header.length
        );

        if header.length > MAX_BODY_LEN {
            self.conn.disconnect();
            return Err(Error::SizeLimit {
                api: api.id,
                length: header.length,
                limit: MAX_BODY_LEN,
            });
        }

        let length = header.length as usize;
        let body_bytes = self.conn.recv_exact_within(length, timeout)?;
        let body = decode_body(&body_bytes, length)?;
        log::trace!("API {}: body {}", api, body);

        validate(api, sequence, header, body)
    }
}

/// Check a decoded response against the kind of API that was called
fn validate(api: Api, sequence: u16, header: FrameHeader, body: Value) -> Result<ResponseEnvelope> {
    match api.kind {
        ApiKind::Command => {
            if header.sequence != sequence {
                log::warn!(
                    "API {}: response echoes seq {}, request was {}",
                    api,
                    header.sequence,
                    sequence
                );
            }
            check_ret_code(api, &body)?;
            log::debug!("API {}: command accepted", api);
            Ok(ResponseEnvelope {
                api,
                header,
                reply: Reply::Ack(body),
            })
        }
        ApiKind::Query => {
            let expected = api.response_type();
            if header.message_type != expected {
                return Err(Error::ProtocolMismatch {
                    api: api.id,
                    expected,
                    actual: header.message_type,
                });
            }
            check_ret_code(api, &body)?;
            Ok(ResponseEnvelope {
                api,
                header,
                reply: Reply::Status(body),
            })
        }
    }
}

/// A missing `ret_code` counts as success
fn check_ret_code(api: Api, body: &Value) -> Result<()> {
    let code = match body.get("ret_code") {
        None => return Ok(()),
        Some(value) => value.as_i64().ok_or_else(|| {
            Error::Decode(format!("API {}: ret_code is not an integer: {}", api, value))
        })?,
    };
    if code == 0 {
        return Ok(());
    }

    let message = body
        .get("err_msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Err(Error::Application {
        api: api.id,
        code,
        message,
    })
}

/// Cloneable handle that serializes whole exchanges on one connection
///
/// Periodic motion commands, a shutdown stop and a status poller can share
/// one handle; the lock is held from send until the body is read.
#[derive(Clone)]
pub struct SharedClient {
    inner: Arc<Mutex<RequestClient>>,
}

impl SharedClient {
    pub fn new(client: RequestClient) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    pub fn send<T: Serialize + ?Sized>(&self, api: Api, params: &T) -> Result<ResponseEnvelope> {
        self.inner.lock().send(api, params)
    }

    pub fn send_request<T: Serialize + ?Sized>(
        &self,
        api: Api,
        params: &T,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<ResponseEnvelope> {
        self.inner
            .lock()
            .send_request(api, params, max_retries, timeout)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().connection().state()
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.lock().connection().stats()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.lock().connection().timeout()
    }

    pub fn close(&self) {
        self.inner.lock().close();
    }
}
