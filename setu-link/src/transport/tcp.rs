//! Blocking TCP connection with bounded connect retries

use super::{ConnectOptions, ConnectionState, Endpoint, TransportStats};
use crate::error::{Error, Result};
use socket2::SockRef;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

/// One TCP socket to the AGV and its lifecycle state
///
/// Transport errors drop the socket and move the connection back to
/// `Disconnected`; the owner decides whether to reconnect. After
/// [`Connection::close`] every operation returns [`Error::Closed`].
#[derive(Debug)]
pub struct Connection {
    endpoint: Endpoint,
    options: ConnectOptions,
    stream: Option<TcpStream>,
    state: ConnectionState,
    stats: TransportStats,
}

impl Connection {
    /// Create an unconnected handle. Nothing touches the network until
    /// [`Connection::open`].
    pub fn new(endpoint: Endpoint, options: ConnectOptions) -> Self {
        Self {
            endpoint,
            options,
            stream: None,
            state: ConnectionState::Disconnected,
            stats: TransportStats::default(),
        }
    }

    /// Create and open in one step
    pub fn connect(endpoint: Endpoint, options: ConnectOptions) -> Result<Self> {
        let mut conn = Self::new(endpoint, options);
        conn.open()?;
        Ok(conn)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Open the socket, retrying up to `options.attempts` times.
    pub fn open(&mut self) -> Result<()> {
        self.open_with(self.options.attempts)
    }

    fn open_with(&mut self, attempts: u32) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::Closed);
        }

        self.state = ConnectionState::Connecting;
        let attempts = attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            log::info!(
                "Connecting to {} (attempt {}/{})",
                self.endpoint,
                attempt,
                attempts
            );
            match self.try_connect() {
                Ok(stream) => {
                    self.stream = Some(stream);
                    self.state = ConnectionState::Connected;
                    self.stats.connects += 1;
                    log::info!("Connected to {}", self.endpoint);
                    return Ok(());
                }
                Err(e) => {
                    log::error!(
                        "Connect attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        self.endpoint,
                        e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        log::info!("Retrying in {:?}", self.options.retry_delay);
                        thread::sleep(self.options.retry_delay);
                    }
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(Error::Connectivity {
            endpoint: self.endpoint.to_string(),
            attempts,
            source: last_error.unwrap_or_else(|| io::Error::other("no connect attempt made")),
        })
    }

    /// Drop the current socket (ignoring errors) and open a new one with
    /// the same endpoint and options.
    pub fn reconnect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::Closed);
        }
        log::info!("Reconnecting to {}", self.endpoint);
        self.disconnect();
        self.open()
    }

    /// Like [`Connection::reconnect`], but with a single connect attempt.
    /// For callers that run their own retry loop.
    pub fn reconnect_once(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::Closed);
        }
        log::info!("Reconnecting to {}", self.endpoint);
        self.disconnect();
        self.open_with(1)
    }

    /// Drop the socket without closing the handle for good
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Best-effort shutdown. Terminal: the handle cannot be reopened.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            log::info!("Connection to {} closed", self.endpoint);
        }
        self.state = ConnectionState::Closed;
    }

    /// Write every byte, looping over partial writes.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.send_within(bytes, self.options.timeout)
    }

    /// [`Connection::send`] with a deadline for this call only
    pub fn send_within(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        let result = match self.live_stream() {
            Ok(stream) => write_all_within(stream, bytes, timeout),
            Err(e) => return Err(e),
        };
        match result {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += bytes.len() as u64;
                log::trace!("Sent {} bytes to {}", bytes.len(), self.endpoint);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Block until exactly `n` bytes arrive, the peer closes, or the
    /// configured timeout elapses, whichever happens first.
    pub fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        self.recv_exact_within(n, self.options.timeout)
    }

    /// [`Connection::recv_exact`] with a deadline for this call only
    pub fn recv_exact_within(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let result = match self.live_stream() {
            Ok(stream) => read_exact_within(stream, n, timeout),
            Err(e) => return Err(e),
        };
        match result {
            Ok(buf) => {
                self.stats.bytes_received += buf.len() as u64;
                Ok(buf)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn live_stream(&mut self) -> Result<&mut TcpStream> {
        match self.state {
            ConnectionState::Closed => Err(Error::Closed),
            _ => self.stream.as_mut().ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "not connected",
                ))
            }),
        }
    }

    /// Transport errors leave the stream at an unknown position
    fn fail(&mut self, error: Error) -> Error {
        if error.is_transport() {
            log::warn!("Transport error on {}: {}", self.endpoint, error);
            self.disconnect();
        }
        error
    }

    fn try_connect(&self) -> io::Result<TcpStream> {
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port).to_socket_addrs()?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.options.timeout) {
                Ok(stream) => {
                    self.configure(&stream)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} resolved to no addresses", self.endpoint),
            )
        }))
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(self.options.timeout))?;
        stream.set_write_timeout(Some(self.options.timeout))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }
        if self.options.keepalive {
            if let Err(e) = SockRef::from(stream).set_keepalive(true) {
                log::warn!("Failed to set keep-alive: {}", e);
            }
        }
        Ok(())
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn write_all_within(stream: &mut TcpStream, bytes: &[u8], timeout: Duration) -> Result<()> {
    stream.set_write_timeout(Some(timeout))?;
    let mut written = 0;
    while written < bytes.len() {
        match stream.write(&bytes[written..]) {
            Ok(0) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "peer stopped accepting data",
                )));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if is_timeout(&e) => return Err(Error::Timeout(timeout, "send")),
            Err(e) => return Err(Error::Io(e)),
        }
    }
    stream.flush()?;
    Ok(())
}

/// Read exactly `n` bytes under one overall deadline. The socket may
/// deliver data in arbitrary chunks; each read gets the time that is left.
fn read_exact_within(stream: &mut TcpStream, n: usize, timeout: Duration) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    let deadline = Instant::now() + timeout;

    while filled < n {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout(timeout, "receive"));
        }
        stream.set_read_timeout(Some(remaining))?;

        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    expected: n,
                    received: filled,
                });
            }
            Ok(k) => filled += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if is_timeout(&e) => return Err(Error::Timeout(timeout, "receive")),
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Ok(buf)
}
