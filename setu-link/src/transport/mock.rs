//! Scripted AGV server for tests
//!
//! Listens on 127.0.0.1, decodes every request frame it receives and asks
//! a handler what to do with it. Frames are recorded in arrival order
//! across all connections.

use super::Endpoint;
use crate::protocol::{FrameHeader, HEADER_LEN, decode_body, decode_header};
use parking_lot::Mutex;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// A request as seen by the server
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub header: FrameHeader,
    pub body: Value,
}

/// What the server does with one request
pub enum Action {
    /// Write these bytes and keep serving the connection
    Raw(Vec<u8>),
    /// Write these bytes, then close the connection
    RawThenClose(Vec<u8>),
    /// Never answer; the connection stays open
    Silent,
}

impl Action {
    /// Well-formed response: echoed sequence, type `api + 10000`
    pub fn reply(request: &FrameHeader, body: &Value) -> Self {
        Self::reply_as(request, request.message_type.wrapping_add(10_000), body)
    }

    /// Well-formed response with an explicit type code
    pub fn reply_as(request: &FrameHeader, message_type: u16, body: &Value) -> Self {
        Action::Raw(frame(request.sequence, message_type, body))
    }

    /// `{"ret_code": 0}` acknowledgement
    pub fn ack(request: &FrameHeader) -> Self {
        Self::reply(request, &serde_json::json!({"ret_code": 0}))
    }
}

/// Build a complete response frame
pub fn frame(sequence: u16, message_type: u16, body: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(body).unwrap();
    let header = FrameHeader::new(sequence, message_type, body.len() as u32);
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(&body);
    out
}

type Handler = dyn Fn(usize, &ReceivedFrame) -> Action + Send + Sync;

/// Mock AGV endpoint
pub struct MockAgv {
    port: u16,
    frames: Arc<Mutex<Vec<ReceivedFrame>>>,
    connections: Arc<AtomicUsize>,
}

impl MockAgv {
    /// Start serving. `handler` gets the zero-based index of the request
    /// across all connections and the decoded request.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(usize, &ReceivedFrame) -> Action + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let handler: Arc<Handler> = Arc::new(handler);

        let accept_frames = Arc::clone(&frames);
        let accept_connections = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_connections.fetch_add(1, Ordering::SeqCst);
                let frames = Arc::clone(&accept_frames);
                let handler = Arc::clone(&handler);
                thread::spawn(move || serve(stream, frames, handler));
            }
        });

        Self {
            port,
            frames,
            connections,
        }
    }

    /// Answer every request with a `ret_code` 0 acknowledgement
    pub fn acking() -> Self {
        Self::start(|_, req| Action::ack(&req.header))
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port)
    }

    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` frames arrived or `timeout` passes
    pub fn wait_for_frames(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.frame_count() >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.frame_count() >= n
    }
}

fn serve(mut stream: TcpStream, frames: Arc<Mutex<Vec<ReceivedFrame>>>, handler: Arc<Handler>) {
    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        if stream.read_exact(&mut header_buf).is_err() {
            return;
        }
        let Ok(header) = decode_header(&header_buf) else {
            return;
        };
        let mut body_buf = vec![0u8; header.length as usize];
        if stream.read_exact(&mut body_buf).is_err() {
            return;
        }
        let Ok(body) = decode_body(&body_buf, body_buf.len()) else {
            return;
        };

        let request = ReceivedFrame { header, body };
        let index = {
            let mut frames = frames.lock();
            frames.push(request.clone());
            frames.len() - 1
        };

        match handler(index, &request) {
            Action::Raw(bytes) => {
                if stream.write_all(&bytes).is_err() {
                    return;
                }
            }
            Action::RawThenClose(bytes) => {
                let _ = stream.write_all(&bytes);
                let _ = stream.flush();
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
            Action::Silent => {}
        }
    }
}
