//! Frame encoding and decoding
//!
//! # Frame Format
//!
//! ```text
//! ┌──────┬─────────┬──────────┬─────────────┬──────────┬──────────────┐
//! │ 0x5A │ Version │ Sequence │ Body length │ Type     │ Reserved     │
//! │ 1 B  │ 1 B     │ u16 BE   │ u32 BE      │ u16 BE   │ 6 B (opaque) │
//! └──────┴─────────┴──────────┴─────────────┴──────────┴──────────────┘
//!   followed by `Body length` bytes of UTF-8 JSON
//! ```
//!
//! Requests carry the API number in the type field. Responses echo the
//! sequence number and carry `api + 10000` as the type. Reserved bytes are
//! kept as-is so a device that uses them sees its own values echoed back.
//!
//! Everything here is a pure transform: no I/O, no retries.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Fixed header size in bytes
pub const HEADER_LEN: usize = 16;

/// Start-of-frame marker
pub const SYNC_BYTE: u8 = 0x5A;

/// Protocol version written on outgoing frames
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Largest body accepted in either direction (10 MiB)
pub const MAX_BODY_LEN: u32 = 10 * 1024 * 1024;

/// Decoded 16-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub sequence: u16,
    pub length: u32,
    pub message_type: u16,
    pub reserved: [u8; 6],
}

impl FrameHeader {
    /// Header for an outgoing frame with zeroed reserved bytes
    pub fn new(sequence: u16, message_type: u16, length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            length,
            message_type,
            reserved: [0; 6],
        }
    }

    /// Serialize to the 16-byte wire layout
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = SYNC_BYTE;
        buf[1] = self.version;
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.length.to_be_bytes());
        buf[8..10].copy_from_slice(&self.message_type.to_be_bytes());
        buf[10..16].copy_from_slice(&self.reserved);
        buf
    }
}

/// Encode a request frame: header followed by the JSON body.
///
/// `params` is usually a `serde_json::Map`, but any serializable value works.
pub fn encode<T: Serialize + ?Sized>(sequence: u16, api: u16, params: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(params)
        .map_err(|e| Error::Encode(format!("API {}: {}", api, e)))?;

    let length = u32::try_from(body.len())
        .ok()
        .filter(|&len| len <= MAX_BODY_LEN)
        .ok_or_else(|| {
            Error::Encode(format!(
                "API {}: body of {} bytes exceeds limit of {} bytes",
                api,
                body.len(),
                MAX_BODY_LEN
            ))
        })?;

    let header = FrameHeader::new(sequence, api, length);

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a received header.
///
/// The body length is returned as-is; enforcing [`MAX_BODY_LEN`] is the
/// caller's job so it can attach the API number to the error.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader> {
    if bytes.len() != HEADER_LEN {
        return Err(Error::Decode(format!(
            "header must be {} bytes, got {}",
            HEADER_LEN,
            bytes.len()
        )));
    }
    if bytes[0] != SYNC_BYTE {
        return Err(Error::Decode(format!(
            "bad sync byte {:#04x} (expected {:#04x})",
            bytes[0], SYNC_BYTE
        )));
    }

    let mut reserved = [0u8; 6];
    reserved.copy_from_slice(&bytes[10..16]);

    Ok(FrameHeader {
        version: bytes[1],
        sequence: u16::from_be_bytes([bytes[2], bytes[3]]),
        length: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        message_type: u16::from_be_bytes([bytes[8], bytes[9]]),
        reserved,
    })
}

/// Decode a received body of `length` bytes as JSON.
///
/// An empty body stands for an empty object.
pub fn decode_body(bytes: &[u8], length: usize) -> Result<Value> {
    if bytes.len() != length {
        return Err(Error::Decode(format!(
            "body length mismatch: declared {}, got {}",
            length,
            bytes.len()
        )));
    }
    if length == 0 {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("body is not UTF-8: {}", e)))?;
    serde_json::from_str(text).map_err(|e| Error::Decode(format!("body is not JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_header_layout() {
        let header = FrameHeader::new(0x0102, 1009, 0x0A0B0C0D);
        let bytes = header.to_bytes();

        assert_eq!(bytes[0], 0x5A);
        assert_eq!(bytes[1], 0x01);
        assert_eq!(&bytes[2..4], &[0x01, 0x02]);
        assert_eq!(&bytes[4..8], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&bytes[8..10], &1009u16.to_be_bytes());
        assert_eq!(&bytes[10..16], &[0; 6]);
    }

    #[test]
    fn test_header_round_trip() {
        let cases = [
            (0u16, 0u32, 0u16),
            (1, 14, 2000),
            (u16::MAX, MAX_BODY_LEN, 11009),
            (42, u32::MAX, u16::MAX),
        ];
        for (sequence, length, message_type) in cases {
            let header = FrameHeader::new(sequence, message_type, length);
            let decoded = decode_header(&header.to_bytes()).unwrap();
            assert_eq!(decoded, header);
            assert_eq!(decoded.length, length);
            assert_eq!(decoded.message_type, message_type);
        }
    }

    #[test]
    fn test_reserved_bytes_pass_through() {
        let mut bytes = FrameHeader::new(7, 11009, 3).to_bytes();
        bytes[10..16].copy_from_slice(&[1, 2, 3, 4, 5, 6]);

        let decoded = decode_header(&bytes).unwrap();
        assert_eq!(decoded.reserved, [1, 2, 3, 4, 5, 6]);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_decode_header_wrong_size() {
        assert!(matches!(decode_header(&[0x5A; 15]), Err(Error::Decode(_))));
        assert!(matches!(decode_header(&[0x5A; 17]), Err(Error::Decode(_))));
        assert!(matches!(decode_header(&[]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_header_bad_sync() {
        let mut bytes = FrameHeader::new(1, 2000, 0).to_bytes();
        bytes[0] = 0x00;
        let err = decode_header(&bytes).unwrap_err();
        assert!(err.to_string().contains("sync"));
    }

    #[test]
    fn test_encode_frame() {
        let params = json!({"vx": 0.2, "vy": 0.0, "w": 0.0});
        let frame = encode(5, 2010, &params).unwrap();

        let header = decode_header(&frame[..HEADER_LEN]).unwrap();
        assert_eq!(header.sequence, 5);
        assert_eq!(header.message_type, 2010);
        assert_eq!(header.length as usize, frame.len() - HEADER_LEN);

        let body = decode_body(&frame[HEADER_LEN..], header.length as usize).unwrap();
        assert_eq!(body, params);
    }

    #[test]
    fn test_encode_empty_params() {
        let frame = encode(1, 2000, &serde_json::Map::new()).unwrap();
        assert_eq!(&frame[HEADER_LEN..], b"{}");
        assert_eq!(decode_header(&frame[..HEADER_LEN]).unwrap().length, 2);
    }

    #[test]
    fn test_body_round_trip() {
        let samples = [
            json!({}),
            json!({"step": 1}),
            json!({"name": "站点-1", "nested": {"list": [1, 2.5, null, true]}}),
            json!({"s": "quote \" and \\ slash"}),
        ];
        for params in samples {
            let frame = encode(9, 1009, &params).unwrap();
            let body = decode_body(&frame[HEADER_LEN..], frame.len() - HEADER_LEN).unwrap();
            assert_eq!(body, params);
        }
    }

    #[test]
    fn test_encode_rejects_non_string_keys() {
        let mut params = HashMap::new();
        params.insert((1, 2), "value");
        assert!(matches!(encode(1, 2000, &params), Err(Error::Encode(_))));
    }

    #[test]
    fn test_decode_body_empty_is_object() {
        assert_eq!(decode_body(&[], 0).unwrap(), json!({}));
    }

    #[test]
    fn test_decode_body_invalid_utf8() {
        let bytes = [0x7B, 0xFF, 0xFE, 0x7D];
        let err = decode_body(&bytes, bytes.len()).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_decode_body_invalid_json() {
        let bytes = b"{\"ret_code\":";
        let err = decode_body(bytes, bytes.len()).unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_decode_body_length_mismatch() {
        assert!(matches!(decode_body(b"{}", 5), Err(Error::Decode(_))));
    }
}
