//! RoboKit wire protocol: frame codec and API numbers

pub mod api;
pub mod codec;

pub use api::{Api, ApiKind};
pub use codec::{FrameHeader, HEADER_LEN, MAX_BODY_LEN, decode_body, decode_header, encode};
