//! SetuLink - client for AGVs speaking the RoboKit TCP protocol
//!
//! Frames are a 16-byte header followed by a JSON body. Commands (motion,
//! stop) go to the control port and are acknowledged with a `ret_code`;
//! queries (laser, alarms) go to the status port and are answered with a
//! typed payload.
//!
//! ## Layers
//!
//! - [`protocol`]: frame codec and API numbers
//! - [`transport`]: one blocking TCP connection and its lifecycle
//! - [`client`]: request/response exchange with bounded retry
//! - [`sensors`]: laser beam filtering and alarm reports
//! - [`agv`]: session over the control and status ports

pub mod agv;
pub mod client;
pub mod config;
pub mod error;
pub mod motion;
pub mod protocol;
pub mod sensors;
pub mod transport;

// Re-export commonly used types
pub use agv::Agv;
pub use client::{Reply, RequestClient, ResponseEnvelope, RetryPolicy, SharedClient};
pub use config::Config;
pub use error::{Error, Result};
pub use motion::{DriveKeys, Velocity};
pub use protocol::{Api, ApiKind};
pub use sensors::{AlarmReport, BeamFilter, FilteredPoint, FilteredScan};
pub use transport::{ConnectOptions, Connection, ConnectionState, Endpoint};
