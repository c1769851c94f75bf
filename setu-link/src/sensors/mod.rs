//! Decoding of status payloads into usable values

pub mod alarms;
pub mod laser;

pub use alarms::{Alarm, AlarmReport};
pub use laser::{BeamFilter, BeamFilterConfig, FilterStats, FilteredPoint, FilteredScan, filter};
