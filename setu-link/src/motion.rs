//! Velocity commands for the open-loop motion API

use crate::config::MotionConfig;
use serde::Serialize;

/// Body-frame velocity sent with the motion command
///
/// Serializes to the wire parameters `{"vx", "vy", "w"}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Velocity {
    /// Forward speed in m/s
    pub vx: f32,
    /// Lateral speed in m/s (omnidirectional bases only)
    pub vy: f32,
    /// Turn rate in rad/s, counter-clockwise positive
    pub w: f32,
}

/// Snapshot of the manual-drive keys
///
/// `w`/`s` drive forward/backward, `a`/`d` turn left/right, and space
/// overrides everything with a stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub stop: bool,
}

impl DriveKeys {
    /// Map pressed characters to keys. Unknown characters are ignored.
    pub fn from_chars(chars: &str) -> Self {
        let mut keys = Self::default();
        for c in chars.chars() {
            match c.to_ascii_lowercase() {
                'w' => keys.forward = true,
                's' => keys.backward = true,
                'a' => keys.left = true,
                'd' => keys.right = true,
                ' ' => keys.stop = true,
                _ => {}
            }
        }
        keys
    }
}

impl Velocity {
    pub fn new(vx: f32, vy: f32, w: f32) -> Self {
        Self { vx, vy, w }
    }

    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.w == 0.0
    }

    /// Velocity for a key snapshot. Forward wins over backward and left
    /// over right when both are held.
    pub fn from_keys(keys: &DriveKeys, config: &MotionConfig) -> Self {
        if keys.stop {
            log::warn!("Emergency stop key pressed");
            return Self::stopped();
        }

        let vx = if keys.forward {
            config.linear_speed
        } else if keys.backward {
            -config.linear_speed
        } else {
            0.0
        };
        let w = if keys.left {
            config.angular_speed
        } else if keys.right {
            -config.angular_speed
        } else {
            0.0
        };

        Self { vx, vy: 0.0, w }
    }

    /// JSON parameters for the motion command
    pub fn to_params(&self) -> serde_json::Value {
        serde_json::json!({"vx": self.vx, "vy": self.vy, "w": self.w})
    }
}
