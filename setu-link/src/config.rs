//! Configuration loading for SetuLink
//!
//! Every field has a default, so an empty file (or no file) yields a usable
//! configuration for the factory robot address.

use crate::client::RetryPolicy;
use crate::error::{Error, Result};
use crate::sensors::BeamFilterConfig;
use crate::transport::{ConnectOptions, Endpoint};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub laser: LaserConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network connection settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Robot IP address (default: 192.168.1.121)
    #[serde(default = "default_robot_ip")]
    pub robot_ip: String,

    /// Control API port: motion, stop (default: 19205)
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// Status API port: laser, alarms (default: 19204)
    #[serde(default = "default_status_port")]
    pub status_port: u16,

    /// Connect, send and receive timeout in milliseconds (default: 5000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Enable TCP keep-alive (default: true)
    #[serde(default = "default_keepalive")]
    pub keepalive: bool,

    /// Connect attempts before giving up (default: 3)
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Pause between connect attempts in milliseconds (default: 3000)
    #[serde(default = "default_connect_retry_delay")]
    pub connect_retry_delay_ms: u64,
}

/// Request retry settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestConfig {
    /// Retries after a transport failure (default: 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between attempts in milliseconds (default: 500)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

/// Laser query and filter settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LaserConfig {
    /// Beam sampling step sent with the query, 0 = every beam (default: 1)
    #[serde(default = "default_step")]
    pub step: u32,

    /// Minimum accepted distance in meters (default: 0.1)
    #[serde(default = "default_range_min")]
    pub range_min: f64,

    /// Maximum accepted distance in meters (default: 5.0)
    #[serde(default = "default_range_max")]
    pub range_max: f64,

    /// Field of view in radians (default: 2π)
    #[serde(default = "default_fov")]
    pub fov: f32,

    /// Scan polling rate in Hz (default: 10)
    #[serde(default = "default_poll_hz")]
    pub poll_hz: u32,
}

/// Manual drive settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MotionConfig {
    /// Forward/backward speed in m/s (default: 0.2)
    #[serde(default = "default_linear_speed")]
    pub linear_speed: f32,

    /// Turn rate in rad/s (default: 0.8)
    #[serde(default = "default_angular_speed")]
    pub angular_speed: f32,

    /// Motion command repeat rate in Hz (default: 2)
    #[serde(default = "default_command_hz")]
    pub command_hz: u32,
}

/// Logging configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log filter (trace, debug, info, warn, error); RUST_LOG wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            robot_ip: default_robot_ip(),
            control_port: default_control_port(),
            status_port: default_status_port(),
            timeout_ms: default_timeout(),
            keepalive: default_keepalive(),
            connect_attempts: default_connect_attempts(),
            connect_retry_delay_ms: default_connect_retry_delay(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            range_min: default_range_min(),
            range_max: default_range_max(),
            fov: default_fov(),
            poll_hz: default_poll_hz(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            linear_speed: default_linear_speed(),
            angular_speed: default_angular_speed(),
            command_hz: default_command_hz(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_robot_ip() -> String {
    "192.168.1.121".to_string()
}
fn default_control_port() -> u16 {
    19205
}
fn default_status_port() -> u16 {
    19204
}
fn default_timeout() -> u64 {
    5000
}
fn default_keepalive() -> bool {
    true
}
fn default_connect_attempts() -> u32 {
    3
}
fn default_connect_retry_delay() -> u64 {
    3000
}
fn default_max_retries() -> u32 {
    1
}
fn default_retry_delay() -> u64 {
    500
}

// Laser defaults
fn default_step() -> u32 {
    1
}
fn default_range_min() -> f64 {
    0.1
}
fn default_range_max() -> f64 {
    5.0
}
fn default_fov() -> f32 {
    std::f32::consts::TAU
}
fn default_poll_hz() -> u32 {
    10
}

// Motion defaults
fn default_linear_speed() -> f32 {
    0.2
}
fn default_angular_speed() -> f32 {
    0.8
}
fn default_command_hz() -> u32 {
    2
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the robot or the filter cannot work with
    pub fn validate(&self) -> Result<()> {
        let conn = &self.connection;
        if conn.robot_ip.trim().is_empty() {
            return Err(Error::Config("connection.robot_ip is empty".into()));
        }
        if conn.control_port == 0 || conn.status_port == 0 {
            return Err(Error::Config(format!(
                "invalid port (control={}, status={})",
                conn.control_port, conn.status_port
            )));
        }
        if conn.timeout_ms == 0 {
            return Err(Error::Config("connection.timeout_ms must be > 0".into()));
        }
        if conn.connect_attempts == 0 {
            return Err(Error::Config(
                "connection.connect_attempts must be >= 1".into(),
            ));
        }

        let laser = &self.laser;
        if laser.step > 100 {
            return Err(Error::Config(format!(
                "laser.step {} outside 0..=100",
                laser.step
            )));
        }
        if !(0.01 <= laser.range_min && laser.range_min < laser.range_max && laser.range_max <= 20.0)
        {
            return Err(Error::Config(format!(
                "laser range invalid (min={}, max={}); need 0.01 <= min < max <= 20.0",
                laser.range_min, laser.range_max
            )));
        }
        if !(1..=50).contains(&laser.poll_hz) {
            return Err(Error::Config(format!(
                "laser.poll_hz {} outside 1..=50",
                laser.poll_hz
            )));
        }

        if !(1..=50).contains(&self.motion.command_hz) {
            return Err(Error::Config(format!(
                "motion.command_hz {} outside 1..=50",
                self.motion.command_hz
            )));
        }
        Ok(())
    }

    pub fn control_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.connection.robot_ip, self.connection.control_port)
    }

    pub fn status_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.connection.robot_ip, self.connection.status_port)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timeout: Duration::from_millis(self.connection.timeout_ms),
            keepalive: self.connection.keepalive,
            attempts: self.connection.connect_attempts,
            retry_delay: Duration::from_millis(self.connection.connect_retry_delay_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.request.max_retries,
            delay: Duration::from_millis(self.request.retry_delay_ms),
        }
    }

    pub fn beam_filter(&self) -> BeamFilterConfig {
        BeamFilterConfig {
            range_min: self.laser.range_min,
            range_max: self.laser.range_max,
        }
    }
}
