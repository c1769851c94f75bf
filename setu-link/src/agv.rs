//! High-level session with one AGV
//!
//! The robot serves control APIs and status APIs on separate ports, so a
//! session holds two clients. Dropping the session sends a best-effort stop
//! before closing both connections.

use crate::client::{RequestClient, SharedClient};
use crate::config::{Config, LaserConfig};
use crate::error::Result;
use crate::motion::Velocity;
use crate::protocol::Api;
use crate::sensors::{AlarmReport, BeamFilter, FilteredScan};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Agv {
    control: SharedClient,
    status: SharedClient,
    laser: LaserConfig,
    filter: BeamFilter,
    shut_down: AtomicBool,
}

impl Agv {
    /// Open the control and status connections described by `config`
    pub fn connect(config: &Config) -> Result<Self> {
        config.validate()?;

        let options = config.connect_options();
        let retry = config.retry_policy();
        let control = RequestClient::connect(config.control_endpoint(), options.clone(), retry)?;
        let status = RequestClient::connect(config.status_endpoint(), options, retry)?;

        Ok(Self::from_clients(
            SharedClient::new(control),
            SharedClient::new(status),
            config,
        ))
    }

    /// Build a session over existing clients
    pub fn from_clients(control: SharedClient, status: SharedClient, config: &Config) -> Self {
        Self {
            control,
            status,
            laser: config.laser.clone(),
            filter: BeamFilter::new(config.beam_filter()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn control(&self) -> &SharedClient {
        &self.control
    }

    pub fn status(&self) -> &SharedClient {
        &self.status
    }

    /// Send one open-loop motion command
    pub fn drive(&self, velocity: &Velocity) -> Result<()> {
        self.control.send(Api::CONTROL_MOTION, &velocity.to_params())?;
        log::debug!(
            "Motion accepted: vx={:.2} vy={:.2} w={:.2}",
            velocity.vx,
            velocity.vy,
            velocity.w
        );
        Ok(())
    }

    /// Stop the robot. Sent once, without retries.
    pub fn stop(&self) -> Result<()> {
        let timeout = self.control.timeout();
        self.control
            .send_request(Api::CONTROL_STOP, &json!({}), 0, timeout)?;
        log::info!("Stop accepted");
        Ok(())
    }

    /// Query one laser scan and filter it
    pub fn laser_scan(&self) -> Result<FilteredScan> {
        let response = self
            .status
            .send(Api::STATUS_LASER, &json!({"step": self.laser.step}))?;
        Ok(self.filter.apply(response.reply.body()))
    }

    /// Query active alarms
    pub fn alarms(&self) -> Result<AlarmReport> {
        let response = self.status.send(Api::STATUS_ALARM, &json!({}))?;
        Ok(AlarmReport::from_body(response.reply.body()))
    }

    /// Stop the robot, then close both connections. Only the first call
    /// does anything; a failed stop is logged, not returned.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Sending stop before closing");
        if let Err(e) = self.stop() {
            log::warn!("Stop on shutdown failed: {}", e);
        }
        self.control.close();
        self.status.close();
        log::info!("Session closed");
    }
}

impl Drop for Agv {
    fn drop(&mut self) {
        self.shutdown();
    }
}
