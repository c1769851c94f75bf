//! API identifiers used by this client
//!
//! Every request names an API number. Status queries are answered with a
//! frame whose type field is `api + 10000`; control commands are answered
//! with a `ret_code` body.

/// How a response to an API is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    /// Control command, acknowledged with `ret_code`
    Command,
    /// Status query, identified by the response type code
    Query,
}

/// Offset between a request number and its response type code
pub const RESPONSE_TYPE_OFFSET: u16 = 10_000;

/// An API number together with its response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Api {
    pub id: u16,
    pub kind: ApiKind,
}

impl Api {
    /// Laser beam query (`robot_status_laser_req`)
    pub const STATUS_LASER: Api = Api::query(1009);
    /// Alarm query (`robot_status_alarm_req`)
    pub const STATUS_ALARM: Api = Api::query(1050);
    /// Stop open-loop motion (`robot_control_stop_req`)
    pub const CONTROL_STOP: Api = Api::command(2000);
    /// Open-loop velocity command (`robot_control_motion_req`)
    pub const CONTROL_MOTION: Api = Api::command(2010);

    pub const fn command(id: u16) -> Self {
        Self {
            id,
            kind: ApiKind::Command,
        }
    }

    pub const fn query(id: u16) -> Self {
        Self {
            id,
            kind: ApiKind::Query,
        }
    }

    /// Type code the device stamps on the response frame
    pub const fn response_type(&self) -> u16 {
        self.id.wrapping_add(RESPONSE_TYPE_OFFSET)
    }
}

impl std::fmt::Display for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
