//! Alarm status report.
//!
//! The status-alarm query answers with three severity lists:
//!
//! ```text
//! { "fatals": [...], "errors": [...], "warnings": [...] }
//! ```
//!
//! Entries are objects keyed by the numeric alarm code (value: timestamp)
//! with an optional `desc`, or bare codes on older firmware.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One active alarm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alarm {
    pub code: Option<u32>,
    pub description: String,
}

impl Alarm {
    fn from_entry(entry: &Value) -> Self {
        match entry {
            Value::Object(map) => {
                let code = map.keys().find_map(|k| k.parse::<u32>().ok());
                let description = map
                    .get("desc")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| entry.to_string());
                Self { code, description }
            }
            Value::Number(n) => Self {
                code: n.as_u64().and_then(|c| u32::try_from(c).ok()),
                description: String::new(),
            },
            Value::String(s) => Self {
                code: s.parse().ok(),
                description: s.clone(),
            },
            other => Self {
                code: None,
                description: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.description.is_empty()) {
            (Some(code), true) => write!(f, "{}", code),
            (Some(code), false) => write!(f, "{} ({})", code, self.description),
            (None, _) => write!(f, "{}", self.description),
        }
    }
}

/// Active alarms grouped by severity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlarmReport {
    pub fatals: Vec<Alarm>,
    pub errors: Vec<Alarm>,
    pub warnings: Vec<Alarm>,
}

impl AlarmReport {
    /// Missing lists count as empty.
    pub fn from_body(body: &Value) -> Self {
        Self {
            fatals: severity(body, "fatals"),
            errors: severity(body, "errors"),
            warnings: severity(body, "warnings"),
        }
    }

    pub fn is_clear(&self) -> bool {
        self.fatals.is_empty() && self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn total(&self) -> usize {
        self.fatals.len() + self.errors.len() + self.warnings.len()
    }

    /// Log each non-empty severity list. Fatals and errors go to `error`,
    /// warnings to `warn`.
    pub fn log(&self) {
        if !self.fatals.is_empty() {
            log::error!("Fatal alarms (needs immediate attention): {}", join(&self.fatals));
        }
        if !self.errors.is_empty() {
            log::error!("Error alarms (function degraded): {}", join(&self.errors));
        }
        if !self.warnings.is_empty() {
            log::warn!("Warning alarms: {}", join(&self.warnings));
        }
        if self.is_clear() {
            log::info!("No active alarms");
        }
    }
}

fn severity(body: &Value, key: &str) -> Vec<Alarm> {
    body.get(key)
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(Alarm::from_entry).collect())
        .unwrap_or_default()
}

fn join(alarms: &[Alarm]) -> String {
    alarms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
