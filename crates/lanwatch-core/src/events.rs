//! Audit records: per-sweep scan summaries and per-device events.
//!
//! Both are append-only. `DeviceEvent::ip` is informational; events outlive
//! the device they describe after a purge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of device event. Stored as its SCREAMING_SNAKE name.
///
/// Unknown names read back from storage are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// First sighting of an IP by a sweep.
    NewDevice,
    /// Inserted by an operator rather than a sweep.
    ManualAdd,
    /// Removed by the retention purge.
    Purged,
    /// A known IP answered with a different MAC.
    MacChanged,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewDevice => "NEW_DEVICE",
            Self::ManualAdd => "MANUAL_ADD",
            Self::Purged => "PURGED",
            Self::MacChanged => "MAC_CHANGED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NEW_DEVICE" => Self::NewDevice,
            "MANUAL_ADD" => Self::ManualAdd,
            "PURGED" => Self::Purged,
            "MAC_CHANGED" => Self::MacChanged,
            _ => Self::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(e: EventType) -> Self {
        e.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the device event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceEvent {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub mac: String,
    pub event_type: EventType,
}

impl DeviceEvent {
    pub fn new(
        event_type: EventType,
        ip: impl Into<String>,
        mac: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            ip: ip.into(),
            mac: mac.into(),
            event_type,
        }
    }
}

/// Summary of one completed sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanLogEntry {
    pub timestamp: DateTime<Utc>,
    pub subnet: String,
    pub devices_found: u32,
    pub new_devices: u32,
}
