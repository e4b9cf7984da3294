//! Core domain types for the device inventory.
//!
//! A device is keyed by its IP address. The MAC is informational and may
//! appear under several historical IPs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::events::ScanLogEntry;

// ── Devices ───────────────────────────────────────────────────────

/// A device in the persistent inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub ip: String,
    pub mac: String,
    /// Friendly name, empty until someone sets one.
    pub name: String,
    /// Subnet specifier the device was first observed under, or set by edit.
    pub subnet: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// One responder from a sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Observation {
    pub ip: String,
    pub mac: String,
}

impl Observation {
    pub fn new(ip: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: mac.into(),
        }
    }
}

/// Insert-or-update keyed by IP.
///
/// When the IP is absent the store creates the record with `subnet`,
/// an empty name and `first_seen = last_seen = seen_at`. When present only
/// `mac` and `last_seen` are written; `subnet` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpsertOp {
    pub ip: String,
    pub mac: String,
    pub subnet: String,
    pub seen_at: DateTime<Utc>,
}

// ── Aggregates ────────────────────────────────────────────────────

/// Device count for one subnet label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubnetStat {
    pub subnet: String,
    pub device_count: u64,
}

/// Derived read over the inventory and the audit tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryStats {
    pub device_count: u64,
    pub scan_count: u64,
    pub event_count: u64,
    pub latest_scan: Option<ScanLogEntry>,
    /// Most recently discovered devices, newest first.
    pub recent_devices: Vec<Device>,
    /// Ordered by device count descending.
    pub subnet_stats: Vec<SubnetStat>,
}

// ── Timestamps ────────────────────────────────────────────────────

/// Encode a timestamp as fixed-width RFC 3339 (microseconds, `Z` suffix).
///
/// Fixed width keeps lexical order equal to chronological order, which the
/// store relies on for `last_seen < cutoff` comparisons.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a timestamp written by [`format_timestamp`] (any RFC 3339 offset is accepted).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
