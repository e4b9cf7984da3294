//! Reconciliation: classify a sweep's observations against the inventory.
//!
//! Pure logic. The only view of the inventory is the lookup closure passed
//! in, so tests can drive it with a plain map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lanwatch_core::{Device, DeviceEvent, EventType, Observation, UpsertOp};

/// How an observed IP relates to the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// Not in the inventory; the upsert creates it.
    New,
    /// Already known; the upsert refreshes mac and last_seen.
    Seen,
}

/// The outcome of reconciling one sweep.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// One upsert per distinct IP, in first-appearance order.
    pub upserts: Vec<UpsertOp>,
    /// Classification for each entry of `upserts`, index-aligned.
    pub sightings: Vec<Sighting>,
    /// Events this sweep is expected to log. The store logs the ones that
    /// match what the commit actually did.
    pub events: Vec<DeviceEvent>,
    pub summary: ReconcileSummary,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Raw observation count, duplicates included.
    pub total_count: u32,
    /// Distinct IPs that will be created.
    pub new_count: u32,
    /// Known IPs whose MAC differs from the inventory.
    pub mac_changed_count: u32,
}

/// Merge a fresh observation set into inventory mutations.
///
/// Duplicate IPs within one sweep collapse to their last occurrence. A known
/// IP answering with a different MAC stays an update and additionally yields
/// a `MAC_CHANGED` event.
pub fn reconcile<F>(
    observations: &[Observation],
    subnet: &str,
    now: DateTime<Utc>,
    lookup: F,
) -> Reconciliation
where
    F: Fn(&str) -> Option<Device>,
{
    // Last write wins, first appearance fixes the position.
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &str> = HashMap::new();
    for obs in observations {
        if latest.insert(obs.ip.as_str(), obs.mac.as_str()).is_none() {
            order.push(obs.ip.as_str());
        }
    }

    let mut result = Reconciliation {
        summary: ReconcileSummary {
            total_count: observations.len() as u32,
            ..Default::default()
        },
        ..Default::default()
    };

    for ip in order {
        let mac = latest[ip];

        let sighting = match lookup(ip) {
            None => {
                result.summary.new_count += 1;
                result
                    .events
                    .push(DeviceEvent::new(EventType::NewDevice, ip, mac, now));
                Sighting::New
            }
            Some(existing) => {
                if existing.mac != mac {
                    result.summary.mac_changed_count += 1;
                    result
                        .events
                        .push(DeviceEvent::new(EventType::MacChanged, ip, mac, now));
                }
                Sighting::Seen
            }
        };

        result.upserts.push(UpsertOp {
            ip: ip.to_string(),
            mac: mac.to_string(),
            subnet: subnet.to_string(),
            seen_at: now,
        });
        result.sightings.push(sighting);
    }

    result
}
