//! Write operations for the inventory.
//!
//! Scan-driven upserts touch only `mac` and `last_seen`; operator edits touch
//! only `name` and `subnet`. Each statement writes just its own columns, so
//! the two kinds of update commute under the store's serialization.
//!
//! Sweep events (`NEW_DEVICE`, `MAC_CHANGED`) are derived here from what each
//! upsert actually did, inside the same transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use lanwatch_core::types::format_timestamp;
use lanwatch_core::{DeviceEvent, EventType, UpsertOp};

use crate::client::{InventoryStore, Result};

impl InventoryStore {
    // ── Device Upserts ───────────────────────────────────────────

    /// Insert or update a device keyed by IP.
    ///
    /// Returns `true` when the IP was newly created. The existence check and
    /// the write share one transaction.
    pub fn upsert(&self, op: &UpsertOp) -> Result<bool> {
        self.write(|tx| Ok(upsert_in(tx, op)?.created))
    }

    /// Apply every upsert of one sweep atomically.
    ///
    /// Logs `NEW_DEVICE` for each row created and `MAC_CHANGED` for each row
    /// whose mac was replaced. Returns the number of IPs actually created.
    pub fn apply_sweep(&self, upserts: &[UpsertOp]) -> Result<u32> {
        self.write(|tx| {
            let mut created = 0u32;
            for op in upserts {
                let applied = upsert_in(tx, op)?;
                if applied.created {
                    created += 1;
                    append_event_in(
                        tx,
                        &DeviceEvent::new(EventType::NewDevice, &op.ip, &op.mac, op.seen_at),
                    )?;
                } else if let Some(previous) = applied.replaced_mac {
                    tracing::info!(ip = %op.ip, previous = %previous, mac = %op.mac, "MAC changed");
                    append_event_in(
                        tx,
                        &DeviceEvent::new(EventType::MacChanged, &op.ip, &op.mac, op.seen_at),
                    )?;
                }
            }
            Ok(created)
        })
    }

    /// Operator insert. Logs `MANUAL_ADD` when the IP is new; otherwise
    /// overwrites mac, name and subnet and advances `last_seen`.
    pub fn add_manual(
        &self,
        ip: &str,
        mac: &str,
        name: &str,
        subnet: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let ts = format_timestamp(&now);
        self.write(|tx| {
            if device_exists(tx, ip)? {
                tx.execute(
                    "UPDATE devices
                     SET mac = ?2, name = ?3, subnet = ?4, last_seen = MAX(last_seen, ?5)
                     WHERE ip = ?1",
                    params![ip, mac, name, subnet, ts],
                )?;
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO devices (ip, mac, name, subnet, first_seen, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![ip, mac, name, subnet, ts],
            )?;
            append_event_in(tx, &DeviceEvent::new(EventType::ManualAdd, ip, mac, now))?;
            Ok(true)
        })
    }

    /// Partial update of the operator-owned fields.
    ///
    /// Returns `false` when the IP is unknown. Never touches `mac`,
    /// `first_seen` or `last_seen`.
    pub fn edit(&self, ip: &str, name: Option<&str>, subnet: Option<&str>) -> Result<bool> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE devices
                 SET name = COALESCE(?2, name), subnet = COALESCE(?3, subnet)
                 WHERE ip = ?1",
                params![ip, name, subnet],
            )?;
            Ok(changed > 0)
        })
    }

    // ── Audit Logs ───────────────────────────────────────────────

    /// Append one scan summary.
    pub fn append_scan_log(
        &self,
        subnet: &str,
        devices_found: u32,
        new_devices: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO scan_logs (timestamp, subnet, devices_found, new_devices)
                 VALUES (?1, ?2, ?3, ?4)",
                params![format_timestamp(&timestamp), subnet, devices_found, new_devices],
            )?;
            Ok(())
        })
    }

    /// Append one device event.
    pub fn append_device_event(
        &self,
        ip: &str,
        mac: &str,
        event_type: EventType,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let event = DeviceEvent::new(event_type, ip, mac, timestamp);
        self.write(|tx| append_event_in(tx, &event))
    }

    // ── Retention ────────────────────────────────────────────────

    /// Delete every device with `last_seen < cutoff`, logging one `PURGED`
    /// event per removed device. All or nothing.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_ts = format_timestamp(&cutoff);
        let now = Utc::now();

        let removed = self.write(|tx| {
            let doomed: Vec<(String, String)> = {
                let mut stmt = tx.prepare("SELECT ip, mac FROM devices WHERE last_seen < ?1")?;
                let rows = stmt.query_map([&cutoff_ts], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            tx.execute("DELETE FROM devices WHERE last_seen < ?1", [&cutoff_ts])?;
            for (ip, mac) in &doomed {
                append_event_in(tx, &DeviceEvent::new(EventType::Purged, ip, mac, now))?;
            }
            Ok(doomed.len() as u64)
        })?;

        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff_ts, "Purged devices not seen since cutoff");
        }
        Ok(removed)
    }
}

fn device_exists(conn: &Connection, ip: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM devices WHERE ip = ?1)",
        [ip],
        |row| row.get(0),
    )
}

/// What a single upsert did to its row.
struct Applied {
    created: bool,
    /// The mac that was overwritten, when it differed from the new one.
    replaced_mac: Option<String>,
}

fn upsert_in(conn: &Connection, op: &UpsertOp) -> Result<Applied> {
    let seen = format_timestamp(&op.seen_at);

    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT mac, last_seen FROM devices WHERE ip = ?1",
            [&op.ip],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((mac, last_seen)) = existing else {
        conn.execute(
            "INSERT INTO devices (ip, mac, name, subnet, first_seen, last_seen)
             VALUES (?1, ?2, '', ?3, ?4, ?4)",
            params![op.ip, op.mac, op.subnet, seen],
        )?;
        return Ok(Applied {
            created: true,
            replaced_mac: None,
        });
    };

    // An observation older than last_seen changes nothing.
    if seen < last_seen {
        return Ok(Applied {
            created: false,
            replaced_mac: None,
        });
    }

    conn.execute(
        "UPDATE devices SET mac = ?2, last_seen = ?3 WHERE ip = ?1",
        params![op.ip, op.mac, seen],
    )?;
    Ok(Applied {
        created: false,
        replaced_mac: (mac != op.mac).then_some(mac),
    })
}

fn append_event_in(conn: &Connection, event: &DeviceEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO device_logs (timestamp, ip, mac, event_type) VALUES (?1, ?2, ?3, ?4)",
        params![
            format_timestamp(&event.timestamp),
            event.ip,
            event.mac,
            event.event_type.as_str()
        ],
    )?;
    Ok(())
}
