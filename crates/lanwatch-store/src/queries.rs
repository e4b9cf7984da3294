//! Read operations over the inventory and audit tables.

use rusqlite::{OptionalExtension, Row};

use lanwatch_core::{Device, DeviceEvent, InventoryStats, ScanLogEntry, SubnetStat};

use crate::client::{ts_column, InventoryStore, Result};

const DEVICE_COLUMNS: &str = "ip, mac, name, subnet, first_seen, last_seen";

/// Number of devices reported in `InventoryStats::recent_devices`.
pub const RECENT_DEVICE_LIMIT: usize = 5;

impl InventoryStore {
    // ── Devices ──────────────────────────────────────────────────

    /// Point lookup by IP.
    pub fn get(&self, ip: &str) -> Result<Option<Device>> {
        let conn = self.lock()?;
        let device = conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE ip = ?1"),
                [ip],
                device_from_row,
            )
            .optional()?;
        Ok(device)
    }

    /// All devices ordered by IP ascending.
    pub fn list_all(&self) -> Result<Vec<Device>> {
        self.collect_devices(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY ip"),
            None,
        )
    }

    /// Most recently discovered devices, newest `first_seen` first.
    pub fn recent_devices(&self, limit: usize) -> Result<Vec<Device>> {
        self.collect_devices(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY first_seen DESC, ip LIMIT ?1"),
            Some(limit as i64),
        )
    }

    fn collect_devices(&self, sql: &str, limit: Option<i64>) -> Result<Vec<Device>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match limit {
            Some(n) => stmt.query_map([n], device_from_row)?,
            None => stmt.query_map([], device_from_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Counts ───────────────────────────────────────────────────

    pub fn device_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM devices")
    }

    pub fn scan_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM scan_logs")
    }

    pub fn event_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM device_logs")
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Device counts per subnet label, largest first.
    pub fn subnet_stats(&self) -> Result<Vec<SubnetStat>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT subnet, COUNT(*) AS device_count FROM devices
             GROUP BY subnet ORDER BY device_count DESC, subnet",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubnetStat {
                subnet: row.get(0)?,
                device_count: row.get::<_, i64>(1)? as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Audit Logs ───────────────────────────────────────────────

    /// Newest scan summary, if any sweep has completed.
    pub fn latest_scan(&self) -> Result<Option<ScanLogEntry>> {
        Ok(self.scan_logs(1)?.into_iter().next())
    }

    /// Scan summaries, newest first.
    pub fn scan_logs(&self, limit: usize) -> Result<Vec<ScanLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, subnet, devices_found, new_devices FROM scan_logs
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(ScanLogEntry {
                timestamp: ts_column(row, 0)?,
                subnet: row.get(1)?,
                devices_found: row.get(2)?,
                new_devices: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Device events, newest first.
    pub fn device_events(&self, limit: usize) -> Result<Vec<DeviceEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, ip, mac, event_type FROM device_logs
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(DeviceEvent {
                timestamp: ts_column(row, 0)?,
                ip: row.get(1)?,
                mac: row.get(2)?,
                event_type: row.get::<_, String>(3)?.into(),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Aggregate view for dashboards and the `stats` command.
    pub fn stats(&self) -> Result<InventoryStats> {
        Ok(InventoryStats {
            device_count: self.device_count()?,
            scan_count: self.scan_count()?,
            event_count: self.event_count()?,
            latest_scan: self.latest_scan()?,
            recent_devices: self.recent_devices(RECENT_DEVICE_LIMIT)?,
            subnet_stats: self.subnet_stats()?,
        })
    }
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        ip: row.get(0)?,
        mac: row.get(1)?,
        name: row.get(2)?,
        subnet: row.get(3)?,
        first_seen: ts_column(row, 4)?,
        last_seen: ts_column(row, 5)?,
    })
}
