//! Inventory persistence: commit one reconciled sweep.

use chrono::{DateTime, Utc};
use lanwatch_store::InventoryStore;

use crate::error::Result;
use crate::reconcile::Reconciliation;

/// Make a sweep durable: upserts and their device events in one transaction,
/// then the scan summary.
///
/// The store derives the events from what each upsert actually did, so the
/// reconciler's events only serve as the expected outcome. Runs on the
/// blocking pool. Returns the number of devices actually created, which is
/// what the scan log records.
pub async fn commit_sweep(
    store: &InventoryStore,
    reconciliation: Reconciliation,
    subnet: &str,
    now: DateTime<Utc>,
) -> Result<u32> {
    let store = store.clone();
    let subnet = subnet.to_string();

    let created = tokio::task::spawn_blocking(move || -> Result<u32> {
        let created = store.apply_sweep(&reconciliation.upserts)?;

        if created != reconciliation.summary.new_count {
            // Another writer added or purged one of these IPs since the snapshot.
            tracing::warn!(
                subnet = %subnet,
                predicted = reconciliation.summary.new_count,
                created,
                "Inventory changed during sweep"
            );
        }

        store.append_scan_log(&subnet, reconciliation.summary.total_count, created, now)?;
        Ok(created)
    })
    .await??;

    Ok(created)
}

/// Read the whole inventory on the blocking pool.
pub async fn snapshot(store: &InventoryStore) -> Result<Vec<lanwatch_core::Device>> {
    let store = store.clone();
    Ok(tokio::task::spawn_blocking(move || store.list_all()).await??)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use lanwatch_core::{EventType, Observation};

    #[tokio::test]
    async fn test_commit_writes_devices_events_and_scan_log() {
        let store = InventoryStore::in_memory().unwrap();
        let now = Utc::now();
        let obs = vec![Observation::new("10.0.0.5", "aa:bb")];
        let r = reconcile(&obs, "10.0.0.1/20", now, |_| None);

        let created = commit_sweep(&store, r, "10.0.0.1/20", now).await.unwrap();

        assert_eq!(created, 1);
        assert_eq!(snapshot(&store).await.unwrap().len(), 1);
        assert_eq!(store.event_count().unwrap(), 1);
        let log = store.latest_scan().unwrap().unwrap();
        assert_eq!((log.devices_found, log.new_devices), (1, 1));
    }

    #[tokio::test]
    async fn test_stale_prediction_records_actual_creations() {
        let store = InventoryStore::in_memory().unwrap();
        let now = Utc::now();
        let obs = vec![Observation::new("10.0.0.5", "aa:bb")];
        // Snapshot taken before a manual add of the same IP.
        let r = reconcile(&obs, "s", now, |_| None);
        store.add_manual("10.0.0.5", "aa:bb", "", "s", now).unwrap();

        let created = commit_sweep(&store, r, "s", now).await.unwrap();

        assert_eq!(created, 0);
        assert_eq!(store.latest_scan().unwrap().unwrap().new_devices, 0);
        let events: Vec<EventType> = store
            .device_events(10)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(events, vec![EventType::ManualAdd]);
    }

    #[tokio::test]
    async fn test_recreation_after_purge_logs_new_device() {
        let store = InventoryStore::in_memory().unwrap();
        let then = Utc::now() - chrono::Duration::days(60);
        store.add_manual("10.0.0.5", "aa:bb", "", "s", then).unwrap();
        let now = Utc::now();

        // Snapshot still holds the device; a purge lands before the commit.
        let known = store.get("10.0.0.5").unwrap();
        let r = reconcile(&[Observation::new("10.0.0.5", "aa:bb")], "s", now, |_| {
            known.clone()
        });
        assert_eq!(r.summary.new_count, 0);
        assert_eq!(store.purge_before(now - chrono::Duration::days(30)).unwrap(), 1);

        let created = commit_sweep(&store, r, "s", now).await.unwrap();

        assert_eq!(created, 1);
        assert!(store.get("10.0.0.5").unwrap().is_some());
        assert_eq!(store.latest_scan().unwrap().unwrap().new_devices, 1);
        let events = store.device_events(10).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == EventType::NewDevice && e.ip == "10.0.0.5"));
    }
}
