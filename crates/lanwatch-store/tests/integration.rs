//! Integration tests for lanwatch-store against real SQLite databases.
//!
//! Most tests use an in-memory store; the persistence and multi-connection
//! tests use a temporary file.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};

use lanwatch_core::{EventType, UpsertOp};
use lanwatch_store::InventoryStore;

const SUBNET: &str = "10.0.0.1/20";

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()
}

fn sighting(ip: &str, mac: &str, seen_at: DateTime<Utc>) -> UpsertOp {
    UpsertOp {
        ip: ip.to_string(),
        mac: mac.to_string(),
        subnet: SUBNET.to_string(),
        seen_at,
    }
}

#[test]
fn test_upsert_creates_then_updates() {
    let store = InventoryStore::in_memory().unwrap();

    assert!(store.upsert(&sighting("10.0.0.5", "aa:bb", at(1))).unwrap());
    assert!(!store.upsert(&sighting("10.0.0.5", "cc:dd", at(2))).unwrap());

    let device = store.get("10.0.0.5").unwrap().unwrap();
    assert_eq!(device.mac, "cc:dd");
    assert_eq!(device.subnet, SUBNET);
    assert_eq!(device.name, "");
    assert_eq!(device.first_seen, at(1));
    assert_eq!(device.last_seen, at(2));
}

#[test]
fn test_reobservation_never_moves_subnet_or_first_seen() {
    let store = InventoryStore::in_memory().unwrap();
    store.upsert(&sighting("10.0.0.5", "aa:bb", at(1))).unwrap();
    store.edit("10.0.0.5", Some("printer"), Some("lab")).unwrap();

    for minute in 2..10 {
        let mut op = sighting("10.0.0.5", "aa:bb", at(minute));
        op.subnet = "192.168.0.0/24".to_string();
        store.upsert(&op).unwrap();

        let device = store.get("10.0.0.5").unwrap().unwrap();
        assert_eq!(device.first_seen, at(1));
        assert_eq!(device.last_seen, at(minute));
        assert_eq!(device.subnet, "lab");
        assert_eq!(device.name, "printer");
    }
}

#[test]
fn test_edit_unknown_ip_returns_false() {
    let store = InventoryStore::in_memory().unwrap();
    assert!(!store.edit("10.9.9.9", Some("ghost"), None).unwrap());
    assert!(store.get("10.9.9.9").unwrap().is_none());
}

#[test]
fn test_edit_only_touches_operator_fields() {
    let store = InventoryStore::in_memory().unwrap();
    store.upsert(&sighting("10.0.0.7", "aa:bb", at(1))).unwrap();
    store.upsert(&sighting("10.0.0.7", "aa:bb", at(4))).unwrap();

    assert!(store.edit("10.0.0.7", Some("nas"), None).unwrap());
    let device = store.get("10.0.0.7").unwrap().unwrap();
    assert_eq!(device.name, "nas");
    assert_eq!(device.subnet, SUBNET);
    assert_eq!(device.mac, "aa:bb");
    assert_eq!(device.first_seen, at(1));
    assert_eq!(device.last_seen, at(4));

    assert!(store.edit("10.0.0.7", None, Some("storage")).unwrap());
    let device = store.get("10.0.0.7").unwrap().unwrap();
    assert_eq!(device.name, "nas");
    assert_eq!(device.subnet, "storage");
}

#[test]
fn test_concurrent_edit_and_upsert_keep_both_fields() {
    for round in 0..20 {
        let store = InventoryStore::in_memory().unwrap();
        store.upsert(&sighting("10.0.0.9", "old", at(0))).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let editor = {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.edit("10.0.0.9", Some("x"), None).unwrap()
            })
        };
        let scanner = {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.upsert(&sighting("10.0.0.9", "M", at(30))).unwrap()
            })
        };

        assert!(editor.join().unwrap(), "round {round}");
        assert!(!scanner.join().unwrap(), "round {round}");

        let device = store.get("10.0.0.9").unwrap().unwrap();
        assert_eq!(device.name, "x", "round {round}");
        assert_eq!(device.mac, "M", "round {round}");
        assert_eq!(device.last_seen, at(30), "round {round}");
    }
}

#[test]
fn test_concurrent_upserts_create_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.db");
    // Separate handles mean separate connections, like the daemon and the CLI.
    let stores: Vec<InventoryStore> = (0..4).map(|_| InventoryStore::open(&path).unwrap()).collect();

    let barrier = Arc::new(Barrier::new(stores.len()));
    let handles: Vec<_> = stores
        .into_iter()
        .enumerate()
        .map(|(i, store)| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .upsert(&sighting("10.0.0.20", &format!("mac-{i}"), at(i as u32)))
                    .unwrap()
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(created, 1);

    let store = InventoryStore::open(&path).unwrap();
    assert_eq!(store.device_count().unwrap(), 1);
}

#[test]
fn test_list_all_orders_by_ip() {
    let store = InventoryStore::in_memory().unwrap();
    for ip in ["10.0.0.30", "10.0.0.10", "10.0.0.20"] {
        store.upsert(&sighting(ip, "aa", at(1))).unwrap();
    }

    let ips: Vec<String> = store.list_all().unwrap().into_iter().map(|d| d.ip).collect();
    assert_eq!(ips, vec!["10.0.0.10", "10.0.0.20", "10.0.0.30"]);
}

#[test]
fn test_apply_sweep_writes_devices_and_events() {
    let store = InventoryStore::in_memory().unwrap();
    store.upsert(&sighting("10.0.0.1", "aa", at(0))).unwrap();

    let ops = vec![sighting("10.0.0.1", "aa", at(5)), sighting("10.0.0.2", "bb", at(5))];

    let created = store.apply_sweep(&ops).unwrap();
    assert_eq!(created, 1);
    assert_eq!(store.device_count().unwrap(), 2);

    let logged = store.device_events(10).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].event_type, EventType::NewDevice);
    assert_eq!(logged[0].ip, "10.0.0.2");
}

#[test]
fn test_add_manual_logs_only_on_create() {
    let store = InventoryStore::in_memory().unwrap();

    assert!(store.add_manual("10.0.0.40", "aa", "tv", "home", at(1)).unwrap());
    assert!(!store.add_manual("10.0.0.40", "bb", "tv2", "den", at(2)).unwrap());

    let device = store.get("10.0.0.40").unwrap().unwrap();
    assert_eq!(device.mac, "bb");
    assert_eq!(device.name, "tv2");
    assert_eq!(device.subnet, "den");
    assert_eq!(device.first_seen, at(1));
    assert_eq!(device.last_seen, at(2));

    let events = store.device_events(10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::ManualAdd);
}

#[test]
fn test_scan_logs_newest_first() {
    let store = InventoryStore::in_memory().unwrap();
    store.append_scan_log("a", 3, 3, at(1)).unwrap();
    store.append_scan_log("b", 0, 0, at(2)).unwrap();

    let logs = store.scan_logs(10).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].subnet, "b");
    assert_eq!(logs[0].devices_found, 0);
    assert_eq!(logs[1].new_devices, 3);
    assert_eq!(store.latest_scan().unwrap().unwrap().subnet, "b");
}

#[test]
fn test_stats_aggregate() {
    let store = InventoryStore::in_memory().unwrap();
    for i in 0..7u32 {
        let mut op = sighting(&format!("10.0.0.{}", 100 + i), "aa", at(i));
        if i >= 5 {
            op.subnet = "192.168.1.0/24".to_string();
        }
        store.upsert(&op).unwrap();
    }
    store.append_scan_log(SUBNET, 7, 7, at(10)).unwrap();
    store
        .append_device_event("10.0.0.100", "aa", EventType::NewDevice, at(0))
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.device_count, 7);
    assert_eq!(stats.scan_count, 1);
    assert_eq!(stats.event_count, 1);
    assert_eq!(stats.recent_devices.len(), 5);
    assert_eq!(stats.recent_devices[0].ip, "10.0.0.106");
    assert_eq!(stats.subnet_stats[0].subnet, SUBNET);
    assert_eq!(stats.subnet_stats[0].device_count, 5);
    assert_eq!(stats.subnet_stats[1].device_count, 2);
    assert_eq!(stats.latest_scan.unwrap().devices_found, 7);
}

#[test]
fn test_purge_keeps_events_for_removed_devices() {
    let store = InventoryStore::in_memory().unwrap();
    store.upsert(&sighting("10.0.0.1", "aa", at(0))).unwrap();
    store.upsert(&sighting("10.0.0.2", "bb", at(50))).unwrap();

    let removed = store.purge_before(at(50) - Duration::minutes(1)).unwrap();
    assert_eq!(removed, 1);
    assert!(store.get("10.0.0.1").unwrap().is_none());
    assert!(store.get("10.0.0.2").unwrap().is_some());

    let events = store.device_events(10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Purged);
    assert_eq!(events[0].ip, "10.0.0.1");
    assert_eq!(events[0].mac, "aa");
}

#[test]
fn test_reopen_preserves_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("inventory.db");

    {
        let store = InventoryStore::open(&path).unwrap();
        store.upsert(&sighting("10.0.0.5", "aa:bb", at(1))).unwrap();
        store.append_scan_log(SUBNET, 1, 1, at(1)).unwrap();
    }

    let store = InventoryStore::open(&path).unwrap();
    let device = store.get("10.0.0.5").unwrap().unwrap();
    assert_eq!(device.first_seen, at(1));
    assert_eq!(store.scan_count().unwrap(), 1);
}
