//! lanwatch-discover: ARP sweep daemon for the lanwatch device inventory.
//!
//! Sweeps the current scan target with arp-scan, reconciles the responders
//! against the SQLite inventory, and records a scan summary plus per-device
//! events for every cycle.

pub mod arp_output;
pub mod config;
pub mod control;
pub mod error;
pub mod persist;
pub mod reconcile;
pub mod scanner;
pub mod scheduler;
pub mod target;
