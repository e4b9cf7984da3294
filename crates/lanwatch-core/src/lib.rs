//! lanwatch-core: Shared record types for the lanwatch device inventory.
//!
//! This crate provides the foundational types used across all lanwatch components:
//! - Device records and raw sweep observations
//! - Upsert operations produced by reconciliation
//! - Audit records (scan summaries, device events)
//! - Timestamp encoding shared by the store and the control surface

pub mod events;
pub mod types;

pub use events::{DeviceEvent, EventType, ScanLogEntry};
pub use types::{Device, InventoryStats, Observation, SubnetStat, UpsertOp};
