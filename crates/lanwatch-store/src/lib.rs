//! lanwatch-store: SQLite inventory for discovered devices.
//!
//! This crate is the single mutation point for the device inventory and its
//! audit tables. Every write flows through one connection and runs in an
//! IMMEDIATE transaction, so check-then-act sequences cannot interleave.

pub mod client;
pub mod mutations;
pub mod queries;

pub use client::{InventoryStore, StoreError};
