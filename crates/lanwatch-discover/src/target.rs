//! The scan target: the subnet specifier the next sweep will use.

use std::sync::{Arc, Mutex, MutexGuard};

/// Shared, mutex-guarded scan target.
///
/// The scan loop reads a snapshot at the start of each cycle; the control
/// surface may replace it at any time. The lock is only held to copy the
/// string in or out, never across I/O. Clone shares the same cell.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    inner: Arc<Mutex<String>>,
}

impl ScanTarget {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial.into())),
        }
    }

    /// Snapshot of the current target.
    pub fn get(&self) -> String {
        self.lock().clone()
    }

    /// Replace the target; takes effect at the next cycle boundary.
    /// Returns the previous value.
    pub fn set(&self, subnet: impl Into<String>) -> String {
        std::mem::replace(&mut *self.lock(), subnet.into())
    }

    // A String cannot be left half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, String> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
