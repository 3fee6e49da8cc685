//! Single-flight gate for network-mutating operations.

use std::sync::atomic::{AtomicBool, Ordering};

/// Busy flag admitting at most one mutating call at a time.
///
/// A second caller is turned away rather than queued.
#[derive(Debug, Default)]
pub struct MutationGate {
    busy: AtomicBool,
}

impl MutationGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the gate. Returns `None` while another call holds it.
    ///
    /// The gate reopens when the guard drops, including when the owning
    /// future is dropped mid-flight.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    /// Whether a call is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the gate closed until dropped.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a MutationGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
