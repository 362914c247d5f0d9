//! SlotPermit - RAII ownership of one lane.

use super::SlotPool;
use super::slots::Lease;
use crate::record::SlotIndex;

/// Proof that a lane is held. The lane returns to the pool on drop.
///
/// Dropping is the only way to release, which covers every exit path of the
/// holder: normal return, error, panic, or the holding future being abandoned.
#[must_use = "dropping a SlotPermit releases its slot immediately"]
pub struct SlotPermit<'a> {
    pool: &'a SlotPool,
    lease: Lease,
}

impl<'a> SlotPermit<'a> {
    pub(super) fn new(pool: &'a SlotPool, lease: Lease) -> Self {
        Self { pool, lease }
    }

    pub fn index(&self) -> SlotIndex {
        self.lease.index
    }

    #[cfg(test)]
    pub(super) fn lease(&self) -> Lease {
        self.lease
    }
}

impl std::fmt::Debug for SlotPermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPermit")
            .field("index", &self.lease.index)
            .finish()
    }
}

impl Drop for SlotPermit<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.pool.release(self.lease) {
            tracing::error!(slot = %self.lease.index, error = %e, "Failed to release slot");
        }
    }
}
