//! SlotPool implementation.
//!
//! All pool state (free lanes, current leases and the waiter queue) lives behind
//! one mutex that is never held across an await point. Waiters park on a oneshot
//! receiver; release hands the lane straight to the oldest live waiter instead of
//! marking it free.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use super::SlotPermit;
use crate::error::{Result, SlotError};
use crate::record::SlotIndex;

/// One grant of a lane. Only the current lease of a lane can release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lease {
    pub(crate) index: SlotIndex,
    id: u64,
}

struct PoolState {
    /// Ordered so the lowest free lane is issued first.
    free: BTreeSet<SlotIndex>,
    /// Current lease id per lane, `None` while the lane is free.
    leases: Vec<Option<u64>>,
    next_lease: u64,
    waiting: VecDeque<oneshot::Sender<Lease>>,
}

impl PoolState {
    fn grant(&mut self, index: SlotIndex) -> Lease {
        let id = self.next_lease;
        self.next_lease += 1;
        self.leases[index.get()] = Some(id);
        Lease { index, id }
    }

    fn prune_abandoned(&mut self) {
        self.waiting.retain(|tx| !tx.is_closed());
    }
}

/// Fixed-size pool of lane indices.
///
/// A pool with capacity 0 is accepted but degenerate: `acquire` never completes.
pub struct SlotPool {
    state: Mutex<PoolState>,
    capacity: usize,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            tracing::warn!("Slot pool created with zero capacity - acquire will wait forever");
        }

        Self {
            state: Mutex::new(PoolState {
                free: (0..capacity).map(SlotIndex::new).collect(),
                leases: vec![None; capacity],
                next_lease: 0,
                waiting: VecDeque::new(),
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // State is only mutated in short non-panicking sections, so a poisoned
        // lock still guards consistent data.
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Slot pool mutex poisoned - recovering");
            poisoned.into_inner()
        })
    }

    /// Take the lowest free lane without waiting.
    pub fn try_acquire(&self) -> Option<SlotPermit<'_>> {
        let lease = {
            let mut state = self.lock();
            let index = state.free.pop_first()?;
            state.grant(index)
        };
        tracing::debug!(slot = %lease.index, "Slot acquired");
        Some(SlotPermit::new(self, lease))
    }

    /// Take a lane, waiting in FIFO order behind earlier waiters if none is free.
    ///
    /// Callers that find a lane free do not queue, even if others are waiting
    /// for a lane that is being handed off. Waiters are only ever served FIFO
    /// relative to each other.
    ///
    /// Cancel-safe: dropping the returned future never leaks a lane, even if
    /// one was handed over just before the drop, and removes its queue entry.
    pub async fn acquire(&self) -> SlotPermit<'_> {
        let rx = {
            let mut state = self.lock();
            if let Some(index) = state.free.pop_first() {
                let lease = state.grant(index);
                tracing::debug!(slot = %index, "Slot acquired");
                return SlotPermit::new(self, lease);
            }
            let (tx, rx) = oneshot::channel();
            state.waiting.push_back(tx);
            tracing::trace!(position = state.waiting.len(), "No free slot - waiting");
            rx
        };

        let mut waiter = Waiter {
            pool: self,
            rx,
            settled: false,
        };
        match (&mut waiter.rx).await {
            Ok(lease) => {
                waiter.settled = true;
                tracing::debug!(slot = %lease.index, "Slot acquired after wait");
                SlotPermit::new(self, lease)
            }
            // A queued sender is only dropped after a send or once its receiver
            // is closed, and this receiver is open while the pool is borrowed.
            Err(_) => {
                waiter.settled = true;
                tracing::error!("Slot waiter lost its sender without a hand-off");
                std::future::pending().await
            }
        }
    }

    /// Return a lane. Hands it to the oldest live waiter, or marks it free.
    ///
    /// Only `SlotPermit::drop` and abandoned waiters call this. A lease that is
    /// not the lane's current one (already released, or superseded by a later
    /// grant) is ignored.
    pub(crate) fn release(&self, lease: Lease) -> Result<()> {
        let index = lease.index;
        if index.get() >= self.capacity {
            return Err(SlotError::InvalidSlotIndex {
                index,
                capacity: self.capacity,
            });
        }

        let mut state = self.lock();
        if state.leases[index.get()] != Some(lease.id) {
            tracing::error!(slot = %index, "Release of a stale slot lease - ignoring");
            return Ok(());
        }

        while let Some(waiter) = state.waiting.pop_front() {
            if waiter.is_closed() {
                continue;
            }
            let handed = state.grant(index);
            match waiter.send(handed) {
                Ok(()) => {
                    tracing::debug!(slot = %index, "Slot handed to waiter");
                    return Ok(());
                }
                // Waiter gave up between the check and the send.
                Err(_) => continue,
            }
        }

        state.leases[index.get()] = None;
        state.free.insert(index);
        tracing::debug!(slot = %index, "Slot released");
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free lanes.
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Number of acquirers currently queued.
    pub fn waiting(&self) -> usize {
        self.lock()
            .waiting
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

/// Receiving end of a queued acquire.
///
/// On drop before settling, closes the channel, returns any lane that was
/// handed over in the meantime and removes abandoned entries from the queue.
struct Waiter<'a> {
    pool: &'a SlotPool,
    rx: oneshot::Receiver<Lease>,
    settled: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        if let Ok(lease) = self.rx.try_recv() {
            tracing::debug!(slot = %lease.index, "Abandoned waiter returning handed-off slot");
            if let Err(e) = self.pool.release(lease) {
                tracing::error!(slot = %lease.index, error = %e, "Failed to return abandoned slot");
            }
        }
        self.pool.lock().prune_abandoned();
    }
}
