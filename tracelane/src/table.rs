//! Slot table - one [`SlotRecord`] per configured lane.
//!
//! Records are created once, zeroed, and never removed. Counters persist across
//! release and re-acquisition of a lane for the lifetime of the table.

use dashmap::DashMap;

use crate::error::{Result, SlotError};
use crate::record::{SlotIndex, SlotRecord};

pub struct SlotTable {
    records: DashMap<SlotIndex, SlotRecord>,
    capacity: usize,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        let records = DashMap::with_capacity(capacity);
        for index in (0..capacity).map(SlotIndex::new) {
            records.insert(index, SlotRecord::new(index));
        }
        Self { records, capacity }
    }

    pub fn len(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    pub fn get(&self, index: SlotIndex) -> Result<SlotRecord> {
        self.records
            .get(&index)
            .map(|r| *r)
            .ok_or_else(|| self.invalid(index))
    }

    /// Count one more operation started on `index`. Returns the updated record.
    pub fn increment_dispatched(&self, index: SlotIndex) -> Result<SlotRecord> {
        self.update(index, |r| r.dispatched += 1)
    }

    /// Count one more successful operation on `index`. Returns the updated record.
    pub fn increment_succeeded(&self, index: SlotIndex) -> Result<SlotRecord> {
        self.update(index, |r| r.succeeded += 1)
    }

    /// Snapshot of every record, ordered by index.
    pub fn records(&self) -> Vec<SlotRecord> {
        let mut records: Vec<SlotRecord> = self.records.iter().map(|r| *r.value()).collect();
        records.sort_by_key(|r| r.slot_index());
        records
    }

    fn update(&self, index: SlotIndex, f: impl FnOnce(&mut SlotRecord)) -> Result<SlotRecord> {
        let mut entry = self
            .records
            .get_mut(&index)
            .ok_or_else(|| self.invalid(index))?;
        f(&mut entry);
        Ok(*entry)
    }

    fn invalid(&self, index: SlotIndex) -> SlotError {
        SlotError::InvalidSlotIndex {
            index,
            capacity: self.capacity,
        }
    }
}
