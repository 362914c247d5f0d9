//! Per-lane identity and dispatch counters.

use serde::{Deserialize, Serialize};

/// Identity of one concurrency lane.
///
/// Always in `[0, capacity)` for the pool that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for SlotIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters for a single lane.
///
/// Operations receive a copy taken right after their dispatch was counted,
/// so `dispatched` already includes the call being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    slot_index: SlotIndex,
    /// Operations started on this lane.
    pub dispatched: u64,
    /// Operations on this lane that returned `Ok`.
    pub succeeded: u64,
}

impl SlotRecord {
    pub fn new(slot_index: SlotIndex) -> Self {
        Self {
            slot_index,
            dispatched: 0,
            succeeded: 0,
        }
    }

    pub fn slot_index(&self) -> SlotIndex {
        self.slot_index
    }

    pub fn failed(&self) -> u64 {
        self.dispatched.saturating_sub(self.succeeded)
    }

    /// Fraction of dispatched operations that succeeded, `None` before the first dispatch.
    pub fn success_rate(&self) -> Option<f64> {
        if self.dispatched == 0 {
            None
        } else {
            Some(self.succeeded as f64 / self.dispatched as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_zeroed() {
        let record = SlotRecord::new(SlotIndex::new(3));
        assert_eq!(record.slot_index(), SlotIndex::new(3));
        assert_eq!(record.dispatched, 0);
        assert_eq!(record.succeeded, 0);
        assert_eq!(record.failed(), 0);
        assert!(record.success_rate().is_none());
    }

    #[test]
    fn success_rate_and_failures() {
        let record = SlotRecord {
            slot_index: SlotIndex::new(0),
            dispatched: 4,
            succeeded: 3,
        };
        assert_eq!(record.failed(), 1);
        assert_eq!(record.success_rate(), Some(0.75));
    }

    #[test]
    fn slot_index_display() {
        assert_eq!(SlotIndex::new(7).to_string(), "7");
    }

    #[test]
    fn record_serializes_flat() {
        let record = SlotRecord {
            slot_index: SlotIndex::new(2),
            dispatched: 5,
            succeeded: 4,
        };
        insta::assert_json_snapshot!(record, @r#"
        {
          "slot_index": 2,
          "dispatched": 5,
          "succeeded": 4
        }
        "#);
    }

    #[test]
    fn record_deserializes() {
        let record: SlotRecord =
            serde_json::from_str(r#"{"slot_index":1,"dispatched":2,"succeeded":1}"#).unwrap();
        assert_eq!(record.slot_index().get(), 1);
        assert_eq!(record.dispatched, 2);
        assert_eq!(record.succeeded, 1);
    }
}
