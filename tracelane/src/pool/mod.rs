//! Slot pool for bounded concurrency.
//!
//! A fixed set of lane indices is handed out to acquirers:
//! - Free lanes are issued lowest index first, without queueing
//! - When none are free, acquirers queue FIFO and are handed a lane directly on release
//! - `SlotPermit` returns its lane on drop, so release happens exactly once per acquire

mod permit;
mod slots;

pub use permit::SlotPermit;
pub use slots::SlotPool;
