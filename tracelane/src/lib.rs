//! tracelane: bounded-concurrency admission control with per-lane telemetry.
//!
//! An [`Executor`] owns a fixed number of lanes. Each call to
//! [`Executor::execute`] waits for a free lane, counts the dispatch, runs the
//! operation with a copy of the lane's [`SlotRecord`], counts the success if it
//! returned `Ok`, and returns the lane.
//!
//! ```no_run
//! # async fn send(_: &str) -> Result<(), std::io::Error> { Ok(()) }
//! # async fn demo() {
//! let executor = tracelane::new_pool(4);
//! let result = executor
//!     .execute(|record| async move {
//!         tracing::info!(lane = %record.slot_index(), "sending");
//!         send("ping").await
//!     })
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod error;
mod executor;
mod record;
mod table;

pub mod pool;

pub use config::{DEFAULT_MAX_CONCURRENT, ExecutorConfig, MAX_CONCURRENT_ENV};
pub use error::{ExecuteError, SlotError};
pub use executor::{Executor, PoolSnapshot, new_pool};
pub use pool::{SlotPermit, SlotPool};
pub use record::{SlotIndex, SlotRecord};
pub use table::SlotTable;
