//! Executor - runs operations on a lane and keeps the lane's counters.
//!
//! Each call moves through:
//! - Waiting: queued in the pool until a lane is free
//! - Held: `dispatched` counted, operation running with a copy of the lane's record
//! - Released: `succeeded` counted if the operation returned `Ok`, then the lane is returned
//!
//! Release is tied to the `SlotPermit` held for the whole call, so no exit path
//! (error, panic, or the call's future being dropped) can skip it.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::config::ExecutorConfig;
use crate::error::{ExecuteError, SlotError};
use crate::pool::{SlotPermit, SlotPool};
use crate::record::{SlotIndex, SlotRecord};
use crate::table::SlotTable;

/// Point-in-time view of the executor for telemetry consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSnapshot {
    pub capacity: usize,
    pub available: usize,
    pub waiting: usize,
    pub records: Vec<SlotRecord>,
}

impl PoolSnapshot {
    /// All lanes held.
    pub fn is_saturated(&self) -> bool {
        self.available == 0
    }

    pub fn total_dispatched(&self) -> u64 {
        self.records.iter().map(|r| r.dispatched).sum()
    }

    pub fn total_succeeded(&self) -> u64 {
        self.records.iter().map(|r| r.succeeded).sum()
    }
}

/// Bounded-concurrency executor with per-lane dispatch counters.
///
/// Share it between tasks with `Arc`.
pub struct Executor {
    pool: SlotPool,
    table: SlotTable,
}

impl Executor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            pool: SlotPool::new(max_concurrent),
            table: SlotTable::new(max_concurrent),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.max_concurrent)
    }

    /// Run `operation` on a lane, waiting for one if all are held.
    ///
    /// The operation receives a copy of its lane's record with this dispatch
    /// already counted. Its error is returned unchanged as
    /// [`ExecuteError::OperationFailed`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce(SlotRecord) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.pool.acquire().await;
        self.run(permit, operation).await
    }

    /// Like [`execute`](Self::execute), but gives up if no lane is acquired within `wait`.
    ///
    /// Only the wait is bounded; once the operation starts it runs to completion.
    pub async fn execute_with_timeout<F, Fut, T, E>(
        &self,
        wait: Duration,
        operation: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce(SlotRecord) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match tokio::time::timeout(wait, self.pool.acquire()).await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(wait = ?wait, "Timed out waiting for a slot");
                return Err(ExecuteError::AcquireTimeout(wait));
            }
        };
        self.run(permit, operation).await
    }

    async fn run<'a, F, Fut, T, E>(
        &'a self,
        permit: SlotPermit<'a>,
        operation: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce(SlotRecord) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let index = permit.index();
        let record = self.table.increment_dispatched(index)?;
        tracing::trace!(slot = %index, dispatched = record.dispatched, "Operation dispatched");

        let result = match operation(record).await {
            Ok(value) => {
                self.table.increment_succeeded(index)?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(slot = %index, "Operation failed");
                Err(ExecuteError::OperationFailed(e))
            }
        };

        drop(permit);
        result
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn available(&self) -> usize {
        self.pool.available()
    }

    pub fn waiting(&self) -> usize {
        self.pool.waiting()
    }

    pub fn record(&self, index: SlotIndex) -> Result<SlotRecord, SlotError> {
        self.table.get(index)
    }

    /// Every lane's record, ordered by index.
    pub fn records(&self) -> Vec<SlotRecord> {
        self.table.records()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            capacity: self.capacity(),
            available: self.available(),
            waiting: self.waiting(),
            records: self.records(),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

/// Create an executor with `max_concurrent` lanes.
pub fn new_pool(max_concurrent: usize) -> Executor {
    Executor::new(max_concurrent)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("request rejected")]
    struct Rejected;

    async fn succeed(_: SlotRecord) -> Result<(), Rejected> {
        Ok(())
    }

    async fn fail(_: SlotRecord) -> Result<(), Rejected> {
        Err(Rejected)
    }

    #[test]
    fn default_has_ten_lanes() {
        let executor = Executor::default();
        assert_eq!(executor.capacity(), 10);
        assert_eq!(executor.records().len(), 10);
    }

    #[tokio::test]
    async fn execute_returns_value() {
        let executor = new_pool(2);
        let value = executor
            .execute(|record| async move { Ok::<_, Rejected>(record.slot_index().get() + 40) })
            .await
            .unwrap();
        assert_eq!(value, 40);
    }

    #[tokio::test]
    async fn operation_sees_its_own_dispatch() {
        let executor = new_pool(1);
        executor.execute(succeed).await.unwrap();

        let seen = executor
            .execute(|record| async move { Ok::<_, Rejected>(record) })
            .await
            .unwrap();
        assert_eq!(seen.slot_index(), SlotIndex::new(0));
        assert_eq!(seen.dispatched, 2);
        assert_eq!(seen.succeeded, 1);
    }

    #[tokio::test]
    async fn counters_track_outcomes() {
        let executor = new_pool(1);
        let lane = SlotIndex::new(0);

        executor.execute(succeed).await.unwrap();
        let record = executor.record(lane).unwrap();
        assert_eq!((record.dispatched, record.succeeded), (1, 1));

        executor.execute(succeed).await.unwrap();
        let record = executor.record(lane).unwrap();
        assert_eq!((record.dispatched, record.succeeded), (2, 2));

        let err = executor.execute(fail).await.unwrap_err();
        assert_eq!(err.into_operation_error(), Some(Rejected));
        let record = executor.record(lane).unwrap();
        assert_eq!((record.dispatched, record.succeeded), (3, 2));
    }

    #[tokio::test]
    async fn failure_releases_slot() {
        let executor = new_pool(1);
        assert!(executor.execute(fail).await.is_err());
        assert_eq!(executor.available(), 1);

        let lane = executor
            .execute(|record| async move { Ok::<_, Rejected>(record.slot_index()) })
            .await
            .unwrap();
        assert_eq!(lane, SlotIndex::new(0));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_when_all_lanes_held() {
        let executor = Arc::new(new_pool(1));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (finish_tx, finish_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .execute(|_| async move {
                        started_tx.send(()).unwrap();
                        finish_rx.await.unwrap();
                        Ok::<_, Rejected>(())
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let err = executor
            .execute_with_timeout(Duration::from_millis(100), succeed)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(executor.waiting(), 0);

        finish_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();

        // Timed-out call never dispatched.
        let record = executor.record(SlotIndex::new(0)).unwrap();
        assert_eq!((record.dispatched, record.succeeded), (1, 1));
        assert_eq!(executor.available(), 1);
    }

    #[tokio::test]
    async fn timeout_not_hit_when_lane_free() {
        let executor = new_pool(1);
        executor
            .execute_with_timeout(Duration::from_millis(100), succeed)
            .await
            .unwrap();
        assert_eq!(executor.record(SlotIndex::new(0)).unwrap().succeeded, 1);
    }

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let executor = new_pool(2);
        executor.execute(succeed).await.unwrap();
        let _ = executor.execute(fail).await;

        let snapshot = executor.snapshot();
        assert_eq!(snapshot.capacity, 2);
        assert_eq!(snapshot.available, 2);
        assert_eq!(snapshot.waiting, 0);
        assert!(!snapshot.is_saturated());
        assert_eq!(snapshot.total_dispatched(), 2);
        assert_eq!(snapshot.total_succeeded(), 1);

        insta::assert_json_snapshot!(snapshot, @r#"
        {
          "capacity": 2,
          "available": 2,
          "waiting": 0,
          "records": [
            {
              "slot_index": 0,
              "dispatched": 2,
              "succeeded": 1
            },
            {
              "slot_index": 1,
              "dispatched": 0,
              "succeeded": 0
            }
          ]
        }
        "#);
    }

    #[test]
    fn record_rejects_out_of_range() {
        let executor = new_pool(2);
        assert!(matches!(
            executor.record(SlotIndex::new(5)),
            Err(SlotError::InvalidSlotIndex { capacity: 2, .. })
        ));
    }
}
