//! Error types for slot bookkeeping and execution.

use std::time::Duration;

use crate::record::SlotIndex;

/// Slot bookkeeping errors.
///
/// These indicate misuse of the table or pool, never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("slot index {index} out of range (capacity {capacity})")]
    InvalidSlotIndex { index: SlotIndex, capacity: usize },
}

/// Errors returned by [`Executor::execute`](crate::Executor::execute).
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError<E> {
    /// The operation returned an error. Carried unchanged.
    #[error("operation failed: {0}")]
    OperationFailed(#[source] E),

    /// No slot became free before the acquisition deadline.
    #[error("no slot acquired within {0:?}")]
    AcquireTimeout(Duration),

    #[error(transparent)]
    Slot(#[from] SlotError),
}

impl<E> ExecuteError<E> {
    /// The operation's own error, if that is what this is.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ExecuteError::OperationFailed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecuteError::AcquireTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, SlotError>;
