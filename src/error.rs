//! Error types for the few board operations that cannot simply signal
//! failure with `bool`/`Option`.

use thiserror::Error;

/// Failure reasons for [`crate::Board::create`] and [`crate::Board::create_with_config`].
///
/// Every other public operation signals capacity, misuse, lifecycle, and
/// shutdown failures by returning `false`/`None` rather than an error value.
/// `BoardError` exists only for board construction, the one place a caller
/// needs to distinguish *why* nothing was built.
#[derive(Debug, Error)]
pub enum BoardError {
    /// `secondary_count` was outside `[1, MAX_SECONDARIES]`.
    #[error("secondary_count must be between 1 and {max} (got {got})")]
    InvalidSecondaryCount { got: usize, max: usize },

    /// A coroutine's private stack could not be allocated.
    ///
    /// Reachable from [`crate::Board::task_create`] as well, where it is
    /// translated to a plain `false` return rather than propagated.
    #[error("failed to allocate a coroutine stack")]
    StackAllocation,
}
