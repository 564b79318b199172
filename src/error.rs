use std::io;

/// Errors that can escape the public API.
///
/// Everything else that can go wrong here is a programmer error (a nested
/// `resume`, an out-of-range id) and is reported the same way the original
/// library reports it: a fatal assertion, not a recoverable `Result`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The process-wide worker pool could not spawn one of its threads.
    ///
    /// This is the only resource-exhaustion path this crate can observe
    /// without aborting; everywhere else (growing the coroutine table,
    /// growing the task queue) is an infallible `Vec` growth that aborts
    /// the process on allocation failure, exactly as the source's `malloc`
    /// does.
    #[error("failed to spawn worker thread")]
    PoolInit(#[source] io::Error),

    /// [`crate::configure_pool`] was called after the process-wide pool
    /// had already been created (by an earlier `configure_pool` call or
    /// by the first `Scheduler::open`).
    #[error("the process-wide thread pool is already initialized")]
    PoolAlreadyInitialized,
}

/// Convenience alias for `Result<T, `[`Error`]`>`.
pub type Result<T> = std::result::Result<T, Error>;
