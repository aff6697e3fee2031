//! Task spawning and execution abstractions.
//!
//! - `spawn`: Send futures on the current runtime
//! - `spawn_local`: non-Send futures on the current `LocalSet`; every
//!   [`ContextRunner`](crate::context::ContextRunner) drives one, so work
//!   spawned from a posted task stays on that context's thread
//! - `spawn_blocking`: CPU-heavy or blocking work on the blocking pool

pub use tokio::task::{spawn_blocking, spawn_local, yield_now, JoinError, JoinHandle, LocalSet};

/// Spawns a new asynchronous task using the Tokio runtime.
///
/// The spawned task may run on a different thread when the current runtime
/// is multi-threaded. Inside a [`ContextRunner`](crate::context::ContextRunner)
/// the runtime is current-thread, so the task runs on the context thread.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
