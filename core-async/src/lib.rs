//! Runtime abstraction layer for the HTTP bridge.
//!
//! This crate wraps the Tokio primitives the rest of the workspace needs so
//! that downstream crates never depend on Tokio directly, and provides the
//! dedicated execution contexts the bridge uses to run network I/O away from
//! blocking callers.
//!
//! # Modules
//!
//! - `context`: Dedicated single-thread execution contexts with task posting
//! - `runtime`: Runtime handles and `block_on`
//! - `task`: Task spawning and execution
//! - `time`: Time-related operations (sleep, duration, instant)
//! - `sync`: Synchronization primitives (Mutex, channels)
//!
//! # Examples
//!
//! ```rust
//! use core_async::context::ContextRunner;
//!
//! let runner = ContextRunner::spawn("example-context", || 0u32).unwrap();
//! runner.handle().post(|counter| *counter += 1).unwrap();
//! ```

pub mod context;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

// Re-export commonly used types at crate root for convenience
pub use context::{ContextClosed, ContextHandle, ContextRunner};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
