//! Synchronization primitives.
//!
//! Re-exports the `tokio::sync` types used across the workspace. The oneshot
//! channel doubles as the rendezvous between a blocked caller and the
//! execution context that produces its result: `Receiver::blocking_recv`
//! can be used from plain threads, while `Sender::send` is non-blocking and
//! safe to call from inside a runtime.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::oneshot;
//!
//! let (tx, rx) = oneshot::channel();
//! std::thread::spawn(move || tx.send(42).unwrap());
//! assert_eq!(rx.blocking_recv().unwrap(), 42);
//! ```

pub use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard, Notify, RwLock};
