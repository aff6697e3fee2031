//! Dedicated execution contexts.
//!
//! A [`ContextRunner`] owns one OS thread that drives a current-thread Tokio
//! runtime inside a [`LocalSet`]. Work reaches the thread as posted tasks
//! (`FnOnce(&mut S)`), where `S` is state created on the context thread and
//! never leaves it. Because `S` is not required to be `Send`, it can hold
//! objects that must be created and destroyed on the same thread.
//!
//! Futures spawned from a posted task (with [`spawn`](crate::task::spawn) or
//! [`spawn_local`](crate::task::spawn_local)) also run on the context thread.
//!
//! # Shutdown
//!
//! Dropping the runner stops the context: tasks already queued are still
//! executed, later posts fail with [`ContextClosed`], the state is dropped on
//! the context thread, and the thread is joined.
//!
//! # Example
//!
//! ```rust
//! use core_async::context::ContextRunner;
//! use core_async::sync::oneshot;
//!
//! let runner = ContextRunner::spawn("counter", || Vec::<u32>::new()).unwrap();
//! let handle = runner.handle();
//!
//! let (tx, rx) = oneshot::channel();
//! handle.post(|items| items.push(1)).unwrap();
//! handle
//!     .post(move |items| {
//!         let _ = tx.send(items.len());
//!     })
//!     .unwrap();
//!
//! assert_eq!(rx.blocking_recv().unwrap(), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

use crate::runtime::Builder;

/// A unit of work executed on a context thread with access to its state.
pub type ContextTask<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Returned when posting to a context that has shut down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("execution context '{name}' is no longer accepting tasks")]
pub struct ContextClosed {
    pub name: String,
}

/// Cloneable handle used to post tasks onto a running context.
pub struct ContextHandle<S> {
    sender: mpsc::UnboundedSender<ContextTask<S>>,
    thread_id: ThreadId,
    name: Arc<str>,
}

impl<S> Clone for ContextHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            thread_id: self.thread_id,
            name: Arc::clone(&self.name),
        }
    }
}

impl<S> fmt::Debug for ContextHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<S: 'static> ContextHandle<S> {
    /// Queue `task` for execution on the context thread.
    ///
    /// Tasks run in the order they were posted.
    pub fn post<F>(&self, task: F) -> Result<(), ContextClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(Box::new(task))
            .map_err(|_| ContextClosed {
                name: self.name.to_string(),
            })
    }

    /// Move `value` onto the context thread and drop it there.
    ///
    /// When the context has already shut down the value is handed back so the
    /// caller can decide how to dispose of it.
    pub fn release<T>(&self, value: T) -> Result<(), T>
    where
        T: Send + 'static,
    {
        // The task owns `value`; a failed send returns the boxed task, from
        // which the value cannot be recovered, so keep it in a slot instead.
        let slot = Arc::new(std::sync::Mutex::new(Some(value)));
        let task_slot = Arc::clone(&slot);
        let posted = self.post(move |_state| {
            let value = task_slot
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            drop(value);
        });

        match posted {
            Ok(()) => Ok(()),
            Err(_) => {
                let value = slot
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take();
                match value {
                    Some(value) => Err(value),
                    None => Ok(()),
                }
            }
        }
    }

    /// Whether the calling thread is this context's thread.
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Whether the context stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Name given to the context (and its thread).
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owner of a dedicated execution context thread.
pub struct ContextRunner<S: 'static> {
    handle: ContextHandle<S>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl<S: 'static> fmt::Debug for ContextRunner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRunner")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<S: 'static> ContextRunner<S> {
    /// Start a context thread named `name` whose state is built by `init`.
    ///
    /// `init` runs on the new thread, inside the runtime, before any posted
    /// task.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the OS thread cannot be created.
    pub fn spawn<F>(name: impl Into<String>, init: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name.into());
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<ContextTask<S>>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let local = LocalSet::new();
                local.block_on(&runtime, async move {
                    let mut state = init();

                    loop {
                        tokio::select! {
                            biased;
                            _ = &mut shutdown_rx => break,
                            task = receiver.recv() => match task {
                                Some(task) => task(&mut state),
                                None => break,
                            },
                        }
                    }

                    receiver.close();
                    while let Ok(task) = receiver.try_recv() {
                        task(&mut state);
                    }
                    drop(state);
                });
            })?;

        let handle = ContextHandle {
            sender,
            thread_id: thread.thread().id(),
            name,
        };

        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// A cloneable handle for posting tasks.
    pub fn handle(&self) -> ContextHandle<S> {
        self.handle.clone()
    }
}

impl<S: 'static> Drop for ContextRunner<S> {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(thread) = self.thread.take() {
            // Joining from the context thread itself would deadlock.
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}
