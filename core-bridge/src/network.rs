//! Network execution context.
//!
//! All fetch creation, progress and completion happens on one dedicated
//! thread. In-flight fetch handles live in a [`FetchArena`] owned by that
//! thread and are indexed by [`RequestId`]; callers never hold them.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use bridge_traits::InFlightFetch;
use core_async::context::{ContextHandle, ContextRunner};
use core_async::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{HttpBridgeError, Result};

/// Identifier of one bridged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-flight fetch handles, keyed by request.
///
/// Lives on the network thread only.
#[derive(Default)]
pub struct FetchArena {
    fetches: HashMap<RequestId, Box<dyn InFlightFetch>>,
}

impl FetchArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: RequestId, fetch: Box<dyn InFlightFetch>) {
        if self.fetches.insert(id, fetch).is_some() {
            warn!(request_id = %id, "Replaced an in-flight fetch with the same id");
        }
    }

    /// Remove and drop the handle for `id`.
    pub fn release(&mut self, id: RequestId) -> bool {
        match self.fetches.remove(&id) {
            Some(fetch) => {
                debug!(request_id = %id, finished = fetch.is_finished(), "Released in-flight fetch");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.fetches.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.fetches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetches.is_empty()
    }
}

impl Drop for FetchArena {
    fn drop(&mut self) {
        if !self.fetches.is_empty() {
            warn!(
                abandoned = self.fetches.len(),
                "Network context stopped with fetches still in flight"
            );
        }
    }
}

/// Handle used to post work onto the network context.
pub type NetworkHandle = ContextHandle<FetchArena>;

/// Shared owner of the network execution context.
///
/// The thread stops once the last clone is dropped: queued tasks still run,
/// then remaining in-flight handles are dropped on the network thread.
#[derive(Clone)]
pub struct NetworkContext {
    runner: Arc<ContextRunner<FetchArena>>,
}

impl NetworkContext {
    /// Start a network context on a new thread named `name`.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let runner = ContextRunner::spawn(name.clone(), FetchArena::new)?;
        debug!(name = %name, "Started network context");

        Ok(Self {
            runner: Arc::new(runner),
        })
    }

    pub fn handle(&self) -> NetworkHandle {
        self.runner.handle()
    }

    pub fn name(&self) -> String {
        self.handle().name().to_string()
    }

    /// Whether the calling thread is the network thread.
    pub fn is_current(&self) -> bool {
        self.handle().runs_tasks_on_current_thread()
    }

    /// Number of fetches currently parked in the arena.
    ///
    /// Blocks until every task posted before this call has run.
    pub fn in_flight_count(&self) -> Result<usize> {
        let handle = self.handle();
        ensure_can_block(&handle)?;

        let (tx, rx) = oneshot::channel();
        handle
            .post(move |arena| {
                let _ = tx.send(arena.len());
            })
            .map_err(|_| HttpBridgeError::NetworkContextUnavailable)?;

        rx.blocking_recv()
            .map_err(|_| HttpBridgeError::NetworkContextUnavailable)
    }
}

impl fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkContext")
            .field("handle", &self.handle())
            .finish()
    }
}

/// Reject blocking waits that the network thread itself would have to
/// satisfy.
///
/// Other threads may block, including `spawn_blocking` threads of an async
/// host. Blocking on an async runtime worker is caught by
/// `blocking_recv`, which panics there.
pub(crate) fn ensure_can_block(handle: &NetworkHandle) -> Result<()> {
    if handle.runs_tasks_on_current_thread() {
        return Err(HttpBridgeError::CalledOnNetworkContext(
            handle.name().to_string(),
        ));
    }

    Ok(())
}

/// A value whose final drop happens on the network context.
///
/// Dropping the wrapper posts the value to the network thread. When that
/// thread is gone the value is dropped in place.
pub struct NetworkBound<T: Send + 'static> {
    value: Option<T>,
    network: NetworkHandle,
}

impl<T: Send + 'static> NetworkBound<T> {
    pub fn new(value: T, network: NetworkHandle) -> Self {
        Self {
            value: Some(value),
            network,
        }
    }
}

impl<T: Send + 'static> Deref for NetworkBound<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.value.as_ref() {
            Some(value) => value,
            // Only taken in Drop
            None => unreachable!("NetworkBound value accessed after release"),
        }
    }
}

impl<T: Send + 'static> Drop for NetworkBound<T> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };

        if self.network.runs_tasks_on_current_thread() {
            drop(value);
            return;
        }

        if let Err(value) = self.network.release(value) {
            warn!(
                network = self.network.name(),
                "Network context already stopped; releasing in place"
            );
            drop(value);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for NetworkBound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NetworkBound").field(&self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    struct Probe {
        url: String,
        dropped: mpsc::Sender<Option<String>>,
    }

    impl InFlightFetch for Probe {
        fn url(&self) -> &str {
            &self.url
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            let _ = self
                .dropped
                .send(thread::current().name().map(str::to_string));
        }
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
        let id = RequestId::new();
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn test_arena_insert_and_release() {
        let (tx, rx) = mpsc::channel();
        let mut arena = FetchArena::new();
        let id = RequestId::new();

        arena.insert(
            id,
            Box::new(Probe {
                url: "https://example.com/".to_string(),
                dropped: tx,
            }),
        );
        assert!(arena.contains(id));
        assert_eq!(arena.len(), 1);

        assert!(arena.release(id));
        assert!(rx.try_recv().is_ok());
        assert!(arena.is_empty());
        assert!(!arena.release(id));
    }

    #[test]
    fn test_in_flight_count_round_trips() {
        let network = NetworkContext::spawn("count-network").unwrap();
        let (tx, rx) = mpsc::channel();
        let id = RequestId::new();

        network
            .handle()
            .post(move |arena| {
                arena.insert(
                    id,
                    Box::new(Probe {
                        url: "https://example.com/".to_string(),
                        dropped: tx,
                    }),
                )
            })
            .unwrap();
        assert_eq!(network.in_flight_count().unwrap(), 1);

        network.handle().post(move |arena| {
            arena.release(id);
        }).unwrap();
        assert_eq!(network.in_flight_count().unwrap(), 0);

        let dropped_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(dropped_on.as_deref(), Some("count-network"));
    }

    #[test]
    fn test_remaining_fetches_dropped_on_network_thread_at_shutdown() {
        let network = NetworkContext::spawn("closing-network").unwrap();
        let (tx, rx) = mpsc::channel();

        network
            .handle()
            .post(move |arena| {
                arena.insert(
                    RequestId::new(),
                    Box::new(Probe {
                        url: "https://example.com/".to_string(),
                        dropped: tx,
                    }),
                )
            })
            .unwrap();
        drop(network);

        let dropped_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(dropped_on.as_deref(), Some("closing-network"));
    }

    #[test]
    fn test_network_bound_drops_on_network_thread() {
        struct Marker(mpsc::Sender<Option<String>>);

        impl Drop for Marker {
            fn drop(&mut self) {
                let _ = self.0.send(thread::current().name().map(str::to_string));
            }
        }

        let network = NetworkContext::spawn("bound-network").unwrap();
        let (tx, rx) = mpsc::channel();

        let bound = NetworkBound::new(Marker(tx), network.handle());
        drop(bound);

        let dropped_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(dropped_on.as_deref(), Some("bound-network"));
    }

    #[test]
    fn test_network_bound_drops_in_place_after_shutdown() {
        let network = NetworkContext::spawn("stopped-network").unwrap();
        let handle = network.handle();
        drop(network);

        let value = Arc::new(5);
        let bound = NetworkBound::new(Arc::clone(&value), handle);
        assert_eq!(**bound, 5);
        drop(bound);

        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_in_flight_count_from_spawn_blocking_thread() {
        let network = NetworkContext::spawn("blocking-pool-check").unwrap();

        let count = core_async::runtime::block_on(async move {
            core_async::task::spawn_blocking(move || network.in_flight_count())
                .await
                .unwrap()
        });

        assert_eq!(count.unwrap(), 0);
    }
}
