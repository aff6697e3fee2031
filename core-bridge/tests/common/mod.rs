//! Shared fetch engine doubles for bridge integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bridge_traits::{
    BaselineContext, CompletionCallback, FetchEngine, FetchOutcome, FetchRequest, InFlightFetch,
};
use core_bridge::{HttpBridgeFactory, NetworkContext};

pub const NETWORK_THREAD: &str = "test-network";

fn current_thread_name() -> Option<String> {
    thread::current().name().map(str::to_string)
}

/// In-flight handle that records the thread it is dropped on.
pub struct TrackedFetch {
    url: String,
    dropped_on: Arc<Mutex<Vec<Option<String>>>>,
}

impl InFlightFetch for TrackedFetch {
    fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for TrackedFetch {
    fn drop(&mut self) {
        self.dropped_on.lock().unwrap().push(current_thread_name());
    }
}

type Responder = Box<dyn Fn(&FetchRequest) -> FetchOutcome + Send + Sync>;

/// Engine that records every request and answers with `respond`,
/// immediately or after a delay.
pub struct RecordingEngine {
    respond: Responder,
    delay: Option<Duration>,
    requests: Mutex<Vec<FetchRequest>>,
    completed: Arc<AtomicUsize>,
    completed_on: Arc<Mutex<Vec<Option<String>>>>,
    dropped_on: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingEngine {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&FetchRequest) -> FetchOutcome + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: None,
            requests: Mutex::new(Vec::new()),
            completed: Arc::new(AtomicUsize::new(0)),
            completed_on: Arc::new(Mutex::new(Vec::new())),
            dropped_on: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers 200 with the request body.
    pub fn echo() -> Self {
        Self::new(|request| FetchOutcome::completed(200, request.body.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> FetchRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn completed_on(&self) -> Vec<Option<String>> {
        self.completed_on.lock().unwrap().clone()
    }

    pub fn dropped_on(&self) -> Vec<Option<String>> {
        self.dropped_on.lock().unwrap().clone()
    }
}

impl FetchEngine for RecordingEngine {
    fn start_fetch(
        &self,
        request: FetchRequest,
        on_complete: CompletionCallback,
    ) -> Box<dyn InFlightFetch> {
        let outcome = (self.respond)(&request);
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let completed = Arc::clone(&self.completed);
        let completed_on = Arc::clone(&self.completed_on);
        let complete = move || {
            completed.fetch_add(1, Ordering::SeqCst);
            completed_on.lock().unwrap().push(current_thread_name());
            on_complete(outcome);
        };

        match self.delay {
            Some(delay) => {
                core_async::task::spawn(async move {
                    core_async::sleep(delay).await;
                    complete();
                });
            }
            None => complete(),
        }

        Box::new(TrackedFetch {
            url,
            dropped_on: Arc::clone(&self.dropped_on),
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Engine that accepts fetches and never completes them.
#[derive(Default)]
pub struct HangingEngine {
    parked: Mutex<Vec<CompletionCallback>>,
    started: AtomicUsize,
}

impl HangingEngine {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl FetchEngine for HangingEngine {
    fn start_fetch(
        &self,
        request: FetchRequest,
        on_complete: CompletionCallback,
    ) -> Box<dyn InFlightFetch> {
        self.parked.lock().unwrap().push(on_complete);
        self.started.fetch_add(1, Ordering::SeqCst);

        Box::new(TrackedFetch {
            url: request.url,
            dropped_on: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

pub fn baseline() -> BaselineContext {
    BaselineContext::new("en-US,en", "utf-8", "Default/2.0")
}

pub fn factory(engine: Arc<dyn FetchEngine>) -> HttpBridgeFactory {
    let network = NetworkContext::spawn(NETWORK_THREAD).expect("network context");
    HttpBridgeFactory::new(baseline(), engine, network)
}

/// Poll `check` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}
