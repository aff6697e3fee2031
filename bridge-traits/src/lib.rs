//! # Host Bridge Traits
//!
//! Contracts between the blocking HTTP bridge and the pieces it is plugged
//! into.
//!
//! ## Overview
//!
//! The bridge core never performs network I/O itself. It drives an
//! asynchronous [`FetchEngine`](http::FetchEngine) on a dedicated network
//! execution context and derives per-request transport settings from a
//! host-supplied [`BaselineContext`](context::BaselineContext). This crate
//! defines those seams so engines can be swapped (desktop `reqwest`, test
//! doubles, platform-native stacks).
//!
//! ## Traits
//!
//! - [`FetchEngine`](http::FetchEngine) - Starts fetches and reports each
//!   result exactly once through a completion callback
//! - [`InFlightFetch`](http::InFlightFetch) - Handle to a running fetch, owned
//!   by the network context
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All fallible operations use [`BridgeError`](error::BridgeError). Transport
//! failures of a fetch are not errors at this level: they are reported as a
//! [`RequestStatus`](http::RequestStatus) inside the
//! [`FetchOutcome`](http::FetchOutcome).
//!
//! ## Thread Safety
//!
//! Engines and sinks require `Send + Sync`. In-flight handles do not: they
//! are created and dropped on the network context.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::http::{CompletionCallback, FetchEngine, FetchOutcome, FetchRequest, InFlightFetch};
//!
//! struct StaticEngine;
//!
//! struct Done(String);
//!
//! impl InFlightFetch for Done {
//!     fn url(&self) -> &str {
//!         &self.0
//!     }
//! }
//!
//! impl FetchEngine for StaticEngine {
//!     fn start_fetch(&self, request: FetchRequest, on_complete: CompletionCallback) -> Box<dyn InFlightFetch> {
//!         on_complete(FetchOutcome::completed(200, "ok"));
//!         Box::new(Done(request.url))
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod http;
pub mod log;

pub use error::BridgeError;

// Re-export commonly used types
pub use context::{BaselineContext, ProxyConfig, ProxyService, TransportSettings};
pub use http::{
    CompletionCallback, FetchEngine, FetchOutcome, FetchRequest, HttpMethod, InFlightFetch,
    RequestStatus,
};
pub use log::{LogEntry, LogLevel, LoggerSink};
