//! # Core Bridge
//!
//! Blocking HTTP POST over an asynchronous fetch engine.
//!
//! ## Overview
//!
//! A caller that can only block (a worker written against a synchronous
//! network API) configures an [`HttpBridge`] and calls
//! [`make_synchronous_call`](HttpBridge::make_synchronous_call). The fetch is
//! created, driven and completed on a dedicated network thread; the caller
//! waits on a one-shot channel filled by the [`CompletionHandler`].
//!
//! - [`IsolatedRequestContext`] - Per-factory transport settings: baseline
//!   language, charset and proxy, optional user agent override, no cookies,
//!   no cache
//! - [`HttpBridge`] - One request, one blocking call
//! - [`CompletionHandler`] - Engine callback delivering the result
//! - [`HttpBridgeFactory`] - Creates bridges sharing one context
//!
//! In-flight fetch handles never leave the network thread: they are parked
//! in a [`FetchArena`] keyed by [`RequestId`] and dropped there. Context
//! references held by bridges and factories are released there too.
//!
//! ## Usage
//!
//! ```ignore
//! use core_bridge::HttpBridgeFactory;
//! use core_runtime::config::BridgeConfig;
//!
//! let config = BridgeConfig::builder()
//!     .default_user_agent("SyncClient/3.1")
//!     .build()?;
//! let factory = HttpBridgeFactory::from_config(&config)?;
//!
//! let mut bridge = factory.create();
//! bridge.set_url("https://sync.example.com/command", 443)?;
//! bridge.set_extra_request_headers("X-Client-Version: 3.1")?;
//! bridge.set_post_payload("application/octet-stream", payload)?;
//!
//! let outcome = bridge.make_synchronous_call()?;
//! if outcome.success && outcome.http_status == Some(200) {
//!     handle(bridge.response_content()?);
//! }
//! factory.destroy(bridge);
//! ```
//!
//! ## Errors
//!
//! Transport failures are not errors: they come back as
//! `PostOutcome { success: false, os_error, .. }`. Non-2xx statuses come back
//! with `success: true`. Misuse (a second call, reading before the call,
//! blocking on the network thread) is reported as [`HttpBridgeError`].

pub mod bridge;
pub mod completion;
pub mod error;
pub mod factory;
pub mod network;
pub mod request_context;

pub use bridge::{BridgeRequestSpec, BridgeResponse, HttpBridge, PostOutcome};
pub use completion::CompletionHandler;
pub use error::{HttpBridgeError, Result};
pub use factory::HttpBridgeFactory;
pub use network::{FetchArena, NetworkBound, NetworkContext, NetworkHandle, RequestId};
pub use request_context::IsolatedRequestContext;
