//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `FetchEngine` using `reqwest`, with no cookie store and no cache
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestFetchEngine;
//! use bridge_traits::FetchEngine;
//! use std::sync::Arc;
//!
//! let engine: Arc<dyn FetchEngine> = Arc::new(ReqwestFetchEngine::new());
//! // Hand the engine to an HttpBridgeFactory
//! ```

mod http;

pub use http::{net_error, ReqwestFetch, ReqwestFetchEngine};
