//! Fetch Engine Abstraction
//!
//! Contract between the blocking bridge and an asynchronous fetch engine.
//! Engines are driven from a single network execution context: every call to
//! [`FetchEngine::start_fetch`] happens there, and the engine must invoke the
//! completion callback exactly once, on that same context, for every fetch it
//! starts (success or failure).

use bytes::Bytes;
use std::collections::HashMap;

use crate::context::TransportSettings;

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// A fetch to be started by an engine
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Extra request headers, in the order the caller supplied them
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub settings: TransportSettings,
}

impl FetchRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            content_type: None,
            body: Bytes::new(),
            settings: TransportSettings::default(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn upload(mut self, content_type: impl Into<String>, body: Bytes) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body;
        self
    }

    pub fn settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Case-insensitive lookup of an extra header
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Final status of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// The exchange completed; the HTTP status may still be an error code
    Success,
    /// The engine abandoned the fetch
    Canceled,
    /// Transport-level failure (DNS, connect, TLS, engine timeout)
    Failed { os_error: i32 },
}

impl RequestStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestStatus::Success)
    }

    /// Transport error code, `0` when none applies
    pub fn os_error(&self) -> i32 {
        match self {
            RequestStatus::Failed { os_error } => *os_error,
            _ => 0,
        }
    }
}

/// Result delivered to the completion callback
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: RequestStatus,
    /// HTTP status code, `None` when no response was received
    pub response_code: Option<u16>,
    /// Raw `Set-Cookie` values returned by the server
    pub cookies: Vec<String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl FetchOutcome {
    /// A completed exchange with the given HTTP status and body
    pub fn completed(response_code: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: RequestStatus::Success,
            response_code: Some(response_code),
            cookies: Vec::new(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// A transport failure with the given OS error code
    pub fn failed(os_error: i32) -> Self {
        Self {
            status: RequestStatus::Failed { os_error },
            response_code: None,
            cookies: Vec::new(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn canceled() -> Self {
        Self {
            status: RequestStatus::Canceled,
            ..Self::failed(0)
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookies.push(cookie.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Check if the response status is successful (2xx)
    pub fn is_http_success(&self) -> bool {
        matches!(self.response_code, Some(code) if (200..300).contains(&code))
    }
}

/// Completion callback handed to an engine. Consumed on invocation, so it
/// can run at most once.
pub type CompletionCallback = Box<dyn FnOnce(FetchOutcome) + Send + 'static>;

/// An in-flight fetch owned by the network execution context.
///
/// Dropping the handle releases the engine's per-fetch resources. It is not
/// required to be `Send`: it is created and destroyed on the network context.
pub trait InFlightFetch {
    /// URL being fetched
    fn url(&self) -> &str;

    /// Whether the engine finished with this fetch
    fn is_finished(&self) -> bool {
        false
    }
}

/// Asynchronous fetch engine
///
/// # Contract
///
/// - `start_fetch` is called on the network execution context only.
/// - `on_complete` is invoked exactly once per started fetch, on the network
///   execution context, and nothing is delivered afterwards. Failures that
///   happen before any I/O (bad URL, invalid header) are reported through
///   `on_complete` as well.
/// - Engines must honor [`TransportSettings`]: no cookies are sent when
///   `send_cookies` is false, none are persisted when `save_cookies` is false,
///   and no cache is consulted when `bypass_cache` is true.
/// - Engines do not retry.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{FetchEngine, FetchOutcome, FetchRequest, HttpMethod};
///
/// fn post(engine: &dyn FetchEngine) {
///     let request = FetchRequest::new(HttpMethod::Post, "https://sync.example.com/command");
///     let _in_flight = engine.start_fetch(request, Box::new(|outcome: FetchOutcome| {
///         println!("status: {:?}", outcome.response_code);
///     }));
/// }
/// ```
pub trait FetchEngine: Send + Sync {
    /// Start `request` and return a handle to the in-flight fetch
    fn start_fetch(
        &self,
        request: FetchRequest,
        on_complete: CompletionCallback,
    ) -> Box<dyn InFlightFetch>;

    /// Short engine name used in logs
    fn name(&self) -> &str {
        "fetch-engine"
    }
}
