//! Fetch Engine Implementation using Reqwest

use bridge_traits::{
    context::ProxyConfig,
    http::{
        CompletionCallback, FetchEngine, FetchOutcome, FetchRequest, HttpMethod, InFlightFetch,
        RequestStatus,
    },
};
use core_async::task::{self, JoinHandle};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Transport error codes reported when the failure carries no OS error.
///
/// Values are negative so they never collide with `errno` values.
pub mod net_error {
    /// Unclassified failure
    pub const FAILED: i32 = -2;
    /// The engine-level timeout elapsed
    pub const TIMED_OUT: i32 = -7;
    /// The connection could not be established
    pub const CONNECTION_FAILED: i32 = -104;
    /// The request could not be built (bad URL, header or proxy)
    pub const INVALID_REQUEST: i32 = -300;
}

struct CachedClient {
    proxy: Option<ProxyConfig>,
    client: Client,
}

/// Reqwest-based fetch engine
///
/// - One client per proxy setting, rebuilt when the proxy changes
/// - No cookie store: cookies are neither sent nor persisted, `Set-Cookie`
///   values are only reported back in the outcome
/// - No cache; cache-bypass requests carry `no-cache` headers
/// - No retries
///
/// Fetches are spawned on the current runtime, so when `start_fetch` is called
/// on a network execution context the completion callback runs there too.
pub struct ReqwestFetchEngine {
    timeout: Duration,
    connect_timeout: Duration,
    cached: Mutex<Option<CachedClient>>,
}

impl ReqwestFetchEngine {
    /// Create a new engine with default timeouts
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(30), Duration::from_secs(10))
    }

    /// Create a new engine with custom timeouts
    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout,
            cached: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_client(&self, proxy: Option<&ProxyConfig>) -> reqwest::Result<Client> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .no_proxy();

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(&proxy.url)?);
        }

        builder.build()
    }

    fn client_for(&self, proxy: Option<&ProxyConfig>) -> reqwest::Result<Client> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = cached.as_ref() {
            if entry.proxy.as_ref() == proxy {
                return Ok(entry.client.clone());
            }
        }

        debug!(proxy = ?proxy.map(|p| p.url.as_str()), "Building HTTP client");
        let client = self.build_client(proxy)?;
        *cached = Some(CachedClient {
            proxy: proxy.cloned(),
            client: client.clone(),
        });
        Ok(client)
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Collapse standard, extra and content-type headers into one map.
    ///
    /// Later sources replace earlier ones: a caller's extra `User-Agent`
    /// or `Cache-Control` wins over the transport default, and the payload's
    /// content type wins over an extra `Content-Type`.
    fn build_headers(request: &FetchRequest) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();

        let standard = request.settings.standard_headers();
        let content_type = request
            .content_type
            .iter()
            .map(|value| (CONTENT_TYPE.as_str().to_string(), value.clone()));

        for (name, value) in standard
            .into_iter()
            .chain(request.headers.iter().cloned())
            .chain(content_type)
        {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid header name '{}': {}", name, e))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|e| format!("invalid value for header '{}': {}", name, e))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    /// Build reqwest request from a fetch request
    fn build_request(
        client: &Client,
        request: FetchRequest,
    ) -> Result<reqwest::RequestBuilder, String> {
        let headers = Self::build_headers(&request)?;
        let method = Self::convert_method(request.method);
        let mut req = client.request(method, &request.url).headers(headers);

        if !request.body.is_empty() || request.method == HttpMethod::Post {
            req = req.body(request.body);
        }

        Ok(req)
    }

    async fn execute(builder: reqwest::RequestBuilder, url: String) -> FetchOutcome {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let os_error = os_error_for(&e);
                warn!(url = %url, error = %e, os_error, "HTTP request failed");
                return FetchOutcome::failed(os_error);
            }
        };

        let status = response.status().as_u16();
        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter(|(k, _)| **k != SET_COOKIE)
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        match response.bytes().await {
            Ok(body) => {
                debug!(url = %url, status, bytes = body.len(), "HTTP request completed");
                FetchOutcome {
                    status: RequestStatus::Success,
                    response_code: Some(status),
                    cookies,
                    headers,
                    body,
                }
            }
            Err(e) => {
                let os_error = os_error_for(&e);
                warn!(url = %url, status, error = %e, os_error, "Reading response body failed");
                FetchOutcome {
                    response_code: Some(status),
                    ..FetchOutcome::failed(os_error)
                }
            }
        }
    }
}

impl Default for ReqwestFetchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchEngine for ReqwestFetchEngine {
    fn start_fetch(
        &self,
        request: FetchRequest,
        on_complete: CompletionCallback,
    ) -> Box<dyn InFlightFetch> {
        let url = request.url.clone();

        let client = match self.client_for(request.settings.proxy.as_ref()) {
            Ok(client) => client,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not build HTTP client");
                on_complete(FetchOutcome::failed(net_error::INVALID_REQUEST));
                return Box::new(ReqwestFetch { url, task: None });
            }
        };

        debug!(url = %url, method = request.method.as_str(), "Starting fetch");
        let builder = match Self::build_request(&client, request) {
            Ok(builder) => builder,
            Err(reason) => {
                warn!(url = %url, reason = %reason, "Could not build HTTP request");
                on_complete(FetchOutcome::failed(net_error::INVALID_REQUEST));
                return Box::new(ReqwestFetch { url, task: None });
            }
        };
        let task_url = url.clone();
        let task = task::spawn(async move {
            let outcome = Self::execute(builder, task_url).await;
            on_complete(outcome);
        });

        Box::new(ReqwestFetch {
            url,
            task: Some(task),
        })
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

/// In-flight reqwest fetch
pub struct ReqwestFetch {
    url: String,
    task: Option<JoinHandle<()>>,
}

impl InFlightFetch for ReqwestFetch {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

/// Map a reqwest error to a transport error code, preferring the OS error
fn os_error_for(err: &reqwest::Error) -> i32 {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(code) = cause
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::raw_os_error)
        {
            return code;
        }
        source = cause.source();
    }

    if err.is_timeout() {
        net_error::TIMED_OUT
    } else if err.is_connect() {
        net_error::CONNECTION_FAILED
    } else if err.is_builder() {
        net_error::INVALID_REQUEST
    } else {
        net_error::FAILED
    }
}
