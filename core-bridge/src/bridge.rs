//! Bridge core.
//!
//! A one-shot object that turns an asynchronous fetch into a blocking call.
//! Request parameters are set on the caller's thread, then
//! [`HttpBridge::make_synchronous_call`] posts fetch creation onto the network
//! context and blocks until the completion handler delivers the response.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{FetchEngine, FetchOutcome, FetchRequest, HttpMethod};
use bytes::Bytes;
use core_async::sync::oneshot;
use core_runtime::logging::{redact_if_sensitive, redact_url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;

use crate::completion::CompletionHandler;
use crate::error::{HttpBridgeError, Result};
use crate::network::{ensure_can_block, NetworkBound, NetworkContext, RequestId};
use crate::request_context::IsolatedRequestContext;

/// All request parameters, for [`HttpBridge::configure`].
#[derive(Debug, Clone, Default)]
pub struct BridgeRequestSpec {
    pub user_agent: Option<String>,
    /// Raw `Name: value` lines separated by CRLF or LF
    pub extra_headers: Option<String>,
    pub url: String,
    /// Replaces the URL's port when non-zero
    pub port: u16,
    pub content_type: String,
    pub payload: Bytes,
}

#[derive(Debug, Default)]
struct BridgeRequest {
    url: Option<Url>,
    content_type: String,
    payload: Bytes,
    extra_headers: Vec<(String, String)>,
    user_agent: Option<String>,
}

/// Result delivered by the completion handler. Written once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeResponse {
    pub success: bool,
    /// `None` when no HTTP response was received
    pub http_status: Option<u16>,
    /// Transport error code, `0` when none
    pub os_error: i32,
    pub body: Bytes,
    pub headers: HashMap<String, String>,
}

impl BridgeResponse {
    pub fn from_outcome(outcome: FetchOutcome) -> Self {
        Self {
            success: outcome.status.is_success(),
            http_status: outcome.response_code,
            os_error: outcome.status.os_error(),
            body: outcome.body,
            headers: outcome.headers,
        }
    }

    pub fn outcome(&self) -> PostOutcome {
        PostOutcome {
            success: self.success,
            http_status: self.http_status,
            os_error: self.os_error,
        }
    }
}

/// Aggregated status returned by [`HttpBridge::make_synchronous_call`].
///
/// `success` is true whenever the exchange completed, whatever the HTTP
/// status; interpreting the status is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostOutcome {
    pub success: bool,
    pub http_status: Option<u16>,
    pub os_error: i32,
}

/// One-shot blocking HTTP POST over the network context.
pub struct HttpBridge {
    id: RequestId,
    request: BridgeRequest,
    response: Option<BridgeResponse>,
    call_made: bool,
    // Declared before `network` so the release is queued before the
    // network context can shut down.
    context: NetworkBound<Arc<IsolatedRequestContext>>,
    engine: Arc<dyn FetchEngine>,
    network: NetworkContext,
}

impl HttpBridge {
    pub fn new(
        context: Arc<IsolatedRequestContext>,
        engine: Arc<dyn FetchEngine>,
        network: NetworkContext,
    ) -> Self {
        Self {
            id: RequestId::new(),
            request: BridgeRequest::default(),
            response: None,
            call_made: false,
            context: NetworkBound::new(context, network.handle()),
            engine,
            network,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.id
    }

    pub fn url(&self) -> Option<&Url> {
        self.request.url.as_ref()
    }

    pub fn request_context(&self) -> &Arc<IsolatedRequestContext> {
        &self.context
    }

    pub fn is_call_made(&self) -> bool {
        self.call_made
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.call_made {
            return Err(HttpBridgeError::RequestLocked);
        }
        Ok(())
    }

    /// Per-request user agent, taking precedence over the context's.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> Result<()> {
        self.ensure_unlocked()?;
        let user_agent = user_agent.into();
        self.request.user_agent = (!user_agent.is_empty()).then_some(user_agent);
        Ok(())
    }

    /// Replace the extra request headers with the `Name: value` lines in
    /// `headers`. Malformed lines are skipped.
    pub fn set_extra_request_headers(&mut self, headers: &str) -> Result<()> {
        self.ensure_unlocked()?;
        self.request.extra_headers = parse_header_lines(headers);
        Ok(())
    }

    /// Set the target URL; a non-zero `port` replaces the URL's port.
    pub fn set_url(&mut self, url: &str, port: u16) -> Result<()> {
        self.ensure_unlocked()?;

        let invalid = |reason: String| HttpBridgeError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let mut parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        if port != 0 {
            parsed
                .set_port(Some(port))
                .map_err(|_| invalid("cannot carry a port".to_string()))?;
        }

        self.request.url = Some(parsed);
        Ok(())
    }

    pub fn set_post_payload(
        &mut self,
        content_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        self.request.content_type = content_type.into();
        self.request.payload = payload.into();
        Ok(())
    }

    /// Apply every request parameter at once.
    pub fn configure(&mut self, spec: BridgeRequestSpec) -> Result<()> {
        self.ensure_unlocked()?;

        if let Some(user_agent) = spec.user_agent {
            self.set_user_agent(user_agent)?;
        }
        if let Some(headers) = spec.extra_headers {
            self.set_extra_request_headers(&headers)?;
        }
        self.set_url(&spec.url, spec.port)?;
        self.set_post_payload(spec.content_type, spec.payload)
    }

    fn build_fetch_request(&self, url: &Url) -> FetchRequest {
        let settings = self.context.transport_settings_for_host(
            url.host_str().unwrap_or_default(),
            self.request.user_agent.as_deref(),
        );

        let mut request = FetchRequest::new(HttpMethod::Post, url.as_str()).settings(settings);
        for (name, value) in &self.request.extra_headers {
            trace!(
                request_id = %self.id,
                header = %name,
                value = %redact_if_sensitive(name, value),
                "Extra request header"
            );
            request = request.header(name.clone(), value.clone());
        }

        if self.request.content_type.is_empty() {
            request.body = self.request.payload.clone();
            request
        } else {
            request.upload(self.request.content_type.clone(), self.request.payload.clone())
        }
    }

    /// Issue the POST and block until the response or failure arrives.
    ///
    /// Must be called at most once and never on the network context. Any
    /// other thread that may block can call it, including a
    /// `spawn_blocking` thread of an async host. If the engine never
    /// completes the fetch this call never returns.
    ///
    /// # Panics
    ///
    /// Panics when called on an async runtime worker thread (inside
    /// `block_on` or a spawned task), where blocking would stall the
    /// runtime.
    pub fn make_synchronous_call(&mut self) -> Result<PostOutcome> {
        if self.call_made {
            return Err(HttpBridgeError::CallAlreadyMade);
        }

        let network = self.network.handle();
        ensure_can_block(&network)?;

        let url = self.request.url.clone().ok_or(HttpBridgeError::UrlNotSet)?;
        let fetch_request = self.build_fetch_request(&url);
        self.call_made = true;

        let (sender, receiver) = oneshot::channel();
        let handler = CompletionHandler::new(
            self.id,
            url.as_str(),
            sender,
            Arc::clone(self.request_context()),
            network.clone(),
        );

        debug!(
            request_id = %self.id,
            url = %redact_url(url.as_str()),
            bytes = fetch_request.body.len(),
            engine = self.engine.name(),
            "Starting bridged POST"
        );

        let engine = Arc::clone(&self.engine);
        let id = self.id;
        network
            .post(move |arena| {
                let fetch = engine.start_fetch(fetch_request, handler.into_callback());
                arena.insert(id, fetch);
            })
            .map_err(|_| HttpBridgeError::NetworkContextUnavailable)?;

        let response = receiver.blocking_recv().map_err(|_| {
            warn!(request_id = %self.id, "Bridged POST ended without a response");
            HttpBridgeError::CompletionDropped
        })?;

        let outcome = response.outcome();
        debug!(
            request_id = %self.id,
            success = outcome.success,
            status = ?outcome.http_status,
            os_error = outcome.os_error,
            "Bridged POST finished"
        );

        self.response = Some(response);
        Ok(outcome)
    }

    fn response(&self) -> Result<&BridgeResponse> {
        self.response
            .as_ref()
            .ok_or(HttpBridgeError::ResponseNotReady)
    }

    pub fn response_content_length(&self) -> Result<usize> {
        Ok(self.response()?.body.len())
    }

    /// Raw response bytes
    pub fn response_content(&self) -> Result<&[u8]> {
        Ok(&self.response()?.body)
    }

    pub fn response_text(&self) -> Result<&str> {
        Ok(std::str::from_utf8(self.response_content()?)?)
    }

    pub fn response_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.response_content()?)?)
    }

    /// Response header by case-insensitive name
    pub fn response_header(&self, name: &str) -> Result<Option<&str>> {
        Ok(self
            .response()?
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str()))
    }
}

impl std::fmt::Debug for HttpBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBridge")
            .field("id", &self.id)
            .field("url", &self.request.url.as_ref().map(|u| redact_url(u.as_str())))
            .field("call_made", &self.call_made)
            .field("response", &self.response.as_ref().map(BridgeResponse::outcome))
            .finish_non_exhaustive()
    }
}

/// Parse raw header lines, skipping malformed ones.
pub(crate) fn parse_header_lines(raw: &str) -> Vec<(String, String)> {
    raw.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = line.split_once(':').and_then(|(name, value)| {
                let name = name.trim();
                let valid = !name.is_empty()
                    && name.bytes().all(|b| b.is_ascii_graphic() && b != b':');
                valid.then(|| (name.to_string(), value.trim().to_string()))
            });
            if parsed.is_none() {
                warn!(line = %redact_if_sensitive(line, line), "Skipping malformed header line");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BaselineContext, CompletionCallback, InFlightFetch};
    use mockall::mock;
    use serde::Deserialize;

    mock! {
        Engine {}

        impl FetchEngine for Engine {
            fn start_fetch(
                &self,
                request: FetchRequest,
                on_complete: CompletionCallback,
            ) -> Box<dyn InFlightFetch>;
        }
    }

    struct Done(String);

    impl InFlightFetch for Done {
        fn url(&self) -> &str {
            &self.0
        }
    }

    fn bridge_with(engine: MockEngine) -> HttpBridge {
        let context = Arc::new(IsolatedRequestContext::new(&BaselineContext::new(
            "en-US",
            "utf-8",
            "Default/2.0",
        )));
        let network = NetworkContext::spawn("bridge-unit-network").unwrap();
        HttpBridge::new(context, Arc::new(engine), network)
    }

    #[test]
    fn test_parse_header_lines() {
        let headers =
            parse_header_lines("X-One: 1\r\nX-Two:two words \n\nnot a header\n: empty\nBad Name: x\n");

        assert_eq!(
            headers,
            vec![
                ("X-One".to_string(), "1".to_string()),
                ("X-Two".to_string(), "two words".to_string()),
            ]
        );
        assert!(parse_header_lines("").is_empty());
    }

    #[test]
    fn test_set_url_applies_port() {
        let mut bridge = bridge_with(MockEngine::new());

        bridge.set_url("https://sync.example.com/command?client=1", 8443).unwrap();
        assert_eq!(
            bridge.url().unwrap().as_str(),
            "https://sync.example.com:8443/command?client=1"
        );

        bridge.set_url("http://sync.example.com:9000/", 0).unwrap();
        assert_eq!(bridge.url().unwrap().port(), Some(9000));
    }

    #[test]
    fn test_set_url_rejects_invalid() {
        let mut bridge = bridge_with(MockEngine::new());

        assert!(matches!(
            bridge.set_url("not a url", 0),
            Err(HttpBridgeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            bridge.set_url("ftp://files.example.com/", 21),
            Err(HttpBridgeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_call_without_url_fails() {
        let mut bridge = bridge_with(MockEngine::new());
        assert!(matches!(
            bridge.make_synchronous_call(),
            Err(HttpBridgeError::UrlNotSet)
        ));
        assert!(!bridge.is_call_made());
    }

    #[test]
    fn test_response_before_call_is_not_ready() {
        let bridge = bridge_with(MockEngine::new());

        assert!(matches!(
            bridge.response_content_length(),
            Err(HttpBridgeError::ResponseNotReady)
        ));
        assert!(matches!(
            bridge.response_content(),
            Err(HttpBridgeError::ResponseNotReady)
        ));
    }

    #[test]
    fn test_engine_receives_post_with_configured_parameters() {
        let mut engine = MockEngine::new();
        engine
            .expect_start_fetch()
            .withf(|request, _| {
                request.method == HttpMethod::Post
                    && request.url == "https://sync.example.com:8443/command"
                    && request.header_value("X-Client") == Some("tests")
                    && request.content_type.as_deref() == Some("application/octet-stream")
                    && &request.body[..] == b"\x01\x02"
                    && request.settings.user_agent == "PerRequest/1.0"
                    && request.settings.bypass_cache
                    && !request.settings.send_cookies
                    && !request.settings.save_cookies
            })
            .times(1)
            .returning(|request, on_complete| {
                on_complete(FetchOutcome::completed(200, Bytes::from_static(b"{\"ok\":true}")));
                Box::new(Done(request.url))
            });

        let mut bridge = bridge_with(engine);
        bridge
            .configure(BridgeRequestSpec {
                user_agent: Some("PerRequest/1.0".to_string()),
                extra_headers: Some("X-Client: tests".to_string()),
                url: "https://sync.example.com/command".to_string(),
                port: 8443,
                content_type: "application/octet-stream".to_string(),
                payload: Bytes::from_static(b"\x01\x02"),
            })
            .unwrap();

        let outcome = bridge.make_synchronous_call().unwrap();
        assert_eq!(
            outcome,
            PostOutcome {
                success: true,
                http_status: Some(200),
                os_error: 0,
            }
        );

        #[derive(Deserialize)]
        struct Reply {
            ok: bool,
        }
        let reply: Reply = bridge.response_json().unwrap();
        assert!(reply.ok);
        assert_eq!(bridge.response_text().unwrap(), "{\"ok\":true}");
    }

    #[test]
    fn test_second_call_and_late_setters_are_usage_errors() {
        let mut engine = MockEngine::new();
        engine
            .expect_start_fetch()
            .times(1)
            .returning(|request, on_complete| {
                on_complete(FetchOutcome::completed(204, Bytes::new()));
                Box::new(Done(request.url))
            });

        let mut bridge = bridge_with(engine);
        bridge.set_url("https://sync.example.com/", 0).unwrap();
        bridge.make_synchronous_call().unwrap();

        assert!(matches!(
            bridge.make_synchronous_call(),
            Err(HttpBridgeError::CallAlreadyMade)
        ));
        assert!(matches!(
            bridge.set_url("https://other.example.com/", 0),
            Err(HttpBridgeError::RequestLocked)
        ));
        assert!(matches!(
            bridge.set_post_payload("text/plain", "late"),
            Err(HttpBridgeError::RequestLocked)
        ));
        assert!(matches!(
            bridge.set_extra_request_headers("X-Late: 1"),
            Err(HttpBridgeError::RequestLocked)
        ));
        assert!(matches!(
            bridge.set_user_agent("Late/1.0"),
            Err(HttpBridgeError::RequestLocked)
        ));
        assert_eq!(bridge.response_content_length().unwrap(), 0);
    }

    #[test]
    fn test_invalid_utf8_body() {
        let mut engine = MockEngine::new();
        engine.expect_start_fetch().returning(|request, on_complete| {
            on_complete(FetchOutcome::completed(200, Bytes::from_static(&[0xff, 0xfe])));
            Box::new(Done(request.url))
        });

        let mut bridge = bridge_with(engine);
        bridge.set_url("https://sync.example.com/", 0).unwrap();
        bridge.make_synchronous_call().unwrap();

        assert_eq!(bridge.response_content().unwrap(), &[0xff, 0xfe]);
        assert!(matches!(
            bridge.response_text(),
            Err(HttpBridgeError::ResponseNotUtf8(_))
        ));
    }

    #[test]
    fn test_dropped_callback_is_reported() {
        let mut engine = MockEngine::new();
        engine.expect_start_fetch().returning(|request, on_complete| {
            drop(on_complete);
            Box::new(Done(request.url))
        });

        let mut bridge = bridge_with(engine);
        bridge.set_url("https://sync.example.com/", 0).unwrap();

        assert!(matches!(
            bridge.make_synchronous_call(),
            Err(HttpBridgeError::CompletionDropped)
        ));
        assert!(bridge.is_call_made());
        assert!(matches!(
            bridge.response_content(),
            Err(HttpBridgeError::ResponseNotReady)
        ));
    }
}
