//! Transport Configuration
//!
//! The baseline transport configuration supplied by the host (language,
//! charset, proxy, default user agent) and the per-request settings snapshot
//! handed to a [`FetchEngine`](crate::http::FetchEngine).

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{BridgeError, Result};

/// Proxy server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://proxy.internal:3128`
    pub url: String,
    /// Hosts that bypass the proxy (exact match or `.suffix`)
    #[serde(default)]
    pub bypass: Vec<String>,
}

impl ProxyConfig {
    /// Create a proxy configuration, validating the URL.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidProxy`] when the URL does not parse or
    /// uses a scheme other than `http`, `https`, `socks5` or `socks5h`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url)
            .map_err(|e| BridgeError::InvalidProxy(format!("{}: {}", url, e)))?;

        match parsed.scheme() {
            "http" | "https" | "socks5" | "socks5h" => {}
            other => {
                return Err(BridgeError::InvalidProxy(format!(
                    "unsupported proxy scheme '{}'",
                    other
                )))
            }
        }

        if parsed.host_str().is_none() {
            return Err(BridgeError::InvalidProxy(format!("{}: missing host", url)));
        }

        Ok(Self {
            url,
            bypass: Vec::new(),
        })
    }

    pub fn with_bypass(mut self, host: impl Into<String>) -> Self {
        self.bypass.push(host.into());
        self
    }

    /// Whether requests to `host` skip the proxy
    pub fn bypasses(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.bypass.iter().any(|rule| {
            let rule = rule.to_ascii_lowercase();
            match rule.strip_prefix('.') {
                Some(suffix) => host == suffix || host.ends_with(&format!(".{}", suffix)),
                None => host == rule,
            }
        })
    }
}

/// Shared, swappable proxy setting.
///
/// Contexts derived from a baseline hold the same `Arc<ProxyService>`, so a
/// proxy change made through the baseline is seen by every derived context.
#[derive(Debug, Default)]
pub struct ProxyService {
    current: RwLock<Option<ProxyConfig>>,
}

impl ProxyService {
    pub fn new(proxy: Option<ProxyConfig>) -> Self {
        Self {
            current: RwLock::new(proxy),
        }
    }

    /// A service that connects directly
    pub fn direct() -> Self {
        Self::new(None)
    }

    /// Snapshot of the current proxy
    pub fn current(&self) -> Option<ProxyConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current proxy
    pub fn set(&self, proxy: Option<ProxyConfig>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = proxy;
    }

    /// Proxy to use for `host`, honoring the bypass list
    pub fn proxy_for(&self, host: &str) -> Option<ProxyConfig> {
        self.current().filter(|proxy| !proxy.bypasses(host))
    }
}

/// Baseline transport configuration supplied by the host.
///
/// Cloning shares the proxy service.
#[derive(Debug, Clone)]
pub struct BaselineContext {
    accept_language: String,
    accept_charset: String,
    default_user_agent: String,
    proxy_service: Arc<ProxyService>,
}

impl BaselineContext {
    pub fn new(
        accept_language: impl Into<String>,
        accept_charset: impl Into<String>,
        default_user_agent: impl Into<String>,
    ) -> Self {
        Self {
            accept_language: accept_language.into(),
            accept_charset: accept_charset.into(),
            default_user_agent: default_user_agent.into(),
            proxy_service: Arc::new(ProxyService::direct()),
        }
    }

    pub fn with_proxy_service(mut self, proxy_service: Arc<ProxyService>) -> Self {
        self.proxy_service = proxy_service;
        self
    }

    pub fn accept_language(&self) -> &str {
        &self.accept_language
    }

    pub fn accept_charset(&self) -> &str {
        &self.accept_charset
    }

    pub fn default_user_agent(&self) -> &str {
        &self.default_user_agent
    }

    pub fn proxy_service(&self) -> &Arc<ProxyService> {
        &self.proxy_service
    }

    /// Change the proxy for this baseline and every context sharing it
    pub fn set_proxy(&self, proxy: Option<ProxyConfig>) {
        self.proxy_service.set(proxy);
    }
}

impl Default for BaselineContext {
    fn default() -> Self {
        Self::new(
            "en-US,en",
            "utf-8",
            concat!("http-bridge/", env!("CARGO_PKG_VERSION")),
        )
    }
}

/// Per-request transport settings snapshot consumed by a fetch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub user_agent: String,
    pub accept_language: String,
    pub accept_charset: String,
    pub proxy: Option<ProxyConfig>,
    /// Attach stored cookies to the request
    pub send_cookies: bool,
    /// Persist `Set-Cookie` responses
    pub save_cookies: bool,
    /// Neither read from nor write to any cache
    pub bypass_cache: bool,
}

impl TransportSettings {
    /// Standard request headers implied by these settings.
    pub fn standard_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(5);

        if !self.user_agent.is_empty() {
            headers.push(("User-Agent".to_string(), self.user_agent.clone()));
        }
        if !self.accept_language.is_empty() {
            headers.push(("Accept-Language".to_string(), self.accept_language.clone()));
        }
        if !self.accept_charset.is_empty() {
            headers.push(("Accept-Charset".to_string(), self.accept_charset.clone()));
        }
        if self.bypass_cache {
            headers.push(("Cache-Control".to_string(), "no-cache".to_string()));
            headers.push(("Pragma".to_string(), "no-cache".to_string()));
        }

        headers
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        let baseline = BaselineContext::default();
        Self {
            user_agent: baseline.default_user_agent().to_string(),
            accept_language: baseline.accept_language().to_string(),
            accept_charset: baseline.accept_charset().to_string(),
            proxy: None,
            send_cookies: true,
            save_cookies: true,
            bypass_cache: false,
        }
    }
}
