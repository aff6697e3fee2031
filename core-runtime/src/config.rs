//! # Bridge Configuration Module
//!
//! Provides configuration management for the HTTP bridge.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `BridgeConfig` instance that holds the baseline transport settings and the
//! fetch engine a bridge factory runs on. It enforces fail-fast validation so
//! a misconfigured bridge is rejected before any network context is started.
//!
//! ## Required Dependencies
//!
//! - `FetchEngine` - Performs the actual network I/O (desktop default:
//!   reqwest, when the `desktop-shims` feature is enabled)
//!
//! ## Usage
//!
//! ### Basic Configuration with Desktop Defaults
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//!
//! let config = BridgeConfig::builder()
//!     .default_user_agent("SyncClient/3.1")
//!     .accept_language("de-DE,de")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Configuration with a Custom Engine
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::builder()
//!     .fetch_engine(Arc::new(MyFetchEngine))
//!     .network_thread_name("sync-network")
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Without the `desktop-shims` feature and without an injected engine,
//! [`build()`](BridgeConfigBuilder::build) fails with
//! [`Error::CapabilityMissing`].

use crate::error::{Error, Result};
use bridge_traits::{BaselineContext, FetchEngine, ProxyConfig, ProxyService};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en";
const DEFAULT_ACCEPT_CHARSET: &str = "utf-8";
const DEFAULT_NETWORK_THREAD_NAME: &str = "http-bridge-network";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TIMEOUT: Duration = Duration::from_secs(600);

/// Configuration for an HTTP bridge factory.
///
/// Use [`BridgeConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct BridgeConfig {
    /// `Accept-Language` sent with every request
    pub accept_language: String,

    /// `Accept-Charset` sent with every request
    pub accept_charset: String,

    /// User agent used when neither the request nor its context overrides it
    pub default_user_agent: String,

    /// Initial proxy; `None` connects directly
    pub proxy: Option<ProxyConfig>,

    /// Engine performing the network I/O
    pub fetch_engine: Arc<dyn FetchEngine>,

    /// Name of the network execution context thread
    pub network_thread_name: String,

    /// Overall timeout applied by the default engine
    pub request_timeout: Duration,

    /// Connect timeout applied by the default engine
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("accept_language", &self.accept_language)
            .field("accept_charset", &self.accept_charset)
            .field("default_user_agent", &self.default_user_agent)
            .field("proxy", &self.proxy)
            .field(
                "fetch_engine",
                &format_args!("FetchEngine({})", self.fetch_engine.name()),
            )
            .field("network_thread_name", &self.network_thread_name)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl BridgeConfig {
    /// Creates a new builder for constructing a `BridgeConfig`.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Language, charset, user agent and thread name are not empty
    /// - Timeouts are non-zero and at most 10 minutes
    /// - The connect timeout does not exceed the request timeout
    /// - The proxy URL is well formed
    pub fn validate(&self) -> Result<()> {
        if self.accept_language.trim().is_empty() {
            return Err(Error::Config("Accept-Language cannot be empty".to_string()));
        }

        if self.accept_charset.trim().is_empty() {
            return Err(Error::Config("Accept-Charset cannot be empty".to_string()));
        }

        if self.default_user_agent.trim().is_empty() {
            return Err(Error::Config(
                "Default user agent cannot be empty".to_string(),
            ));
        }

        if self.network_thread_name.trim().is_empty() {
            return Err(Error::Config(
                "Network thread name cannot be empty".to_string(),
            ));
        }

        validate_timeout("Request", self.request_timeout)?;
        validate_timeout("Connect", self.connect_timeout)?;

        if self.connect_timeout > self.request_timeout {
            return Err(Error::Config(format!(
                "Connect timeout ({:?}) exceeds request timeout ({:?})",
                self.connect_timeout, self.request_timeout
            )));
        }

        if let Some(proxy) = &self.proxy {
            ProxyConfig::new(proxy.url.clone())?;
        }

        Ok(())
    }

    /// Build the baseline transport context described by this configuration.
    ///
    /// Every call creates a fresh proxy service; contexts derived from the
    /// returned baseline share it.
    pub fn baseline(&self) -> BaselineContext {
        BaselineContext::new(
            self.accept_language.clone(),
            self.accept_charset.clone(),
            self.default_user_agent.clone(),
        )
        .with_proxy_service(Arc::new(ProxyService::new(self.proxy.clone())))
    }
}

fn validate_timeout(kind: &str, timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::Config(format!(
            "{} timeout must be greater than 0",
            kind
        )));
    }

    if timeout > MAX_TIMEOUT {
        return Err(Error::Config(format!(
            "{} timeout exceeds maximum of 10 minutes",
            kind
        )));
    }

    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn fetch_engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FetchEngine".to_string(),
        message: "FetchEngine implementation is required to perform network I/O. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestFetchEngine. \
                 Mobile: inject the platform-native HTTP stack."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_fetch_engine(
    request_timeout: Duration,
    connect_timeout: Duration,
) -> Result<Arc<dyn FetchEngine>> {
    use bridge_desktop::ReqwestFetchEngine;

    let engine: Arc<dyn FetchEngine> = Arc::new(ReqwestFetchEngine::with_timeouts(
        request_timeout,
        connect_timeout,
    ));
    Ok(engine)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_fetch_engine(
    _request_timeout: Duration,
    _connect_timeout: Duration,
) -> Result<Arc<dyn FetchEngine>> {
    Err(fetch_engine_missing_error())
}

/// Builder for constructing [`BridgeConfig`] instances.
///
/// Unset values fall back to defaults; call
/// [`build()`](BridgeConfigBuilder::build) to validate and create the config.
#[derive(Default)]
pub struct BridgeConfigBuilder {
    accept_language: Option<String>,
    accept_charset: Option<String>,
    default_user_agent: Option<String>,
    proxy: Option<ProxyConfig>,
    fetch_engine: Option<Arc<dyn FetchEngine>>,
    network_thread_name: Option<String>,
    request_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl BridgeConfigBuilder {
    /// Sets the `Accept-Language` value.
    ///
    /// Default: `en-US,en`
    pub fn accept_language(mut self, value: impl Into<String>) -> Self {
        self.accept_language = Some(value.into());
        self
    }

    /// Sets the `Accept-Charset` value.
    ///
    /// Default: `utf-8`
    pub fn accept_charset(mut self, value: impl Into<String>) -> Self {
        self.accept_charset = Some(value.into());
        self
    }

    /// Sets the user agent used when no override applies.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::BridgeConfig;
    ///
    /// let builder = BridgeConfig::builder()
    ///     .default_user_agent("SyncClient/3.1");
    /// ```
    pub fn default_user_agent(mut self, value: impl Into<String>) -> Self {
        self.default_user_agent = Some(value.into());
        self
    }

    /// Routes requests through `proxy`.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the fetch engine implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn fetch_engine(mut self, engine: Arc<dyn FetchEngine>) -> Self {
        self.fetch_engine = Some(engine);
        self
    }

    /// Sets the name of the network execution context thread.
    ///
    /// Default: `http-bridge-network`
    pub fn network_thread_name(mut self, name: impl Into<String>) -> Self {
        self.network_thread_name = Some(name.into());
        self
    }

    /// Sets the overall request timeout of the default engine.
    ///
    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout of the default engine.
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the final `BridgeConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(BridgeConfig)` on success, or an error if:
    /// - No fetch engine is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<BridgeConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let fetch_engine = match self.fetch_engine {
            Some(engine) => engine,
            None => provide_default_fetch_engine(request_timeout, connect_timeout)?,
        };

        let config = BridgeConfig {
            accept_language: self
                .accept_language
                .unwrap_or_else(|| DEFAULT_ACCEPT_LANGUAGE.to_string()),
            accept_charset: self
                .accept_charset
                .unwrap_or_else(|| DEFAULT_ACCEPT_CHARSET.to_string()),
            default_user_agent: self
                .default_user_agent
                .unwrap_or_else(|| BaselineContext::default().default_user_agent().to_string()),
            proxy: self.proxy,
            fetch_engine,
            network_thread_name: self
                .network_thread_name
                .unwrap_or_else(|| DEFAULT_NETWORK_THREAD_NAME.to_string()),
            request_timeout,
            connect_timeout,
        };

        config.validate()?;

        Ok(config)
    }
}
