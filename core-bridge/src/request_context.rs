//! Isolated request context.
//!
//! Transport configuration shared by every bridge of one factory. Language,
//! charset and default user agent are copied from the baseline; the proxy
//! service is shared with it, so proxy changes made through the baseline
//! apply here too. Cookies and caching are off and cannot be turned on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bridge_traits::{BaselineContext, ProxyService, TransportSettings};
use tracing::debug;

#[derive(Debug)]
pub struct IsolatedRequestContext {
    accept_language: String,
    accept_charset: String,
    default_user_agent: String,
    proxy_service: Arc<ProxyService>,
    user_agent: RwLock<Option<String>>,
    rejected_cookies: AtomicUsize,
}

impl IsolatedRequestContext {
    pub fn new(baseline: &BaselineContext) -> Self {
        Self {
            accept_language: baseline.accept_language().to_string(),
            accept_charset: baseline.accept_charset().to_string(),
            default_user_agent: baseline.default_user_agent().to_string(),
            proxy_service: Arc::clone(baseline.proxy_service()),
            user_agent: RwLock::new(None),
            rejected_cookies: AtomicUsize::new(0),
        }
    }

    /// Override the user agent of every request issued through this context.
    ///
    /// An empty string clears the override.
    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        let user_agent = user_agent.into();
        let value = (!user_agent.is_empty()).then_some(user_agent);
        *self
            .user_agent
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub fn is_user_agent_set(&self) -> bool {
        self.user_agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Effective user agent: the override if set, else the baseline default.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.default_user_agent.clone())
    }

    pub fn accept_language(&self) -> &str {
        &self.accept_language
    }

    pub fn accept_charset(&self) -> &str {
        &self.accept_charset
    }

    pub fn proxy_service(&self) -> &Arc<ProxyService> {
        &self.proxy_service
    }

    pub fn allow_sending_cookies(&self) -> bool {
        false
    }

    pub fn accepts_cookies(&self) -> bool {
        false
    }

    pub fn cache_disabled(&self) -> bool {
        true
    }

    /// Offer cookies returned by a server. Nothing is ever stored.
    ///
    /// Returns the number of cookies stored, which is always `0`.
    pub fn store_cookies(&self, url: &str, cookies: &[String]) -> usize {
        if !cookies.is_empty() {
            self.rejected_cookies
                .fetch_add(cookies.len(), Ordering::Relaxed);
            debug!(
                url = %core_runtime::logging::redact_url(url),
                count = cookies.len(),
                "Rejected cookies for isolated context"
            );
        }
        0
    }

    pub fn cookie_count(&self) -> usize {
        0
    }

    /// Total number of cookies offered to and rejected by this context.
    pub fn rejected_cookie_count(&self) -> usize {
        self.rejected_cookies.load(Ordering::Relaxed)
    }

    /// Settings snapshot for a request, using the current proxy.
    ///
    /// `user_agent_override` wins over the context override, which wins over
    /// the baseline default.
    pub fn transport_settings(&self, user_agent_override: Option<&str>) -> TransportSettings {
        self.settings_with_proxy(user_agent_override, self.proxy_service.current())
    }

    /// Like [`transport_settings`](Self::transport_settings), honoring the
    /// proxy bypass list for `host`.
    pub fn transport_settings_for_host(
        &self,
        host: &str,
        user_agent_override: Option<&str>,
    ) -> TransportSettings {
        self.settings_with_proxy(user_agent_override, self.proxy_service.proxy_for(host))
    }

    fn settings_with_proxy(
        &self,
        user_agent_override: Option<&str>,
        proxy: Option<bridge_traits::ProxyConfig>,
    ) -> TransportSettings {
        let user_agent = match user_agent_override {
            Some(ua) if !ua.is_empty() => ua.to_string(),
            _ => self.user_agent(),
        };

        TransportSettings {
            user_agent,
            accept_language: self.accept_language.clone(),
            accept_charset: self.accept_charset.clone(),
            proxy,
            send_cookies: self.allow_sending_cookies(),
            save_cookies: self.accepts_cookies(),
            bypass_cache: self.cache_disabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ProxyConfig;

    fn baseline() -> BaselineContext {
        BaselineContext::new("en-GB", "utf-8", "Default/2.0")
    }

    #[test]
    fn test_copies_baseline_fields() {
        let context = IsolatedRequestContext::new(&baseline());

        assert_eq!(context.accept_language(), "en-GB");
        assert_eq!(context.accept_charset(), "utf-8");
        assert_eq!(context.user_agent(), "Default/2.0");
        assert!(!context.is_user_agent_set());
    }

    #[test]
    fn test_user_agent_override_and_clear() {
        let context = IsolatedRequestContext::new(&baseline());

        context.set_user_agent("TestAgent/1.0");
        assert!(context.is_user_agent_set());
        assert_eq!(context.user_agent(), "TestAgent/1.0");

        context.set_user_agent("");
        assert!(!context.is_user_agent_set());
        assert_eq!(context.user_agent(), "Default/2.0");
    }

    #[test]
    fn test_user_agent_precedence_in_settings() {
        let context = IsolatedRequestContext::new(&baseline());
        assert_eq!(context.transport_settings(None).user_agent, "Default/2.0");

        context.set_user_agent("TestAgent/1.0");
        assert_eq!(context.transport_settings(None).user_agent, "TestAgent/1.0");
        assert_eq!(
            context.transport_settings(Some("PerRequest/3.0")).user_agent,
            "PerRequest/3.0"
        );
        assert_eq!(context.transport_settings(Some("")).user_agent, "TestAgent/1.0");
    }

    #[test]
    fn test_cookie_and_cache_policy_is_fixed() {
        let context = IsolatedRequestContext::new(&baseline());

        assert!(!context.allow_sending_cookies());
        assert!(!context.accepts_cookies());
        assert!(context.cache_disabled());

        let settings = context.transport_settings(None);
        assert!(!settings.send_cookies);
        assert!(!settings.save_cookies);
        assert!(settings.bypass_cache);
    }

    #[test]
    fn test_store_cookies_is_rejected() {
        let context = IsolatedRequestContext::new(&baseline());
        let cookies = vec!["sid=abc; Path=/".to_string(), "theme=dark".to_string()];

        assert_eq!(context.store_cookies("https://example.com/", &cookies), 0);
        assert_eq!(context.store_cookies("https://example.com/", &[]), 0);
        assert_eq!(context.cookie_count(), 0);
        assert_eq!(context.rejected_cookie_count(), 2);
    }

    #[test]
    fn test_observes_later_baseline_proxy_changes() {
        let baseline = baseline();
        let context = IsolatedRequestContext::new(&baseline);
        assert!(context.transport_settings(None).proxy.is_none());

        let proxy = ProxyConfig::new("http://proxy.local:3128")
            .unwrap()
            .with_bypass("localhost");
        baseline.set_proxy(Some(proxy.clone()));

        assert_eq!(context.transport_settings(None).proxy, Some(proxy.clone()));
        assert_eq!(
            context
                .transport_settings_for_host("sync.example.com", None)
                .proxy,
            Some(proxy)
        );
        assert!(context
            .transport_settings_for_host("localhost", None)
            .proxy
            .is_none());
    }
}
