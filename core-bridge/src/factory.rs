//! Bridge factory.
//!
//! Creates bridges bound to one lazily created [`IsolatedRequestContext`]
//! shared by every bridge of the factory.

use std::sync::{Arc, OnceLock};

use bridge_traits::{BaselineContext, FetchEngine};
use core_runtime::config::BridgeConfig;
use tracing::debug;

use crate::bridge::HttpBridge;
use crate::error::Result;
use crate::network::{NetworkBound, NetworkContext};
use crate::request_context::IsolatedRequestContext;

pub struct HttpBridgeFactory {
    baseline: BaselineContext,
    // Declared before `network`, see `HttpBridge`
    context: OnceLock<NetworkBound<Arc<IsolatedRequestContext>>>,
    engine: Arc<dyn FetchEngine>,
    network: NetworkContext,
}

impl HttpBridgeFactory {
    pub fn new(
        baseline: BaselineContext,
        engine: Arc<dyn FetchEngine>,
        network: NetworkContext,
    ) -> Self {
        Self {
            baseline,
            context: OnceLock::new(),
            engine,
            network,
        }
    }

    /// Build a factory from a validated configuration, starting its own
    /// network context.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let network = NetworkContext::spawn(config.network_thread_name.clone())?;

        Ok(Self::new(
            config.baseline(),
            Arc::clone(&config.fetch_engine),
            network,
        ))
    }

    /// The context shared by every bridge of this factory.
    pub fn request_context(&self) -> &Arc<IsolatedRequestContext> {
        self.context.get_or_init(|| {
            debug!(network = %self.network.name(), "Creating isolated request context");
            NetworkBound::new(
                Arc::new(IsolatedRequestContext::new(&self.baseline)),
                self.network.handle(),
            )
        })
    }

    pub fn create(&self) -> HttpBridge {
        let bridge = HttpBridge::new(
            Arc::clone(self.request_context()),
            Arc::clone(&self.engine),
            self.network.clone(),
        );
        debug!(request_id = %bridge.request_id(), "Created bridge");
        bridge
    }

    /// Release the caller's bridge.
    ///
    /// Its context reference is dropped on the network context.
    pub fn destroy(&self, bridge: HttpBridge) {
        debug!(request_id = %bridge.request_id(), "Destroying bridge");
        drop(bridge);
    }

    pub fn baseline(&self) -> &BaselineContext {
        &self.baseline
    }

    pub fn network(&self) -> &NetworkContext {
        &self.network
    }
}

impl std::fmt::Debug for HttpBridgeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBridgeFactory")
            .field("engine", &self.engine.name())
            .field("network", &self.network)
            .field("context_created", &self.context.get().is_some())
            .finish()
    }
}
