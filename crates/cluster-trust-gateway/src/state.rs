//! Gateway application state.

use std::sync::Arc;

use cluster_trust_portal::KeyManager;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// The Portal's signing keys.
    pub manager: Arc<KeyManager>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(manager: Arc<KeyManager>, config: GatewayConfig) -> Self {
        Self { manager, config }
    }
}
