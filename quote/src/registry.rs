//! Registry of providers indexed by network.

use std::collections::BTreeSet;
use std::sync::Arc;

use intentroute_common::{IntentError, NetworkId, OperationKind, Result};
use parking_lot::RwLock;
use tracing::info;

use crate::provider::Provider;

#[derive(Default)]
struct Inner {
    providers: Vec<Arc<dyn Provider>>,
    networks: BTreeSet<NetworkId>,
}

/// All registered providers, in registration order.
///
/// Registration may happen at any time; queries see a snapshot taken when
/// they start.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<Inner>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Names must be unique.
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(IntentError::Configuration(format!(
                "provider {} is already registered",
                provider.name()
            )));
        }

        let networks = provider.supported_networks();
        info!(
            provider = provider.name(),
            kind = %provider.kind(),
            networks = ?networks,
            "Registered provider"
        );
        inner.networks.extend(networks);
        inner.providers.push(provider);
        Ok(())
    }

    /// Providers declaring `network`, in registration order.
    pub fn providers_for(&self, network: &NetworkId) -> Vec<Arc<dyn Provider>> {
        self.inner
            .read()
            .providers
            .iter()
            .filter(|p| p.supported_networks().contains(network))
            .cloned()
            .collect()
    }

    /// Providers of one operation kind declaring `network`, in registration order.
    pub fn providers_for_kind(
        &self,
        kind: OperationKind,
        network: &NetworkId,
    ) -> Vec<Arc<dyn Provider>> {
        self.providers_for(network)
            .into_iter()
            .filter(|p| p.kind() == kind)
            .collect()
    }

    /// Look up a provider by name.
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.inner
            .read()
            .providers
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| IntentError::ProviderNotFound(name.to_string()))
    }

    /// Every network at least one provider supports.
    pub fn networks(&self) -> Vec<NetworkId> {
        self.inner.read().networks.iter().cloned().collect()
    }

    /// Whether any provider supports `network`.
    pub fn supports(&self, network: &NetworkId) -> bool {
        self.inner.read().networks.contains(network)
    }

    pub fn len(&self) -> usize {
        self.inner.read().providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().providers.is_empty()
    }
}
