//! Provider registry: an explicit alias-to-constructor map.
//!
//! Providers are registered by calling [`ProviderRegistry::register`] at
//! startup; nothing is discovered implicitly. The built-in providers are
//! available under the aliases `"memory"` and `"discard"`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::Client;
use crate::config::BrokerConfig;
use crate::discard::DiscardClient;
use crate::error::BrokerError;
use crate::memory::MemoryClient;

pub type ClientConstructor = fn(&BrokerConfig) -> Arc<dyn Client>;

pub struct ProviderRegistry {
    providers: HashMap<String, ClientConstructor>,
}

impl ProviderRegistry {
    /// An empty registry; callers register every provider themselves.
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
        }
    }

    /// A registry with the built-in providers registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", |config| Arc::new(MemoryClient::with_config(*config)));
        registry.register("discard", |_config| Arc::new(DiscardClient::new()));
        registry
    }

    /// Register a provider under an alias, replacing any previous
    /// registration for the same alias.
    pub fn register(&mut self, alias: impl Into<String>, constructor: ClientConstructor) {
        let alias = alias.into();
        log::debug!("registering broker provider: {}", alias);
        self.providers.insert(alias, constructor);
    }

    /// Construct a client from the provider registered under `alias`.
    pub fn create(&self, alias: &str, config: &BrokerConfig) -> Result<Arc<dyn Client>, BrokerError> {
        let constructor = self
            .providers
            .get(alias)
            .ok_or_else(|| BrokerError::UnknownProvider(alias.to_string()))?;
        Ok(constructor(config))
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.providers.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
