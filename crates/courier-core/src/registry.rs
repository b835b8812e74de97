use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{KakaoMessageProvider, KakaoProfileProvider};
use crate::error::RegistryError;
use crate::http_client::HttpClient;
use crate::provider::{Executor, Pipeline, Provider};
use crate::ProviderId;

/// Provider lookup table built once at startup and read-only afterwards.
///
/// Owns the HTTP client its providers share so the relay can release it
/// after the workers stop.
pub struct ProviderRegistry {
    http_client: Arc<dyn HttpClient>,
    executors: HashMap<ProviderId, Arc<dyn Executor>>,
}

impl ProviderRegistry {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            executors: HashMap::new(),
        }
    }

    /// Registry with every built-in Kakao provider pointed at `base_url`.
    pub fn with_kakao_providers(
        http_client: Arc<dyn HttpClient>,
        base_url: &str,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(Arc::clone(&http_client));
        registry.register(
            KakaoProfileProvider::new(Arc::clone(&http_client)).with_base_url(base_url),
        )?;
        registry.register(KakaoMessageProvider::new(http_client).with_base_url(base_url))?;
        Ok(registry)
    }

    pub fn http_client(&self) -> Arc<dyn HttpClient> {
        Arc::clone(&self.http_client)
    }

    /// Register a provider behind the standard execution pipeline.
    pub fn register<P>(&mut self, provider: P) -> Result<(), RegistryError>
    where
        P: Provider + 'static,
    {
        self.register_executor(Arc::new(Pipeline::new(provider)))
    }

    pub fn register_executor(&mut self, executor: Arc<dyn Executor>) -> Result<(), RegistryError> {
        let id = executor.name().clone();
        if self.executors.contains_key(&id) {
            return Err(RegistryError::Duplicate(id.to_string()));
        }
        self.executors.insert(id, executor);
        Ok(())
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn Executor>> {
        self.executors.get(id).cloned()
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.executors.keys().cloned().collect();
        ids.sort();
        ids
    }
}
