use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RemoteError;
use crate::remote::RemoteApi;

/// What a factory needs to build a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub token: String,
    /// Use the OAuth2 flavour of authentication instead of an API token.
    pub oauth2: bool,
    /// Transport options (timeouts, alternate host). Not interpreted here.
    pub options: Map<String, Value>,
}

/// Builds remote clients.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn RemoteApi>, RemoteError>;

    /// Drop any state the factory shares between the clients it builds.
    fn reset(&self) {}
}

/// Lazily builds and caches the client for one task.
pub struct ApiClient {
    factory: Arc<dyn ClientFactory>,
    cached: Mutex<Option<Arc<dyn RemoteApi>>>,
}

impl ApiClient {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            cached: Mutex::new(None),
        }
    }

    /// The cached client, building it on first use.
    pub fn get(&self, config: &ClientConfig) -> Result<Arc<dyn RemoteApi>, RemoteError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = cached.as_ref() {
            return Ok(Arc::clone(client));
        }

        debug!(oauth2 = config.oauth2, "building API client");
        let client = self.factory.build(config)?;
        *cached = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Forget the cached client and reset the factory's shared state.
    /// Must not race with in-flight requests.
    pub fn reset(&self) {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.factory.reset();
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}
