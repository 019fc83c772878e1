use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lokalise_manager::{ClientConfig, ClientFactory, RemoteApi, RemoteError};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::LokaliseClient;

/// Connection settings taken from the `timeouts` option bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transport {
    pub open_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    pub api_host: Option<String>,
}

impl Transport {
    /// Read `open_timeout`, `timeout` (seconds) and `api_host`. Other keys
    /// and values of the wrong shape are ignored.
    pub fn from_options(options: &Map<String, Value>) -> Self {
        let seconds = |key: &str| {
            options
                .get(key)
                .and_then(Value::as_f64)
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
        };

        Self {
            open_timeout: seconds("open_timeout"),
            timeout: seconds("timeout"),
            api_host: options
                .get("api_host")
                .and_then(Value::as_str)
                .map(str::to_owned),
        }
    }

    fn build_client(&self) -> Result<reqwest::Client, RemoteError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("lokalise-manager-rs/", env!("CARGO_PKG_VERSION")))
            .gzip(true);
        if let Some(open_timeout) = self.open_timeout {
            builder = builder.connect_timeout(open_timeout);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| RemoteError::network(format!("failed to build HTTP client: {e}")))
    }
}

/// Builds [`LokaliseClient`]s that share one connection pool.
///
/// The pool is rebuilt when a client is requested with different transport
/// settings, or after [`ClientFactory::reset`].
#[derive(Default)]
pub struct LokaliseClientFactory {
    shared: Mutex<Option<(Transport, reqwest::Client)>>,
}

impl LokaliseClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn pooled_client(&self, transport: &Transport) -> Result<reqwest::Client, RemoteError> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((current, client)) = shared.as_ref()
            && current == transport
        {
            return Ok(client.clone());
        }

        debug!(?transport, "building HTTP connection pool");
        let client = transport.build_client()?;
        *shared = Some((transport.clone(), client.clone()));
        Ok(client)
    }

    /// Whether a connection pool is currently held.
    pub fn is_pooled(&self) -> bool {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl ClientFactory for LokaliseClientFactory {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn RemoteApi>, RemoteError> {
        let transport = Transport::from_options(&config.options);
        let http = self.pooled_client(&transport)?;

        let mut client = LokaliseClient::new(http, config.token.clone(), config.oauth2);
        if let Some(host) = &transport.api_host {
            client = client.with_api_host(host.clone());
        }
        Ok(Arc::new(client))
    }

    fn reset(&self) {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
