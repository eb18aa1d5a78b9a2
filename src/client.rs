use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use std::sync::{Arc, PoisonError, RwLock};

/// The process-wide TLS client configuration, passed around explicitly.
///
/// Every new connection takes a snapshot of the current configuration.
/// [`reconfigure`](SharedClient::reconfigure) publishes a new snapshot, so
/// connections opened before a change keep the policy they were opened with.
///
/// To drive an HTTP client from it, hand a snapshot to the client's builder,
/// for example `reqwest::ClientBuilder::use_preconfigured_tls((*shared.config()).clone())`.
#[derive(Debug)]
pub struct SharedClient {
    config: RwLock<Arc<ClientConfig>>,
}

impl SharedClient {
    /// Wraps the application's client configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// The configuration new connections are opened with.
    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Modifies the configuration in place.
    ///
    /// Snapshots already handed out are left untouched; the change applies to
    /// connections opened afterwards.
    pub fn reconfigure(&self, configure: impl FnOnce(&mut ClientConfig)) {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        configure(Arc::make_mut(&mut current));
    }

    /// Starts a TLS session with `server_name` using the current configuration.
    pub fn connect(&self, server_name: ServerName<'static>) -> Result<ClientConnection, rustls::Error> {
        ClientConnection::new(self.config(), server_name)
    }
}

impl From<ClientConfig> for SharedClient {
    fn from(config: ClientConfig) -> Self {
        Self::new(config)
    }
}
