use crate::pins::{PinSource, PinStore, PinStoreHandle};
use crate::verification::{PinningVerifier, SystemVerifier};
use crate::SharedClient;
use once_cell::sync::OnceCell;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::ClientConfig;
use std::sync::Arc;

/// Installs the pinning policy into the application's shared TLS client.
///
/// The policy is built once, the first time it is needed, and the same
/// [`PinningVerifier`] is installed on every later call. Calling
/// [`setup_client`](TrustConfigurator::setup_client) twice is therefore the
/// same as calling it once.
#[derive(Debug)]
pub struct TrustConfigurator {
    pins: PinSource,
    fallback: Option<Arc<dyn ServerCertVerifier>>,
    crypto_provider: Option<Arc<CryptoProvider>>,
    verifier: OnceCell<Arc<PinningVerifier>>,
}

impl TrustConfigurator {
    /// Creates a configurator that pins according to `pins`.
    ///
    /// Unless [`with_fallback_verifier`](Self::with_fallback_verifier) is used,
    /// standard validation is done by a [`SystemVerifier`].
    pub fn new(pins: PinStore) -> Self {
        Self::from_source(PinSource::Fixed(Arc::new(pins)))
    }

    /// Creates a configurator whose pins can be rotated through `handle`.
    pub fn with_rotating_pins(handle: Arc<PinStoreHandle>) -> Self {
        Self::from_source(PinSource::Rotating(handle))
    }

    fn from_source(pins: PinSource) -> Self {
        Self {
            pins,
            fallback: None,
            crypto_provider: None,
            verifier: OnceCell::new(),
        }
    }

    /// Uses `verifier` for standard chain validation instead of the system roots.
    pub fn with_fallback_verifier(mut self, verifier: Arc<dyn ServerCertVerifier>) -> Self {
        self.fallback = Some(verifier);
        // A policy built by an earlier setup no longer reflects this configurator.
        self.verifier = OnceCell::new();
        self
    }

    /// Uses `crypto_provider` for the system verifier instead of the client's provider.
    pub fn with_provider(mut self, crypto_provider: Arc<CryptoProvider>) -> Self {
        self.crypto_provider = Some(crypto_provider);
        self.verifier = OnceCell::new();
        self
    }

    /// The installed policy, once a client has been set up.
    pub fn verifier(&self) -> Option<&Arc<PinningVerifier>> {
        self.verifier.get()
    }

    pub(crate) fn verifier_for(&self, client_provider: &Arc<CryptoProvider>) -> Arc<PinningVerifier> {
        let verifier = self.verifier.get_or_init(|| {
            let inner = match &self.fallback {
                Some(fallback) => Arc::clone(fallback),
                None => {
                    let provider = self.crypto_provider.as_ref().unwrap_or(client_provider);
                    Arc::new(SystemVerifier::new(Arc::clone(provider)))
                }
            };
            Arc::new(PinningVerifier::from_source(self.pins.clone(), inner))
        });
        Arc::clone(verifier)
    }

    /// Installs the pinning policy into `client`.
    ///
    /// Every handshake made with `client` afterwards is checked by the policy.
    /// Repeated calls re-install the same policy.
    pub fn setup_client(&self, client: &mut ClientConfig) {
        let verifier = self.verifier_for(client.crypto_provider());
        log::debug!(
            "installing TLS pinning policy covering {} host(s)",
            verifier.pins().len()
        );
        client.dangerous().set_certificate_verifier(verifier);
    }

    /// Installs the pinning policy into the shared client.
    ///
    /// Connections opened from earlier snapshots of `client` keep the policy
    /// they were opened with.
    pub fn setup_shared_client(&self, client: &SharedClient) {
        client.reconfigure(|config| self.setup_client(config));
    }
}
