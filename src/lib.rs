#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use rustls::{client::WantsClientCert, ClientConfig, ConfigBuilder, WantsVerifier};

mod client;
mod configurator;
mod error;
mod pins;
mod verification;

pub use client::SharedClient;
pub use configurator::TrustConfigurator;
pub use error::{ConfigError, TrustRejected};
pub use pins::{
    Fingerprint, HostIdentity, HostPins, PinConfig, PinSet, PinStore, PinStoreHandle,
    TrustDecision, FINGERPRINT_LEN,
};
pub use verification::{PinningVerifier, SystemVerifier};


/// Extension trait to help configure [`ClientConfig`]s with a pinning policy.
pub trait BuilderPinningExt {
    /// Configures the `ClientConfig` with the policy built by `configurator`.
    ///
    /// ```rust
    /// use rustls::ClientConfig;
    /// use rustls_pinning_verifier::{BuilderPinningExt, PinStore, TrustConfigurator};
    /// use std::sync::Arc;
    ///
    /// let configurator = TrustConfigurator::new(PinStore::empty());
    /// let config = ClientConfig::builder_with_provider(Arc::new(
    ///     rustls::crypto::ring::default_provider(),
    /// ))
    /// .with_safe_default_protocol_versions()
    /// .unwrap()
    /// .with_pinning_verifier(&configurator)
    /// .with_no_client_auth();
    /// ```
    fn with_pinning_verifier(
        self,
        configurator: &TrustConfigurator,
    ) -> ConfigBuilder<ClientConfig, WantsClientCert>;
}

impl BuilderPinningExt for ConfigBuilder<ClientConfig, WantsVerifier> {
    fn with_pinning_verifier(
        self,
        configurator: &TrustConfigurator,
    ) -> ConfigBuilder<ClientConfig, WantsClientCert> {
        let verifier = configurator.verifier_for(self.crypto_provider());
        self.dangerous().with_custom_certificate_verifier(verifier)
    }
}
