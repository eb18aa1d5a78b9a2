use super::log_server_cert;
use crate::pins::{PinSource, PinStore, PinStoreHandle};
use crate::{Fingerprint, HostIdentity, TrustDecision, TrustRejected};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types;
use rustls::{
    CertificateError, DigitallySignedStruct, Error as TlsError, OtherError, SignatureScheme,
};
use std::sync::Arc;

/// A TLS certificate verifier that pins public keys for selected hosts.
///
/// Every certificate is first held to the wrapped verifier's standard chain
/// and name validation. If that passes and the server is a pinned host, the
/// leaf's public key must also be one of the host's pins. Hosts without pins
/// get exactly the wrapped verifier's verdict.
#[derive(Debug)]
pub struct PinningVerifier {
    pins: PinSource,
    inner: Arc<dyn ServerCertVerifier>,
}

impl PinningVerifier {
    /// Creates a verifier that checks `pins` on top of `inner`.
    pub fn new(pins: PinStore, inner: Arc<dyn ServerCertVerifier>) -> Self {
        Self::from_source(PinSource::Fixed(Arc::new(pins)), inner)
    }

    /// Creates a verifier that reads the current pins from `handle` on every handshake.
    pub fn with_rotating_pins(handle: Arc<PinStoreHandle>, inner: Arc<dyn ServerCertVerifier>) -> Self {
        Self::from_source(PinSource::Rotating(handle), inner)
    }

    pub(crate) fn from_source(pins: PinSource, inner: Arc<dyn ServerCertVerifier>) -> Self {
        Self { pins, inner }
    }

    /// The pins new handshakes are checked against.
    pub fn pins(&self) -> Arc<PinStore> {
        self.pins.snapshot()
    }

    fn check_pins(
        &self,
        end_entity: &pki_types::CertificateDer<'_>,
        server_name: &pki_types::ServerName<'_>,
    ) -> Result<(), TlsError> {
        let Some(host) = HostIdentity::from_server_name(server_name) else {
            return Ok(());
        };

        let pins = self.pins.snapshot();
        let Some(pin_set) = pins.lookup(&host) else {
            log::debug!("{host} is not pinned, using standard validation only");
            return Ok(());
        };

        let presented = Fingerprint::of_certificate(end_entity)?;
        match pin_set.decide(&presented) {
            TrustDecision::Trusted => {
                log::debug!("{host} presented pinned key {presented}");
                Ok(())
            }
            TrustDecision::Rejected => {
                let rejected = TrustRejected { host, presented };
                log::error!("TLS pin check failed: {rejected}");
                Err(TlsError::InvalidCertificate(CertificateError::Other(
                    OtherError(Arc::new(rejected)),
                )))
            }
        }
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &pki_types::CertificateDer<'_>,
        intermediates: &[pki_types::CertificateDer<'_>],
        server_name: &pki_types::ServerName,
        ocsp_response: &[u8],
        now: pki_types::UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        log_server_cert(end_entity);

        let verified = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        )?;

        self.check_pins(end_entity, server_name)?;
        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
