use once_cell::sync::OnceCell;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, OtherError, RootCertStore, SignatureScheme};
use std::sync::Arc;

/// Standard chain and host name validation against the platform's trust store.
///
/// This is what unpinned hosts are held to, and what pinned hosts must pass
/// before their pins are consulted. The trust store is read on the first
/// handshake rather than at construction, so installing a policy at startup
/// never touches the filesystem.
#[derive(Debug)]
pub struct SystemVerifier {
    provider: Arc<CryptoProvider>,
    extra_roots: RootCertStore,
    webpki: OnceCell<Arc<WebPkiServerVerifier>>,
}

impl SystemVerifier {
    /// Validates against the platform's roots, using `provider` for signatures.
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self {
            provider,
            extra_roots: RootCertStore::empty(),
            webpki: OnceCell::new(),
        }
    }

    /// Like [`new`](Self::new), but also trusts `roots`.
    ///
    /// # Errors
    ///
    /// Fails if any of `roots` isn't a usable trust anchor.
    pub fn with_extra_roots(
        provider: Arc<CryptoProvider>,
        roots: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Result<Self, TlsError> {
        let mut verifier = Self::new(provider);
        for root in roots {
            verifier.extra_roots.add(root)?;
        }
        Ok(verifier)
    }

    fn webpki(&self) -> Result<&Arc<WebPkiServerVerifier>, TlsError> {
        self.webpki.get_or_try_init(|| {
            let roots = trust_anchors(self.extra_roots.clone());
            WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&self.provider))
                .build()
                .map_err(|e| TlsError::Other(OtherError(Arc::new(e))))
        })
    }
}

/// Adds the platform's roots to `store`. The bundled Mozilla roots stand in
/// when the platform has none to offer.
fn trust_anchors(mut store: RootCertStore) -> RootCertStore {
    #[cfg(not(target_arch = "wasm32"))]
    let from_system = add_native_roots(&mut store);
    #[cfg(target_arch = "wasm32")]
    let from_system = 0;

    if from_system == 0 {
        log::warn!("no usable system roots, trusting the bundled webpki-roots set");
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    log::debug!("trust store holds {} roots", store.len());
    store
}

#[cfg(not(target_arch = "wasm32"))]
fn add_native_roots(store: &mut RootCertStore) -> usize {
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        log::warn!("skipping system root store entry: {err}");
    }

    let (added, unusable) = store.add_parsable_certificates(native.certs);
    if unusable > 0 {
        log::warn!("{unusable} system roots could not be used as trust anchors");
    }
    added
}

impl ServerCertVerifier for SystemVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let verdict = self.webpki()?.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        );
        if let Err(err) = &verdict {
            log::error!("standard validation of {server_name:?} failed: {err}");
        }
        verdict
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.webpki()?.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.webpki()?.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
