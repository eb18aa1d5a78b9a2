mod pinning;
mod system;

pub use pinning::PinningVerifier;
pub use system::SystemVerifier;

/// With `cert-logging`, records the leaf a pin check is about to judge, so a
/// reported mismatch can be reproduced.
fn log_server_cert(_end_entity: &rustls::pki_types::CertificateDer<'_>) {
    #[cfg(feature = "cert-logging")]
    {
        use base64::Engine;
        log::debug!(
            "checking leaf certificate {}",
            base64::engine::general_purpose::STANDARD.encode(_end_entity.as_ref())
        );
    }
}
