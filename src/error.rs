use crate::pins::{Fingerprint, HostIdentity};
use thiserror::Error;

/// A pin configuration was structurally invalid.
///
/// These errors are only produced while building a [`PinStore`](crate::PinStore)
/// and are meant to stop startup: a half-configured trust policy is never installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A host was listed without any acceptable fingerprints.
    #[error("host `{host}` has no pinned fingerprints")]
    EmptyPinSet {
        /// The offending host, as written in the configuration.
        host: String,
    },

    /// A fingerprint decoded to the wrong number of bytes.
    #[error("fingerprint is {actual} bytes long, expected {expected}")]
    InvalidFingerprintLength {
        /// The digest length every fingerprint must have.
        expected: usize,
        /// The decoded length.
        actual: usize,
    },

    /// A fingerprint was neither `sha256/<base64>` nor hex.
    #[error("fingerprint `{value}` is neither `sha256/<base64>` nor hex")]
    InvalidFingerprintEncoding {
        /// The text that failed to decode.
        value: String,
    },

    /// A host name can't be used as a pin lookup key.
    #[error("`{host}` is not a pinnable host name: {reason}")]
    InvalidHost {
        /// The host, as written in the configuration.
        host: String,
        /// Why the name was refused.
        reason: &'static str,
    },

    /// The same host appeared more than once after normalization.
    #[error("host `{host}` is configured more than once")]
    DuplicateHost {
        /// The normalized host name.
        host: String,
    },
}

/// A pinned host presented a certificate whose public key isn't in its pin set.
///
/// Surfaced to rustls as [`rustls::CertificateError::Other`] so that the
/// handshake fails. Retrying the same connection will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("certificate public key {presented} is not pinned for {host}")]
pub struct TrustRejected {
    /// The host the handshake was made against.
    pub host: HostIdentity,
    /// The SPKI fingerprint of the leaf certificate the server presented.
    pub presented: Fingerprint,
}
