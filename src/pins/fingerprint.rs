use crate::ConfigError;
use base64::Engine;
use ring::digest::{digest, SHA256};
use rustls::pki_types::CertificateDer;
use rustls::{CertificateError, Error as TlsError};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of every [`Fingerprint`].
pub const FINGERPRINT_LEN: usize = 32;

const SHA256_PREFIX: &str = "sha256/";

/// A SHA-256 digest of a certificate's DER-encoded SubjectPublicKeyInfo.
///
/// Pinning the public key rather than the whole certificate keeps a pin valid
/// across renewals that reuse the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Wraps an already computed digest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let digest = <[u8; FINGERPRINT_LEN]>::try_from(bytes).map_err(|_| {
            ConfigError::InvalidFingerprintLength {
                expected: FINGERPRINT_LEN,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(digest))
    }

    /// Computes the fingerprint of a DER-encoded SubjectPublicKeyInfo.
    pub fn of_spki(spki_der: &[u8]) -> Self {
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(digest(&SHA256, spki_der).as_ref());
        Self(out)
    }

    /// Computes the fingerprint of the public key carried by `cert`.
    pub fn of_certificate(cert: &CertificateDer<'_>) -> Result<Self, TlsError> {
        let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref()).map_err(|e| {
            log::error!("failed to parse certificate public key: {e}");
            TlsError::InvalidCertificate(CertificateError::BadEncoding)
        })?;
        Ok(Self::of_spki(parsed.public_key().raw))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

/// Parses either the HPKP style `sha256/<base64>` form or hex, with or without
/// `:` separators.
impl FromStr for Fingerprint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ConfigError::InvalidFingerprintEncoding {
            value: s.to_owned(),
        };

        if s.is_empty() {
            return Err(invalid());
        }

        let bytes = match s.strip_prefix(SHA256_PREFIX) {
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|_| invalid())?,
            None if s.contains(':') => {
                let digits = join_byte_pairs(s).ok_or_else(invalid)?;
                hex::decode(digits).map_err(|_| invalid())?
            }
            None => hex::decode(s).map_err(|_| invalid())?,
        };

        Self::from_bytes(&bytes)
    }
}

/// Turns `AA:BB:CC` into `AABBCC`. Every separated group must be one byte.
fn join_byte_pairs(s: &str) -> Option<String> {
    let pairs: Vec<&str> = s.split(':').collect();
    pairs
        .iter()
        .all(|pair| pair.len() == 2)
        .then(|| pairs.concat())
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SHA256_PREFIX}{}",
            base64::engine::general_purpose::STANDARD.encode(self.0)
        )
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}
