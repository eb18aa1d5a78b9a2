mod config;
mod fingerprint;
mod host;
mod rotation;

pub use config::{HostPins, PinConfig};
pub use fingerprint::{Fingerprint, FINGERPRINT_LEN};
pub use host::HostIdentity;
pub use rotation::PinStoreHandle;

use crate::ConfigError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The verdict of checking a presented key against a host's pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// The presented key is one of the host's pins.
    Trusted,
    /// The host is pinned and the presented key is not one of its pins.
    Rejected,
}

/// The non-empty set of fingerprints accepted for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSet(HashSet<Fingerprint>);

impl PinSet {
    fn new(host: &str, pins: impl IntoIterator<Item = Fingerprint>) -> Result<Self, ConfigError> {
        let pins: HashSet<_> = pins.into_iter().collect();
        if pins.is_empty() {
            return Err(ConfigError::EmptyPinSet {
                host: host.to_owned(),
            });
        }
        Ok(Self(pins))
    }

    /// Exact membership: a key is trusted only if its whole digest is pinned.
    pub fn decide(&self, presented: &Fingerprint) -> TrustDecision {
        if self.0.contains(presented) {
            TrustDecision::Trusted
        } else {
            TrustDecision::Rejected
        }
    }

    /// Returns `true` if `fingerprint` is pinned.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.0.contains(fingerprint)
    }

    /// Iterates over the pinned fingerprints, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.0.iter()
    }

    /// Number of pinned fingerprints. Never zero.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with [`PinSet::len`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The authoritative mapping from host to accepted public key fingerprints.
///
/// A `PinStore` is immutable once built, so any number of handshakes can
/// look it up at the same time without locking. To change pins at runtime,
/// build a new store and swap it in with a [`PinStoreHandle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinStore {
    hosts: HashMap<HostIdentity, PinSet>,
}

impl PinStore {
    /// A store that pins nothing; every host falls through to standard validation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a store from `(host, fingerprints)` entries.
    ///
    /// # Errors
    ///
    /// Fails if a host name is invalid, a host is listed twice, or a host has
    /// no fingerprints. Nothing is silently dropped.
    pub fn new<H, P>(entries: impl IntoIterator<Item = (H, P)>) -> Result<Self, ConfigError>
    where
        H: AsRef<str>,
        P: IntoIterator<Item = Fingerprint>,
    {
        let mut hosts = HashMap::new();
        for (host, pins) in entries {
            let host = host.as_ref();
            let identity = HostIdentity::new(host)?;
            let pins = PinSet::new(host, pins)?;

            if hosts.contains_key(&identity) {
                return Err(ConfigError::DuplicateHost {
                    host: identity.to_string(),
                });
            }
            hosts.insert(identity, pins);
        }

        log::debug!("built pin store covering {} host(s)", hosts.len());
        Ok(Self { hosts })
    }

    /// Builds a store from its textual configuration.
    pub fn from_config(config: &PinConfig) -> Result<Self, ConfigError> {
        let entries = config
            .hosts
            .iter()
            .map(|entry| {
                let pins = entry
                    .pins
                    .iter()
                    .map(|pin| pin.parse::<Fingerprint>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((entry.host.as_str(), pins))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Self::new(entries)
    }

    /// Returns the pins for `host`. Matching is exact: an entry for
    /// `example.com` says nothing about `sub.example.com`.
    pub fn lookup(&self, host: &HostIdentity) -> Option<&PinSet> {
        self.hosts.get(host)
    }

    /// Normalizes `name` and looks it up. Names that can't be pinned
    /// (IP addresses, wildcards, ...) have no pins.
    pub fn lookup_name(&self, name: &str) -> Option<&PinSet> {
        HostIdentity::new(name)
            .ok()
            .and_then(|host| self.lookup(&host))
    }

    /// Checks `presented` against the pins for `host`.
    ///
    /// Returns `None` when the host isn't pinned, in which case the caller's
    /// standard validation decides alone.
    pub fn decide(&self, host: &HostIdentity, presented: &Fingerprint) -> Option<TrustDecision> {
        self.lookup(host).map(|pins| pins.decide(presented))
    }

    /// Iterates over the pinned hosts, in no particular order.
    pub fn hosts(&self) -> impl Iterator<Item = &HostIdentity> {
        self.hosts.keys()
    }

    /// Number of pinned hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns `true` if no host is pinned.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Where a verifier reads its pins from on each handshake.
#[derive(Debug, Clone)]
pub(crate) enum PinSource {
    Fixed(Arc<PinStore>),
    Rotating(Arc<PinStoreHandle>),
}

impl PinSource {
    pub(crate) fn snapshot(&self) -> Arc<PinStore> {
        match self {
            Self::Fixed(store) => Arc::clone(store),
            Self::Rotating(handle) => handle.snapshot(),
        }
    }
}
