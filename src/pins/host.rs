use crate::ConfigError;
use rustls::pki_types::{DnsName, ServerName};
use std::fmt;
use std::net::IpAddr;

/// A normalized server host name, used as the key for pin lookups.
///
/// Normalization lowercases ASCII, drops a single trailing dot and refuses
/// anything that isn't a plain DNS name: ports, IP addresses and wildcard
/// labels are all rejected so that a pin can never apply to more hosts than
/// the one it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostIdentity(String);

impl HostIdentity {
    /// Normalizes `name` into a host identity.
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidHost {
            host: name.to_owned(),
            reason,
        };

        let trimmed = name.strip_suffix('.').unwrap_or(name);
        if trimmed.is_empty() {
            return Err(invalid("name is empty"));
        }
        if trimmed.split('.').any(str::is_empty) {
            return Err(invalid("name has an empty label"));
        }
        if trimmed.parse::<IpAddr>().is_ok() {
            return Err(invalid("IP addresses can't be pinned"));
        }
        if trimmed.contains(':') {
            return Err(invalid("name must not carry a port"));
        }
        if trimmed.split('.').any(|label| label.contains('*')) {
            return Err(invalid("wildcard names are not supported"));
        }

        let normalized = trimmed.to_ascii_lowercase();
        DnsName::try_from(normalized.as_str()).map_err(|_| invalid("not a valid DNS name"))?;

        Ok(Self(normalized))
    }

    /// Returns the identity of the server a handshake is being made against,
    /// or `None` if the server is addressed by IP.
    pub fn from_server_name(server_name: &ServerName<'_>) -> Option<Self> {
        match server_name {
            ServerName::DnsName(dns) => Self::new(dns.as_ref()).ok(),
            _ => None,
        }
    }

    /// The normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for HostIdentity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
