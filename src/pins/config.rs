/// The textual shape of a pin database.
///
/// Where this comes from (a bundled resource, build-time constants, a remote
/// fetch) is up to the application. With the `serde` feature enabled it can be
/// deserialized directly, e.g. from JSON:
///
/// ```json
/// { "hosts": [ { "host": "api.example.com", "pins": ["sha256/..."] } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct PinConfig {
    /// One entry per pinned host.
    #[cfg_attr(feature = "serde", serde(default))]
    pub hosts: Vec<HostPins>,
}

/// The pins configured for a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct HostPins {
    /// Host name; normalized when the store is built.
    pub host: String,
    /// Fingerprints in `sha256/<base64>` or hex form.
    pub pins: Vec<String>,
}
