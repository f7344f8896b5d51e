//! Gateway configuration.
//!
//! Provides [`SasConfig`]. Values are loaded from environment variables; the
//! shared secrets are passed explicitly to the authorizer from here and are
//! never serialized or printed.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Upper bound applied to the configured clock skew.
const MAX_CLOCK_SKEW_SECS: u64 = 86_400;

/// SAS gateway configuration.
///
/// # Examples
///
/// ```
/// use sasgate_auth::config::SasConfig;
///
/// let config = SasConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:4580");
/// assert_eq!(config.allowed_versions, vec!["1.0".to_owned()]);
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SasConfig {
    /// Bind address for the gateway (e.g. `"0.0.0.0:4580"`).
    #[builder(default = String::from("0.0.0.0:4580"))]
    pub gateway_listen: String,

    /// Scheme and authority used to rebuild the channel id of incoming callbacks.
    #[builder(default = String::from("http://localhost:4580"))]
    pub public_base_url: String,

    /// Primary shared secret.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing, default)]
    pub secret_key: Option<String>,

    /// Secondary shared secret accepted during key rotation.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing, default)]
    pub secondary_secret_key: Option<String>,

    /// Accepted `sv` values.
    #[builder(default = vec![String::from("1.0")])]
    pub allowed_versions: Vec<String>,

    /// Clock skew tolerated on both ends of the validity window, in seconds.
    #[builder(default = 300)]
    pub clock_skew_secs: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl std::fmt::Debug for SasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("public_base_url", &self.public_base_url)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "..."))
            .field(
                "secondary_secret_key",
                &self.secondary_secret_key.as_ref().map(|_| "..."),
            )
            .field("allowed_versions", &self.allowed_versions)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for SasConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:4580"),
            public_base_url: String::from("http://localhost:4580"),
            secret_key: None,
            secondary_secret_key: None,
            allowed_versions: vec![String::from("1.0")],
            clock_skew_secs: 300,
            log_level: String::from("info"),
        }
    }
}

impl SasConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:4580` |
    /// | `PUBLIC_BASE_URL` | `http://localhost:4580` |
    /// | `SECRET_KEY` | *(unset)* |
    /// | `SECONDARY_SECRET_KEY` | *(unset)* |
    /// | `SAS_ALLOWED_VERSIONS` | `1.0` |
    /// | `SAS_CLOCK_SKEW_SECS` | `300` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("PUBLIC_BASE_URL") {
            config.public_base_url = v;
        }
        if let Ok(v) = std::env::var("SECRET_KEY") {
            config.secret_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("SECONDARY_SECRET_KEY") {
            config.secondary_secret_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("SAS_ALLOWED_VERSIONS") {
            let versions = parse_list(&v);
            if !versions.is_empty() {
                config.allowed_versions = versions;
            }
        }
        if let Ok(v) = std::env::var("SAS_CLOCK_SKEW_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                config.clock_skew_secs = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// The clock skew as a duration, capped at one day.
    #[must_use]
    pub fn clock_skew(&self) -> chrono::Duration {
        let secs = self.clock_skew_secs.min(MAX_CLOCK_SKEW_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or_default())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Split a comma-separated list, trimming whitespace and dropping empty items.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
