//! Shared access policy and signature computation.
//!
//! The signature is computed over the canonical string
//!
//! ```text
//! VERSION.CHANNELID.STARTTIME.EXPIRETIME.PERMISSIONS.ACCESSKEY
//! ```
//!
//! where every component is upper-cased, absent times are empty, and times use
//! the round-trip format `YYYY-MM-DDTHH:MM:SS.fffffffZ`. The SHA-256 digest of
//! that string is encoded as unpadded base64url. Producer and consumer must
//! produce the exact same canonical string, so time formatting is fixed here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::permissions::{SharedAccessPermissions, WILDCARD_ACTION};

/// The signing version produced by [`SharedAccessPolicy::default`].
pub const DEFAULT_VERSION: &str = "1.0";

/// Validity window, version and permissions of a shared access signature.
///
/// Fields are set directly; the policy holds no expiration logic of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAccessPolicy {
    /// Time before which the signature is not yet valid.
    pub start_time: Option<DateTime<Utc>>,
    /// Time after which the signature has expired.
    pub expire_time: Option<DateTime<Utc>>,
    /// Signing version, validated against an allow-list by the consumer.
    pub version: String,
    /// Granted scopes and actions.
    pub permissions: SharedAccessPermissions,
}

impl Default for SharedAccessPolicy {
    /// Version `1.0`, no validity window, wildcard action on the root scope.
    fn default() -> Self {
        Self {
            start_time: None,
            expire_time: None,
            version: DEFAULT_VERSION.to_owned(),
            permissions: SharedAccessPermissions::from_scope_and_action("/", WILDCARD_ACTION),
        }
    }
}

impl SharedAccessPolicy {
    /// Compute the signature of this policy for `channel_id` using `access_key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sasgate_auth::policy::SharedAccessPolicy;
    ///
    /// let policy = SharedAccessPolicy::default();
    /// assert_eq!(
    ///     policy.signature("http://test.com", "12345"),
    ///     "IF6iSQodR6i2Tt6BBKfOKND9fFciPiD-nTP8xE77Xo4",
    /// );
    /// ```
    #[must_use]
    pub fn signature(&self, channel_id: &str, access_key: &str) -> String {
        let digest = Sha256::digest(self.string_to_sign(channel_id, access_key).as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Build the canonical string hashed by [`signature`](Self::signature).
    fn string_to_sign(&self, channel_id: &str, access_key: &str) -> String {
        let start = self.start_time.map(format_time).unwrap_or_default();
        let expire = self.expire_time.map(format_time).unwrap_or_default();
        let permissions = self.permissions.to_string();

        debug!(
            version = %self.version,
            channel_id,
            start = %start,
            expire = %expire,
            permissions = %permissions,
            "Building SAS string to sign"
        );

        [
            self.version.as_str(),
            channel_id,
            start.as_str(),
            expire.as_str(),
            permissions.as_str(),
            access_key,
        ]
        .iter()
        .map(|part| part.to_uppercase())
        .collect::<Vec<_>>()
        .join(".")
    }
}

/// Format a time in the round-trip form with seven fractional digits.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use sasgate_auth::policy::format_time;
///
/// let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
/// assert_eq!(format_time(t), "2024-03-01T12:30:00.0000000Z");
/// ```
#[must_use]
pub fn format_time(time: DateTime<Utc>) -> String {
    let ticks = time.timestamp_subsec_nanos() % 1_000_000_000 / 100;
    format!("{}.{ticks:07}Z", time.format("%Y-%m-%dT%H:%M:%S"))
}

/// Parse a round-trip time. Values without an offset are taken as UTC.
///
/// Returns `None` for anything that is not an ISO 8601 date-time.
#[must_use]
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render a time for log output.
pub(crate) fn display_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(String::new, |t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}
