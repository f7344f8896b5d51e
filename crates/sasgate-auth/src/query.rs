//! Query-string encoding of shared access credentials.
//!
//! The producer appends the following parameters to a callback URI:
//!
//! - `st` - Start time, round-trip ISO 8601 (only when set)
//! - `se` - Expire time, round-trip ISO 8601 (only when set)
//! - `sp` - Serialized permissions
//! - `sv` - Signing version
//! - `sig` - Base64url signature
//!
//! The consumer reads them back from an incoming request. Names match
//! case-insensitively. A parameter that is missing, or present more than once,
//! is read as empty so that the validator reports missing parameters instead of
//! failing on a malformed value.

use tracing::debug;

use crate::credentials::{
    EXPIRE_TIME_PARAM, PERMISSIONS_PARAM, SIGNATURE_PARAM, START_TIME_PARAM, SharedAccessCredentials,
    VERSION_PARAM,
};
use crate::permissions::SharedAccessPermissions;
use crate::policy::{SharedAccessPolicy, format_time, parse_time};

/// Append the SAS query parameters for `credentials` to `uri`.
///
/// An existing query string is kept and a fragment stays at the end.
///
/// # Examples
///
/// ```
/// use sasgate_auth::credentials::SharedAccessCredentials;
/// use sasgate_auth::policy::SharedAccessPolicy;
/// use sasgate_auth::query::uri_with_sas_credentials;
///
/// let credentials = SharedAccessCredentials::new(SharedAccessPolicy::default(), "abc");
/// assert_eq!(
///     uri_with_sas_credentials("http://test.com/hook?id=1", &credentials),
///     "http://test.com/hook?id=1&sp=%2F%2F*&sv=1.0&sig=abc",
/// );
/// ```
#[must_use]
pub fn uri_with_sas_credentials(uri: &str, credentials: &SharedAccessCredentials) -> String {
    let (base, fragment) = match uri.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (uri, None),
    };

    let policy = credentials.policy();
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(start) = policy.start_time {
        serializer.append_pair(START_TIME_PARAM, &format_time(start));
    }
    if let Some(expire) = policy.expire_time {
        serializer.append_pair(EXPIRE_TIME_PARAM, &format_time(expire));
    }
    serializer.append_pair(PERMISSIONS_PARAM, &policy.permissions.to_string());
    serializer.append_pair(VERSION_PARAM, &policy.version);
    serializer.append_pair(SIGNATURE_PARAM, credentials.signature());
    let sas_query = serializer.finish();

    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut result = format!("{base}{separator}{sas_query}");
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }
    result
}

/// Sign `url` as its own channel id with the default policy and append the
/// credentials to it.
///
/// The default policy is version `1.0`, no validity window, and the wildcard
/// action on the root scope.
#[must_use]
pub fn generate_sas_uri(url: &str, secret_key: &str) -> String {
    let credentials = SharedAccessCredentials::sign(SharedAccessPolicy::default(), url, secret_key);
    uri_with_sas_credentials(url, &credentials)
}

/// Read credentials from a raw query string (without the leading `?`).
#[must_use]
pub fn credentials_from_query(query: &str) -> SharedAccessCredentials {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let policy = SharedAccessPolicy {
        start_time: single_value(&pairs, START_TIME_PARAM).and_then(parse_time),
        expire_time: single_value(&pairs, EXPIRE_TIME_PARAM).and_then(parse_time),
        version: single_value(&pairs, VERSION_PARAM)
            .unwrap_or_default()
            .to_owned(),
        permissions: SharedAccessPermissions::from_serialized(
            single_value(&pairs, PERMISSIONS_PARAM).unwrap_or_default(),
        ),
    };
    let signature = single_value(&pairs, SIGNATURE_PARAM).unwrap_or_default();

    debug!(
        version = %policy.version,
        permissions = %policy.permissions,
        has_start = policy.start_time.is_some(),
        has_expire = policy.expire_time.is_some(),
        has_signature = !signature.is_empty(),
        "Parsed SAS query parameters"
    );

    SharedAccessCredentials::new(policy, signature)
}

/// Read credentials from the query of `uri`.
#[must_use]
pub fn credentials_from_uri(uri: &http::Uri) -> SharedAccessCredentials {
    credentials_from_query(uri.query().unwrap_or(""))
}

/// Read credentials from an incoming request.
#[must_use]
pub fn credentials_from_request(parts: &http::request::Parts) -> SharedAccessCredentials {
    credentials_from_uri(&parts.uri)
}

/// Look up a query parameter that appears exactly once, matching the name
/// case-insensitively.
#[must_use]
pub fn query_value(query: &str, name: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    single_value(&pairs, name).map(ToOwned::to_owned)
}

fn single_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    let mut matches = pairs
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str());
    let first = matches.next()?;
    matches.next().is_none().then_some(first)
}
