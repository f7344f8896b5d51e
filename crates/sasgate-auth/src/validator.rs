//! Guard checks for received shared access credentials.
//!
//! Each `ensure_*` function is one precondition that returns an [`AuthError`]
//! on failure. A consumer runs them in this order:
//!
//! 1. [`ensure_parameters_present`]
//! 2. [`ensure_date_range_valid`]
//! 3. [`ensure_version_allowed`]
//! 4. [`ensure_signature_valid`] or [`ensure_signature_valid_with_secondary`]
//! 5. [`ensure_scope_permitted`]
//!
//! [`SasValidator`] bundles the allow-list and clock skew and runs the whole chain.

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::credentials::SharedAccessCredentials;
use crate::error::AuthError;
use crate::policy::display_time;

/// Compare two strings without short-circuiting on the first differing byte.
///
/// Strings of different length compare unequal.
#[must_use]
pub fn secure_equals(first: &str, second: &str) -> bool {
    first.as_bytes().ct_eq(second.as_bytes()).into()
}

/// Fail when the permissions, version or signature is empty.
///
/// # Errors
///
/// Returns [`AuthError::MissingParameters`].
pub fn ensure_parameters_present(credentials: &SharedAccessCredentials) -> Result<(), AuthError> {
    if credentials.contains_sas_credentials() {
        Ok(())
    } else {
        Err(AuthError::MissingParameters)
    }
}

/// Fail when the current time is outside the validity window widened by `clock_skew`.
///
/// # Errors
///
/// Returns [`AuthError::DateRangeInvalid`].
pub fn ensure_date_range_valid(
    credentials: &SharedAccessCredentials,
    clock_skew: Duration,
) -> Result<(), AuthError> {
    ensure_date_range_valid_at(credentials, clock_skew, Utc::now())
}

/// Same as [`ensure_date_range_valid`] with an explicit current time.
///
/// # Errors
///
/// Returns [`AuthError::DateRangeInvalid`] when `now < start - skew` or
/// `now > expire + skew`.
pub fn ensure_date_range_valid_at(
    credentials: &SharedAccessCredentials,
    clock_skew: Duration,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let policy = credentials.policy();
    let not_yet_valid = policy
        .start_time
        .and_then(|start| start.checked_sub_signed(clock_skew))
        .is_some_and(|earliest| now < earliest);
    let expired = policy
        .expire_time
        .and_then(|expire| expire.checked_add_signed(clock_skew))
        .is_some_and(|latest| now > latest);

    if not_yet_valid || expired {
        debug!(
            start = %display_time(policy.start_time),
            expire = %display_time(policy.expire_time),
            now = %now,
            not_yet_valid,
            expired,
            "SAS outside of validity window"
        );
        return Err(AuthError::DateRangeInvalid);
    }
    Ok(())
}

/// Fail when the credentials' version is not in `allowed_versions` (ignoring case).
///
/// # Errors
///
/// Returns [`AuthError::VersionNotAllowed`].
pub fn ensure_version_allowed<S: AsRef<str>>(
    credentials: &SharedAccessCredentials,
    allowed_versions: &[S],
) -> Result<(), AuthError> {
    let version = &credentials.policy().version;
    if allowed_versions
        .iter()
        .any(|allowed| allowed.as_ref().eq_ignore_ascii_case(version))
    {
        Ok(())
    } else {
        Err(AuthError::VersionNotAllowed(version.clone()))
    }
}

/// Fail unless `actual` equals `expected`.
///
/// # Errors
///
/// Returns [`AuthError::SignatureInvalid`].
pub fn ensure_signature_valid(expected: &str, actual: &str) -> Result<(), AuthError> {
    if secure_equals(expected, actual) {
        Ok(())
    } else {
        Err(AuthError::SignatureInvalid)
    }
}

/// Fail unless `actual` equals either the primary or the secondary signature.
///
/// Both comparisons always run.
///
/// # Errors
///
/// Returns [`AuthError::SignatureInvalid`].
pub fn ensure_signature_valid_with_secondary(
    expected_primary: &str,
    expected_secondary: &str,
    actual: &str,
) -> Result<(), AuthError> {
    let primary = secure_equals(expected_primary, actual);
    let secondary = secure_equals(expected_secondary, actual);
    if primary | secondary {
        Ok(())
    } else {
        Err(AuthError::SignatureInvalid)
    }
}

/// Fail when the permissions do not cover `scope` and `action`.
///
/// # Errors
///
/// Returns [`AuthError::ScopeNotPermitted`].
pub fn ensure_scope_permitted(
    credentials: &SharedAccessCredentials,
    scope: &str,
    action: &str,
) -> Result<(), AuthError> {
    if credentials
        .policy()
        .permissions
        .is_scope_permitted(scope, action)
    {
        Ok(())
    } else {
        Err(AuthError::ScopeNotPermitted {
            scope: scope.to_owned(),
            action: action.to_owned(),
        })
    }
}

/// Fail when `absolute_scope` does not start with `negation_scope` (ignoring case).
///
/// This is a plain prefix check. It is not part of [`SasValidator::validate`].
///
/// # Errors
///
/// Returns [`AuthError::NegationScopeNotInRequestUri`].
pub fn ensure_negation_scope_in_request_uri(
    absolute_scope: &str,
    negation_scope: &str,
) -> Result<(), AuthError> {
    if absolute_scope
        .to_lowercase()
        .starts_with(&negation_scope.to_lowercase())
    {
        Ok(())
    } else {
        Err(AuthError::NegationScopeNotInRequestUri)
    }
}

/// Expected signature(s) a received signature is checked against.
#[derive(Debug, Clone, Copy)]
pub enum ExpectedSignature<'a> {
    /// A single signature.
    Single(&'a str),
    /// Primary and secondary signatures during key rotation.
    Rotating {
        /// Signature computed with the primary key.
        primary: &'a str,
        /// Signature computed with the secondary key.
        secondary: &'a str,
    },
}

/// Runs the full guard chain with a fixed version allow-list and clock skew.
#[derive(Debug, Clone)]
pub struct SasValidator {
    allowed_versions: Vec<String>,
    clock_skew: Duration,
}

impl SasValidator {
    /// Create a validator.
    #[must_use]
    pub fn new(allowed_versions: Vec<String>, clock_skew: Duration) -> Self {
        Self {
            allowed_versions,
            clock_skew,
        }
    }

    /// The accepted versions.
    #[must_use]
    pub fn allowed_versions(&self) -> &[String] {
        &self.allowed_versions
    }

    /// The tolerated clock skew.
    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Run every check against the current time.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first failing check.
    pub fn validate(
        &self,
        credentials: &SharedAccessCredentials,
        expected: ExpectedSignature<'_>,
        scope: &str,
        action: &str,
    ) -> Result<(), AuthError> {
        self.validate_at(credentials, expected, scope, action, Utc::now())
    }

    /// Run every check against `now`.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first failing check.
    pub fn validate_at(
        &self,
        credentials: &SharedAccessCredentials,
        expected: ExpectedSignature<'_>,
        scope: &str,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        ensure_parameters_present(credentials)?;
        ensure_date_range_valid_at(credentials, self.clock_skew, now)?;
        ensure_version_allowed(credentials, self.allowed_versions.as_slice())?;
        match expected {
            ExpectedSignature::Single(signature) => {
                ensure_signature_valid(signature, credentials.signature())?;
            }
            ExpectedSignature::Rotating { primary, secondary } => {
                ensure_signature_valid_with_secondary(primary, secondary, credentials.signature())?;
            }
        }
        ensure_scope_permitted(credentials, scope, action)?;

        debug!(scope, action, "SAS validation succeeded");
        Ok(())
    }
}
