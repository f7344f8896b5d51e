//! Error types for SAS authorization.
//!
//! Every validation failure is an [`AuthError`]. All of them surface to the
//! client as `401 Unauthorized`; [`ErrorResponse`] carries the status and message
//! the HTTP layer writes back.

use http::StatusCode;

/// Message for requests that lack one of the required SAS parameters.
pub const MISSING_PARAMETERS_MESSAGE: &str = "SharedAccess Parameter Missing";

/// Message for expired, not-yet-valid, unsupported or badly signed credentials.
pub const CREDENTIALS_INVALID_MESSAGE: &str = "Authentication Credentials Invalid";

/// Message for credentials that do not grant the requested scope and action.
pub const SCOPE_NOT_PERMITTED_MESSAGE: &str = "Authentication Credentials Invalid For ScopeAction";

/// Errors that can occur while validating Shared Access Signature credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// `sp`, `sv` or `sig` is empty or absent.
    #[error("{}", MISSING_PARAMETERS_MESSAGE)]
    MissingParameters,

    /// The current time is outside the `st`..`se` window (including clock skew).
    #[error("{}", CREDENTIALS_INVALID_MESSAGE)]
    DateRangeInvalid,

    /// The `sv` value is not in the allow-list.
    #[error("{}", CREDENTIALS_INVALID_MESSAGE)]
    VersionNotAllowed(String),

    /// The provided signature matches none of the expected signatures.
    #[error("{}", CREDENTIALS_INVALID_MESSAGE)]
    SignatureInvalid,

    /// The permissions do not cover the requested scope and action.
    #[error("{}", SCOPE_NOT_PERMITTED_MESSAGE)]
    ScopeNotPermitted {
        /// Requested scope.
        scope: String,
        /// Requested action.
        action: String,
    },

    /// The request URI scope does not start with the negation scope.
    #[error("{}", SCOPE_NOT_PERMITTED_MESSAGE)]
    NegationScopeNotInRequestUri,

    /// The request path does not belong to a protected endpoint.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

impl AuthError {
    /// HTTP status code the failure maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Errors raised while assembling the authorizer from configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No primary secret key is configured.
    #[error("SECRET_KEY is not configured")]
    MissingSecretKey,

    /// The allow-list of versions is empty.
    #[error("at least one SAS version must be allowed")]
    NoAllowedVersions,
}

/// Returned when an [`ErrorResponse`] is built with an informational or success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("status code {0} is not an error status")]
pub struct InvalidErrorStatus(pub StatusCode);

/// An HTTP error status paired with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    status: StatusCode,
    message: String,
}

impl ErrorResponse {
    /// Create an error response.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidErrorStatus`] for 1xx and 2xx status codes.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Result<Self, InvalidErrorStatus> {
        if status.is_informational() || status.is_success() {
            return Err(InvalidErrorStatus(status));
        }
        Ok(Self {
            status,
            message: message.into(),
        })
    }

    /// The HTTP status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}
