//! Shared Access Signature (SAS) authorization for notification callbacks.
//!
//! A producer signs a callback URL with a shared secret and hands it to a
//! notification source. When the source calls back, this crate reads the SAS
//! query parameters from the request, recomputes the signature and checks the
//! validity window, the signing version and the granted permissions.
//!
//! # Usage
//!
//! ```rust
//! use sasgate_auth::policy::SharedAccessPolicy;
//! use sasgate_auth::query::{credentials_from_uri, generate_sas_uri};
//! use sasgate_auth::validator::{ExpectedSignature, SasValidator};
//!
//! let channel_id = "http://test.com/hook";
//! let uri: http::Uri = generate_sas_uri(channel_id, "secret").parse().unwrap();
//!
//! let credentials = credentials_from_uri(&uri);
//! let expected = credentials.policy().signature(channel_id, "secret");
//! let validator = SasValidator::new(vec!["1.0".to_owned()], chrono::Duration::minutes(5));
//! assert!(validator
//!     .validate(&credentials, ExpectedSignature::Single(&expected), "/hook", "write")
//!     .is_ok());
//! ```
//!
//! # Modules
//!
//! - [`authorizer`] - Endpoint registry, callback signing and request authorization
//! - [`config`] - Gateway configuration loaded from the environment
//! - [`credentials`] - A policy paired with its signature
//! - [`error`] - Authorization errors and the HTTP error response
//! - [`permissions`] - Scope/action permission lists
//! - [`policy`] - Signed policy and signature computation
//! - [`query`] - Query-string encoding and decoding of credentials
//! - [`validator`] - The validation chain

pub mod authorizer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod permissions;
pub mod policy;
pub mod query;
pub mod validator;

pub use authorizer::{AuthorizedRequest, WebhookAuthorizer, WebhookEndpoint};
pub use config::SasConfig;
pub use credentials::SharedAccessCredentials;
pub use error::{AuthError, ConfigError, ErrorResponse};
pub use permissions::SharedAccessPermissions;
pub use policy::SharedAccessPolicy;
pub use query::{generate_sas_uri, uri_with_sas_credentials};
pub use validator::{ExpectedSignature, SasValidator};
