//! Authorization of proactive-notification callbacks.
//!
//! A notification producer receives a callback URL that already carries SAS
//! query parameters. The URL without those parameters is the channel id that
//! was signed. On the way back in, [`WebhookAuthorizer`] rebuilds that channel
//! id from the configured public base URL, the endpoint path and the endpoint's
//! channel parameters, recomputes the expected signature from the received
//! policy, and runs the [`SasValidator`] chain.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::SasConfig;
use crate::credentials::SharedAccessCredentials;
use crate::error::{AuthError, ConfigError};
use crate::permissions::{SharedAccessPermissions, WRITE_ACTION};
use crate::policy::{DEFAULT_VERSION, SharedAccessPolicy};
use crate::query::{credentials_from_request, query_value, uri_with_sas_credentials};
use crate::validator::{ExpectedSignature, SasValidator};

/// A protected callback endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEndpoint {
    /// Short name used in logs.
    pub name: String,
    /// Request path, e.g. `/api/flow/messages`. Also the scope checked against
    /// the permissions.
    pub path: String,
    /// Query parameters that identify the channel, in signing order.
    pub channel_params: Vec<String>,
    /// Action required on [`path`](Self::path).
    pub action: String,
}

impl WebhookEndpoint {
    /// Create an endpoint.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        channel_params: impl IntoIterator<Item = impl Into<String>>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            channel_params: channel_params.into_iter().map(Into::into).collect(),
            action: action.into(),
        }
    }

    /// ServiceNow incident notifications, keyed by `filterName`.
    #[must_use]
    pub fn itsm_incidents() -> Self {
        Self::new(
            "itsm-incidents",
            "/api/servicenow/incidents",
            ["filterName"],
            WRITE_ACTION,
        )
    }

    /// Generic flow messages, keyed by `channelId`, `flowName` and `serviceName`.
    #[must_use]
    pub fn flow_messages() -> Self {
        Self::new(
            "flow-messages",
            "/api/flow/messages",
            ["channelId", "flowName", "serviceName"],
            WRITE_ACTION,
        )
    }

    /// Whether `path` addresses this endpoint (ignoring case and a trailing slash).
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        path.eq_ignore_ascii_case(&self.path)
    }

    /// Build the channel id for the given channel parameter values.
    ///
    /// Parameters are emitted in [`channel_params`](Self::channel_params) order;
    /// values not listed there, or not supplied, are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use sasgate_auth::authorizer::WebhookEndpoint;
    ///
    /// let endpoint = WebhookEndpoint::itsm_incidents();
    /// assert_eq!(
    ///     endpoint.channel_id("https://bot.example.com/", &[("filterName", "p1 open")]),
    ///     "https://bot.example.com/api/servicenow/incidents?filterName=p1+open",
    /// );
    /// ```
    #[must_use]
    pub fn channel_id(&self, base_url: &str, values: &[(&str, &str)]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for name in &self.channel_params {
            if let Some((_, value)) = values.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                serializer.append_pair(name, value);
                any = true;
            }
        }

        let base = base_url.trim_end_matches('/');
        if any {
            format!("{base}{}?{}", self.path, serializer.finish())
        } else {
            format!("{base}{}", self.path)
        }
    }

    /// Permissions granting [`action`](Self::action) on [`path`](Self::path).
    ///
    /// The grant is made on the parent of the path, since a permission's scope
    /// is everything up to its last segment.
    #[must_use]
    pub fn permissions(&self) -> SharedAccessPermissions {
        let parent = self
            .path
            .trim_end_matches('/')
            .rsplit_once('/')
            .map_or("", |(parent, _)| parent);
        SharedAccessPermissions::from_scope_and_action(parent, &self.action)
    }

    /// Policy for a callback valid from `now` for `ttl`.
    ///
    /// Returns `None` when `now + ttl` is not a representable time.
    #[must_use]
    pub fn policy_at(&self, now: DateTime<Utc>, ttl: Duration) -> Option<SharedAccessPolicy> {
        let expire_time = now.checked_add_signed(ttl)?;
        Some(SharedAccessPolicy {
            start_time: Some(now),
            expire_time: Some(expire_time),
            version: DEFAULT_VERSION.to_owned(),
            permissions: self.permissions(),
        })
    }

    /// Build the channel id from the channel parameters found in `query`.
    #[must_use]
    pub fn channel_id_from_query(&self, base_url: &str, query: &str) -> String {
        let found: Vec<(&str, String)> = self
            .channel_params
            .iter()
            .filter_map(|name| query_value(query, name).map(|v| (name.as_str(), v)))
            .collect();
        let values: Vec<(&str, &str)> = found.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.channel_id(base_url, &values)
    }
}

/// A request that passed authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    /// Name of the matched endpoint.
    pub endpoint: String,
    /// The channel id the signature was verified for.
    pub channel_id: String,
}

/// Verifies SAS credentials on incoming callbacks and signs outgoing ones.
#[derive(Clone)]
pub struct WebhookAuthorizer {
    public_base_url: String,
    primary_key: String,
    secondary_key: Option<String>,
    validator: SasValidator,
    endpoints: Vec<WebhookEndpoint>,
}

impl std::fmt::Debug for WebhookAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookAuthorizer")
            .field("public_base_url", &self.public_base_url)
            .field("primary_key", &"...")
            .field("secondary_key", &self.secondary_key.as_ref().map(|_| "..."))
            .field("validator", &self.validator)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl WebhookAuthorizer {
    /// Create an authorizer for `endpoints` from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecretKey`] without a primary secret and
    /// [`ConfigError::NoAllowedVersions`] with an empty version allow-list.
    pub fn from_config(
        config: &SasConfig,
        endpoints: Vec<WebhookEndpoint>,
    ) -> Result<Self, ConfigError> {
        let primary_key = config
            .secret_key
            .clone()
            .ok_or(ConfigError::MissingSecretKey)?;
        if config.allowed_versions.is_empty() {
            return Err(ConfigError::NoAllowedVersions);
        }

        Ok(Self {
            public_base_url: config.public_base_url.clone(),
            primary_key,
            secondary_key: config.secondary_secret_key.clone(),
            validator: SasValidator::new(config.allowed_versions.clone(), config.clock_skew()),
            endpoints,
        })
    }

    /// The protected endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[WebhookEndpoint] {
        &self.endpoints
    }

    /// Find an endpoint by name, ignoring case.
    #[must_use]
    pub fn endpoint_by_name(&self, name: &str) -> Option<&WebhookEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Find the endpoint serving `path`.
    #[must_use]
    pub fn endpoint_for_path(&self, path: &str) -> Option<&WebhookEndpoint> {
        self.endpoints.iter().find(|e| e.matches_path(path))
    }

    /// Authorize an incoming callback request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEndpoint`] for unprotected paths, otherwise the
    /// first failing check of the validator chain.
    pub fn authorize(&self, parts: &http::request::Parts) -> Result<AuthorizedRequest, AuthError> {
        let path = parts.uri.path();
        let endpoint = self
            .endpoint_for_path(path)
            .ok_or_else(|| AuthError::UnknownEndpoint(path.to_owned()))?;

        let credentials = credentials_from_request(parts);
        let channel_id = endpoint
            .channel_id_from_query(&self.public_base_url, parts.uri.query().unwrap_or(""));

        debug!(endpoint = %endpoint.name, channel_id = %channel_id, "Authorizing callback");

        let policy = credentials.policy();
        let primary = policy.signature(&channel_id, &self.primary_key);
        let secondary = self
            .secondary_key
            .as_deref()
            .map(|key| policy.signature(&channel_id, key));
        let expected = match &secondary {
            Some(secondary) => ExpectedSignature::Rotating {
                primary: &primary,
                secondary,
            },
            None => ExpectedSignature::Single(&primary),
        };

        if let Err(err) =
            self.validator
                .validate(&credentials, expected, &endpoint.path, &endpoint.action)
        {
            warn!(
                endpoint = %endpoint.name,
                channel_id = %channel_id,
                error = ?err,
                "SAS authorization failed"
            );
            return Err(err);
        }

        Ok(AuthorizedRequest {
            endpoint: endpoint.name.clone(),
            channel_id,
        })
    }

    /// Sign a callback URL for `endpoint` with the primary key.
    ///
    /// The returned URL is the channel id followed by the SAS parameters.
    #[must_use]
    pub fn sign_callback(
        &self,
        endpoint: &WebhookEndpoint,
        values: &[(&str, &str)],
        policy: SharedAccessPolicy,
    ) -> String {
        let channel_id = endpoint.channel_id(&self.public_base_url, values);
        let credentials = SharedAccessCredentials::sign(policy, &channel_id, &self.primary_key);
        uri_with_sas_credentials(&channel_id, &credentials)
    }
}
