//! Integration tests for the sasgate server.
//!
//! These tests require a running server at `localhost:4580` started with the
//! same `SECRET_KEY` the tests sign with, and with `PUBLIC_BASE_URL` equal to the
//! endpoint URL. They are marked `#[ignore]` so they don't run during normal
//! `cargo test`.
//!
//! Run them with:
//! ```text
//! SECRET_KEY=integration-secret sasgate-server &
//! SECRET_KEY=integration-secret cargo test -p sasgate-integration -- --ignored
//! ```

use std::sync::Once;

use sasgate_auth::{SasConfig, WebhookAuthorizer, WebhookEndpoint};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("SASGATE_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4580".to_owned())
}

/// Secret shared with the server under test.
#[must_use]
pub fn secret_key() -> String {
    std::env::var("SECRET_KEY").unwrap_or_else(|_| "integration-secret".to_owned())
}

/// HTTP client for talking to the server.
#[must_use]
pub fn http_client() -> reqwest::Client {
    init_tracing();
    reqwest::Client::new()
}

/// Authorizer configured like the server under test, used to sign callbacks.
#[must_use]
pub fn signer() -> WebhookAuthorizer {
    let config = SasConfig::builder()
        .public_base_url(endpoint_url())
        .secret_key(secret_key())
        .build();
    WebhookAuthorizer::from_config(
        &config,
        vec![
            WebhookEndpoint::itsm_incidents(),
            WebhookEndpoint::flow_messages(),
        ],
    )
    .unwrap_or_else(|e| panic!("invalid signer configuration: {e}"))
}

/// A channel value unique to one test run.
#[must_use]
pub fn unique_channel(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("{prefix}-{id}")
}

mod test_health;
mod test_notifications;
