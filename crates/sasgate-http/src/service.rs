//! The gateway's hyper `Service`.
//!
//! [`WebhookService`] processes every request in the same order:
//!
//! 1. Health check interception (`GET /health`, `GET /_health`)
//! 2. SAS authorization of the target endpoint via [`WebhookAuthorizer`]
//! 3. Request body collection
//! 4. Dispatch to the [`NotificationHandler`]
//! 5. Common response headers (`x-request-id`, `Server`)

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use http::header::HeaderValue;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use sasgate_auth::{ErrorResponse, WebhookAuthorizer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::GatewayBody;
use crate::dispatch::{Notification, NotificationHandler, dispatch_notification};
use crate::response::{error_to_response, health_check_response, json_response};

/// Header carrying the gateway-assigned request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Largest notification body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// hyper service that authorizes notification webhooks and dispatches them.
///
/// # Type Parameters
///
/// - `H`: The business logic handler implementing [`NotificationHandler`].
#[derive(Debug)]
pub struct WebhookService<H: NotificationHandler> {
    handler: Arc<H>,
    authorizer: Arc<WebhookAuthorizer>,
}

impl<H: NotificationHandler> WebhookService<H> {
    /// Create a service with the given handler and authorizer.
    #[must_use]
    pub fn new(handler: H, authorizer: WebhookAuthorizer) -> Self {
        Self {
            handler: Arc::new(handler),
            authorizer: Arc::new(authorizer),
        }
    }

    /// Create a service from an already shared handler.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, authorizer: Arc<WebhookAuthorizer>) -> Self {
        Self {
            handler,
            authorizer,
        }
    }
}

impl<H: NotificationHandler> Clone for WebhookService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<H: NotificationHandler> Service<http::Request<Incoming>> for WebhookService<H> {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let authorizer = Arc::clone(&self.authorizer);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response =
                process_request(req, handler.as_ref(), &authorizer, &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Run a request through the gateway pipeline.
async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &H,
    authorizer: &WebhookAuthorizer,
    request_id: &str,
) -> http::Response<GatewayBody>
where
    H: NotificationHandler,
    B: http_body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing request");

    if is_health_check(&method, uri.path()) {
        return health_check_response();
    }

    let (parts, incoming) = req.into_parts();
    let authorized = match authorizer.authorize(&parts) {
        Ok(authorized) => authorized,
        Err(err) => return error_to_response(&ErrorResponse::from(err)),
    };

    info!(
        endpoint = %authorized.endpoint,
        channel_id = %authorized.channel_id,
        request_id,
        "authorized notification"
    );

    let body = match Limited::new(incoming, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.is::<LengthLimitError>() => {
            warn!(limit = MAX_BODY_BYTES, request_id, "notification body too large");
            return status_error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
        Err(err) => {
            error!(error = %err, request_id, "failed to collect request body");
            return status_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read request body",
            );
        }
    };

    let notification = Notification {
        request_id: request_id.to_owned(),
        authorized,
        parts,
        body,
    };
    match dispatch_notification(handler, notification).await {
        Ok(response) => response,
        Err(err) => {
            debug!(error = %err, request_id, "notification handler returned error");
            error_to_response(&err)
        }
    }
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/health" || path == "/_health")
}

fn status_error_response(status: StatusCode, message: &str) -> http::Response<GatewayBody> {
    json_response(
        status,
        &serde_json::json!({
            "error": {
                "status": status.as_u16(),
                "message": message,
            }
        }),
    )
}

/// Add common response headers to every gateway response.
fn add_common_headers(
    mut response: http::Response<GatewayBody>,
    request_id: &str,
) -> http::Response<GatewayBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, hv);
    }
    headers.insert(http::header::SERVER, HeaderValue::from_static("sasgate"));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use chrono::{Duration, Utc};
    use http_body_util::Full;
    use sasgate_auth::permissions::SharedAccessPermissions;
    use sasgate_auth::{SasConfig, SharedAccessPolicy, WebhookEndpoint};

    use super::*;
    use crate::dispatch::{HandlerFuture, LoggingNotificationHandler};
    use crate::response::accepted_response;

    fn authorizer() -> WebhookAuthorizer {
        let config = SasConfig::builder()
            .public_base_url("http://localhost:4580".into())
            .secret_key("gateway-secret".into())
            .build();
        WebhookAuthorizer::from_config(
            &config,
            vec![
                WebhookEndpoint::itsm_incidents(),
                WebhookEndpoint::flow_messages(),
            ],
        )
        .expect("valid config")
    }

    fn signed_flow_url(authorizer: &WebhookAuthorizer) -> String {
        let now = Utc::now();
        let policy = SharedAccessPolicy {
            start_time: Some(now - Duration::minutes(1)),
            expire_time: Some(now + Duration::hours(1)),
            permissions: SharedAccessPermissions::from_scope_and_action("/api/flow", "write"),
            ..SharedAccessPolicy::default()
        };
        authorizer.sign_callback(
            &WebhookEndpoint::flow_messages(),
            &[("channelId", "c1"), ("flowName", "deploy")],
            policy,
        )
    }

    fn request(method: http::Method, uri: &str, body: &'static str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .expect("valid request")
    }

    async fn body_json(response: http::Response<GatewayBody>) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("buffered body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(String, Bytes)>>,
    }

    impl NotificationHandler for RecordingHandler {
        fn handle_notification(&self, notification: Notification) -> HandlerFuture {
            let Notification {
                request_id,
                authorized,
                body,
                ..
            } = notification;
            self.seen
                .lock()
                .expect("lock")
                .push((authorized.channel_id, body));
            Box::pin(async move { Ok(accepted_response(&request_id)) })
        }
    }

    #[test]
    fn test_should_detect_health_check_paths() {
        assert!(is_health_check(&http::Method::GET, "/health"));
        assert!(is_health_check(&http::Method::GET, "/_health"));
        assert!(!is_health_check(&http::Method::POST, "/health"));
        assert!(!is_health_check(&http::Method::GET, "/api/flow/messages"));
    }

    #[tokio::test]
    async fn test_should_answer_health_check_without_credentials() {
        let response = process_request(
            request(http::Method::GET, "/health", ""),
            &LoggingNotificationHandler,
            &authorizer(),
            "req-1",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "running");
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_unknown_path() {
        let response = process_request(
            request(http::Method::POST, "/api/unknown", ""),
            &LoggingNotificationHandler,
            &authorizer(),
            "req-1",
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_reject_unsigned_notification() {
        let response = process_request(
            request(http::Method::POST, "/api/flow/messages?channelId=c1", "{}"),
            &LoggingNotificationHandler,
            &authorizer(),
            "req-1",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["status"], 401);
        assert_eq!(json["error"]["message"], "SharedAccess Parameter Missing");
    }

    #[tokio::test]
    async fn test_should_reject_tampered_channel() {
        let authorizer = authorizer();
        let url = signed_flow_url(&authorizer).replace("channelId=c1", "channelId=c2");
        let response = process_request(
            request(http::Method::POST, &url, "{}"),
            &LoggingNotificationHandler,
            &authorizer,
            "req-1",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Authentication Credentials Invalid"
        );
    }

    #[tokio::test]
    async fn test_should_dispatch_authorized_notification() {
        let authorizer = authorizer();
        let url = signed_flow_url(&authorizer);
        let handler = RecordingHandler::default();

        let response = process_request(
            request(http::Method::POST, &url, "{\"text\":\"deployed\"}"),
            &handler,
            &authorizer,
            "req-7",
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let seen = handler.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].0,
            "http://localhost:4580/api/flow/messages?channelId=c1&flowName=deploy"
        );
        assert_eq!(seen[0].1, Bytes::from_static(b"{\"text\":\"deployed\"}"));
    }

    #[tokio::test]
    async fn test_should_reject_oversized_notification_body() {
        let authorizer = authorizer();
        let url = signed_flow_url(&authorizer);
        let handler = RecordingHandler::default();
        let oversized = http::Request::builder()
            .method(http::Method::POST)
            .uri(url.as_str())
            .body(Full::new(Bytes::from(vec![b'x'; MAX_BODY_BYTES + 1])))
            .expect("valid request");

        let response = process_request(oversized, &handler, &authorizer, "req-8").await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["error"]["status"], 413);
        assert!(handler.seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_should_add_common_headers() {
        let response = add_common_headers(http::Response::new(GatewayBody::empty()), "req-9");
        assert_eq!(
            response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("req-9"),
        );
        assert_eq!(
            response
                .headers()
                .get(http::header::SERVER)
                .and_then(|v| v.to_str().ok()),
            Some("sasgate"),
        );
    }

    #[test]
    fn test_should_clone_service_sharing_state() {
        let service = WebhookService::new(LoggingNotificationHandler, authorizer());
        let cloned = service.clone();
        assert!(Arc::ptr_eq(&service.authorizer, &cloned.authorizer));
        assert!(Arc::ptr_eq(&service.handler, &cloned.handler));
    }
}
