//! Hand-off of authorized notifications to the business logic.
//!
//! The gateway only authorizes. What happens to a notification once its SAS
//! credentials checked out is up to the [`NotificationHandler`] plugged into
//! [`WebhookService`](crate::service::WebhookService).

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use sasgate_auth::{AuthorizedRequest, ErrorResponse};
use tracing::info;

use crate::body::GatewayBody;
use crate::response::accepted_response;

/// Boxed future returned by [`NotificationHandler::handle_notification`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<GatewayBody>, ErrorResponse>> + Send>>;

/// An authorized notification.
#[derive(Debug)]
pub struct Notification {
    /// Gateway-assigned request id.
    pub request_id: String,
    /// Endpoint and channel the credentials were verified for.
    pub authorized: AuthorizedRequest,
    /// Request head.
    pub parts: http::request::Parts,
    /// Collected request body.
    pub body: Bytes,
}

/// Receives notifications that passed authorization.
pub trait NotificationHandler: Send + Sync + 'static {
    /// Handle a notification and produce the response sent back to the caller.
    fn handle_notification(&self, notification: Notification) -> HandlerFuture;
}

/// Dispatch an authorized notification to `handler`.
pub async fn dispatch_notification<H: NotificationHandler>(
    handler: &H,
    notification: Notification,
) -> Result<http::Response<GatewayBody>, ErrorResponse> {
    tracing::debug!(
        endpoint = %notification.authorized.endpoint,
        request_id = %notification.request_id,
        "dispatching notification"
    );
    handler.handle_notification(notification).await
}

/// Logs each notification and acknowledges it with `202 Accepted`.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationHandler;

impl NotificationHandler for LoggingNotificationHandler {
    fn handle_notification(&self, notification: Notification) -> HandlerFuture {
        Box::pin(async move {
            info!(
                endpoint = %notification.authorized.endpoint,
                channel_id = %notification.authorized.channel_id,
                request_id = %notification.request_id,
                bytes = notification.body.len(),
                "notification received"
            );
            Ok(accepted_response(&notification.request_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    fn notification() -> Notification {
        let (parts, ()) = http::Request::builder()
            .method(http::Method::POST)
            .uri("/api/flow/messages?channelId=c1")
            .body(())
            .expect("valid request")
            .into_parts();
        Notification {
            request_id: "req-1".to_owned(),
            authorized: AuthorizedRequest {
                endpoint: "flow-messages".to_owned(),
                channel_id: "http://localhost:4580/api/flow/messages?channelId=c1".to_owned(),
            },
            parts,
            body: Bytes::from_static(b"{\"text\":\"hi\"}"),
        }
    }

    #[tokio::test]
    async fn test_should_accept_with_logging_handler() {
        let response = dispatch_notification(&LoggingNotificationHandler, notification())
            .await
            .expect("accepted");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    struct RejectingHandler;

    impl NotificationHandler for RejectingHandler {
        fn handle_notification(&self, _notification: Notification) -> HandlerFuture {
            Box::pin(async {
                Err(ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "busy")
                    .expect("error status"))
            })
        }
    }

    #[tokio::test]
    async fn test_should_propagate_handler_error() {
        let err = dispatch_notification(&RejectingHandler, notification())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message(), "busy");
    }
}
