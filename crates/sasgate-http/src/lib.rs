//! HTTP layer of the sasgate webhook gateway.
//!
//! - **Service** ([`service`]): [`WebhookService`](service::WebhookService), the hyper
//!   `Service` that runs health checks, SAS authorization and dispatch.
//! - **Dispatch** ([`dispatch`]): the [`NotificationHandler`](dispatch::NotificationHandler)
//!   boundary to the business logic and the default logging handler.
//! - **Response** ([`response`]): JSON status and error documents.
//! - **Body** ([`body`]): the [`GatewayBody`](body::GatewayBody) response body.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> WebhookService (hyper Service)
//!     -> Health check interception
//!     -> WebhookAuthorizer (endpoint lookup + SAS validation chain)
//!     -> Body collection
//!     -> dispatch_notification (NotificationHandler trait)
//!     -> Common response headers (x-request-id, Server)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use sasgate_auth::{SasConfig, WebhookAuthorizer, WebhookEndpoint};
//! use sasgate_http::dispatch::LoggingNotificationHandler;
//! use sasgate_http::service::WebhookService;
//!
//! let config = SasConfig::builder().secret_key("secret".into()).build();
//! let authorizer = WebhookAuthorizer::from_config(
//!     &config,
//!     vec![WebhookEndpoint::itsm_incidents(), WebhookEndpoint::flow_messages()],
//! )
//! .unwrap();
//! let service = WebhookService::new(LoggingNotificationHandler, authorizer);
//! // Use `service` with hyper server.
//! ```

pub mod body;
pub mod dispatch;
pub mod response;
pub mod service;

pub use body::GatewayBody;
pub use dispatch::{LoggingNotificationHandler, Notification, NotificationHandler};
pub use service::WebhookService;
