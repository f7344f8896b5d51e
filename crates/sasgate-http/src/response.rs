//! Response builders for the gateway.
//!
//! Errors are rendered as
//!
//! ```json
//! {"error":{"status":401,"message":"SharedAccess Parameter Missing"}}
//! ```

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use sasgate_auth::ErrorResponse;

use crate::body::GatewayBody;

const APPLICATION_JSON: &str = "application/json";

/// Build a JSON response with the given status.
#[must_use]
pub fn json_response(status: StatusCode, value: &serde_json::Value) -> http::Response<GatewayBody> {
    let mut response = http::Response::new(GatewayBody::from_json(value));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

/// Render an [`ErrorResponse`] as a JSON error document.
#[must_use]
pub fn error_to_response(err: &ErrorResponse) -> http::Response<GatewayBody> {
    json_response(
        err.status(),
        &serde_json::json!({
            "error": {
                "status": err.status().as_u16(),
                "message": err.message(),
            }
        }),
    )
}

/// `202 Accepted` acknowledgement for a dispatched notification.
#[must_use]
pub fn accepted_response(request_id: &str) -> http::Response<GatewayBody> {
    json_response(
        StatusCode::ACCEPTED,
        &serde_json::json!({ "status": "accepted", "requestId": request_id }),
    )
}

/// Health probe response.
#[must_use]
pub fn health_check_response() -> http::Response<GatewayBody> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "status": "running", "service": "sasgate" }),
    )
}
