//! Signed notification integration tests.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sasgate_auth::WebhookEndpoint;

    use crate::{http_client, signer, unique_channel};

    fn signed_flow_url(channel: &str) -> String {
        let endpoint = WebhookEndpoint::flow_messages();
        let policy = endpoint
            .policy_at(Utc::now() - Duration::seconds(5), Duration::minutes(10))
            .expect("ten-minute window");
        let url = signer().sign_callback(
            &endpoint,
            &[("channelId", channel), ("flowName", "integration")],
            policy,
        );
        tracing::debug!(%url, "signed flow callback");
        url
    }

    async fn error_message(resp: reqwest::Response) -> String {
        let json: serde_json::Value = resp.json().await.expect("json body");
        json["error"]["message"].as_str().unwrap_or_default().to_owned()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_accept_signed_flow_message() {
        let url = signed_flow_url(&unique_channel("flow"));
        let resp = http_client()
            .post(url)
            .json(&serde_json::json!({ "text": "deployed" }))
            .send()
            .await
            .expect("notification request");
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_accept_signed_incident() {
        let endpoint = WebhookEndpoint::itsm_incidents();
        let policy = endpoint
            .policy_at(Utc::now(), Duration::minutes(10))
            .expect("ten-minute window");
        let filter = unique_channel("p1");
        let url = signer().sign_callback(&endpoint, &[("filterName", filter.as_str())], policy);
        tracing::debug!(%url, "signed incident callback");

        let resp = http_client()
            .post(url)
            .body("{}")
            .send()
            .await
            .expect("notification request");
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unsigned_notification() {
        let resp = http_client()
            .post(format!("{}/api/flow/messages?channelId=c1", crate::endpoint_url()))
            .send()
            .await
            .expect("notification request");
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(resp).await, "SharedAccess Parameter Missing");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_notification_for_other_channel() {
        let url = signed_flow_url("mine").replace("channelId=mine", "channelId=yours");
        let resp = http_client()
            .post(url)
            .send()
            .await
            .expect("notification request");
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(
            error_message(resp).await,
            "Authentication Credentials Invalid"
        );
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_expired_notification() {
        let endpoint = WebhookEndpoint::flow_messages();
        let policy = endpoint
            .policy_at(Utc::now() - Duration::hours(2), Duration::hours(1))
            .expect("one-hour window");
        let url = signer().sign_callback(&endpoint, &[("channelId", "c1")], policy);

        let resp = http_client()
            .post(url)
            .send()
            .await
            .expect("notification request");
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }
}
