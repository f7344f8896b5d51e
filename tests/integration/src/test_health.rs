//! Health probe integration tests.

#[cfg(test)]
mod tests {
    use crate::{endpoint_url, http_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_running() {
        let client = http_client();
        for path in ["/health", "/_health"] {
            let resp = client
                .get(format!("{}{path}", endpoint_url()))
                .send()
                .await
                .expect("health request");
            assert_eq!(resp.status(), reqwest::StatusCode::OK);
            assert!(resp.headers().contains_key("x-request-id"));

            let json: serde_json::Value = resp.json().await.expect("json body");
            assert_eq!(json["status"], "running");
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_not_found_for_unknown_path() {
        let resp = http_client()
            .post(format!("{}/api/unknown", endpoint_url()))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
