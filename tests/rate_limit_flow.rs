//! Fixed-window rate limiting over a live listener.

use reqwest::StatusCode;
use serde_json::Value;

mod common;

fn header(res: &reqwest::Response, name: &str) -> String {
    res.headers()[name].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_limit_then_reject() {
    let mut config = common::test_config();
    config.rate_limit.max_requests = 3;
    config.rate_limit.window_secs = 60;
    let server = common::spawn_server(config).await;
    let client = reqwest::Client::new();

    for remaining in ["2", "1", "0"] {
        let res = client.get(server.url("/api/questions")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, "ratelimit-limit"), "3");
        assert_eq!(header(&res, "ratelimit-remaining"), remaining);
    }

    let res = client.get(server.url("/api/questions")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = header(&res, "retry-after").parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 60);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "ERR_RATE_LIMIT");
}

#[tokio::test]
async fn test_paths_outside_api_are_not_limited() {
    let mut config = common::test_config();
    config.rate_limit.max_requests = 1;
    let server = common::spawn_server(config).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let res = client.get(server.url("/")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("ratelimit-limit").is_none());

        let res = client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_disabled_limiter_adds_no_headers() {
    let mut config = common::test_config();
    config.rate_limit.enabled = false;
    config.rate_limit.max_requests = 1;
    let server = common::spawn_server(config).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let res = client.get(server.url("/api/questions")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("ratelimit-remaining").is_none());
    }
}
