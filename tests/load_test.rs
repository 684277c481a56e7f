//! Concurrent load against the rate limiter.

use std::time::{Duration, Instant};

use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn test_concurrent_clients_share_one_window() {
    let mut config = common::test_config();
    config.rate_limit.max_requests = 50;
    config.rate_limit.window_secs = 60;
    let server = common::spawn_server(config).await;

    let concurrency = 8;
    let requests_per_task = 10;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let url = server.url("/api/questions");
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let mut statuses = Vec::new();
            for _ in 0..requests_per_task {
                let res = client.get(&url).send().await.unwrap();
                statuses.push(res.status());
            }
            statuses
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        for status in task.await.unwrap() {
            match status {
                StatusCode::OK => ok += 1,
                StatusCode::TOO_MANY_REQUESTS => limited += 1,
                other => panic!("unexpected status {}", other),
            }
        }
    }

    let elapsed = start.elapsed();
    println!(
        "{} requests in {:?} ({:.0} req/s)",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64()
    );

    assert_eq!(ok, 50);
    assert_eq!(limited, total_requests - 50);
    assert!(elapsed < Duration::from_secs(30));

    server.shutdown().await;
}
