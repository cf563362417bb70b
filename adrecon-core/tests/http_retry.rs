use std::time::{Duration, Instant};

use adrecon_core::http::{HttpClient, HttpError, PollConfig, RetryPolicy};
use httpmock::prelude::*;

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts: attempts,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn success_passes_body_through() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/report");
            then.status(200).json_body(serde_json::json!({"rows": [1, 2, 3]}));
        })
        .await;

    let client = HttpClient::new().with_retry(fast_retry(3));
    let resp = client.send(client.get(&server.url("/report"))).await.unwrap();

    mock.assert_async().await;
    let parsed: serde_json::Value = resp.json().unwrap();
    assert_eq!(parsed["rows"][2], 3);
}

#[tokio::test]
async fn client_error_fails_fast_with_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/report");
            then.status(403).body("invalid key");
        })
        .await;

    let client = HttpClient::new().with_retry(fast_retry(3));
    let err = client.send(client.get(&server.url("/report"))).await.unwrap_err();

    assert_eq!(mock.hits_async().await, 1, "4xx must not be retried");
    match err {
        HttpError::Status { status, ref body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "invalid key");
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(err.is_auth());
}

#[tokio::test]
async fn server_errors_are_retried_then_surface_as_transport() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/flaky");
            then.status(502);
        })
        .await;

    let client = HttpClient::new().with_retry(fast_retry(3));
    let err = client.send(client.get(&server.url("/flaky"))).await.unwrap_err();

    assert_eq!(mock.hits_async().await, 3);
    assert!(matches!(err, HttpError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn rate_limit_honours_retry_after() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/limited");
            then.status(429).header("Retry-After", "2");
        })
        .await;

    let client = HttpClient::new().with_retry(fast_retry(2));
    let started = Instant::now();
    let err = client.send(client.get(&server.url("/limited"))).await.unwrap_err();

    assert_eq!(mock.hits_async().await, 2);
    assert!(
        started.elapsed() >= Duration::from_secs(2),
        "pause before the second attempt must be >= Retry-After"
    );
    assert!(matches!(err, HttpError::RateLimited { attempts: 2 }), "{err:?}");
}

#[tokio::test]
async fn min_interval_paces_consecutive_requests() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/paced");
            then.status(200).body("ok");
        })
        .await;

    let client = HttpClient::new()
        .with_retry(fast_retry(1))
        .with_min_interval(Duration::from_millis(200));

    let started = Instant::now();
    for _ in 0..3 {
        client.send(client.get(&server.url("/paced"))).await.unwrap();
    }
    // Three requests with a 200ms floor between them: at least 400ms total.
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn polling_gives_up_at_deadline() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pending");
            then.status(202);
        })
        .await;

    let client = HttpClient::new().with_retry(fast_retry(1));
    let config = PollConfig {
        initial_interval: Duration::from_millis(20),
        factor: 1.5,
        max_interval: Duration::from_millis(50),
        deadline: Duration::from_millis(200),
    };

    let err = client
        .poll_until_ready(&server.url("/pending"), config, |r| r)
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn polling_returns_ready_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ready");
            then.status(200).body("date,revenue\n2026-01-08,48.50\n");
        })
        .await;

    let client = HttpClient::new().with_retry(fast_retry(1));
    let body = client
        .poll_until_ready(&server.url("/ready"), PollConfig::default(), |r| r)
        .await
        .unwrap();
    assert!(String::from_utf8(body).unwrap().contains("48.50"));
}
