use std::sync::Arc;

use adrecon_core::{NetworkFetcher, TokenCache};
use adrecon_networks::DtExchangeFetcher;
use adrecon_types::config::DtExchangeConfig;
use adrecon_types::{AdreconError, Network};
use httpmock::prelude::*;

fn config() -> DtExchangeConfig {
    DtExchangeConfig {
        enabled: true,
        client_id: "cid".into(),
        client_secret: "cs".into(),
        source: "mediation".into(),
        app_ids: None,
    }
}

#[tokio::test]
async fn report_flow_authenticates_requests_and_polls_csv() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let tokens = Arc::new(TokenCache::new(dir.path()));
    let ready_url = server.url("/reports/ready.csv");

    let auth = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .json_body_includes(r#"{"grant_type": "client_credentials", "client_id": "cid"}"#);
            then.status(200).json_body(serde_json::json!({"accessToken": "dt-tok"}));
        })
        .await;
    let report = server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/api/v1/report")
                .header("Authorization", "Bearer dt-tok");
            then.status(200).json_body(serde_json::json!({"url": ready_url}));
        })
        .await;
    let csv = server
        .mock_async(|when, then| {
            when.method(GET).path("/reports/ready.csv");
            then.status(200).body(
                "Date,Device OS,Placement Type,Impressions,Clicks,Revenue (USD)\n\
                 2026-01-08,iOS,Rewarded,9800,12,48.50\n\
                 2026-01-08,Android,Banner,13000,4,3.25\n",
            );
        })
        .await;

    let fetcher =
        DtExchangeFetcher::new(config(), Arc::clone(&tokens)).with_base_url(server.base_url());
    let date = "2026-01-08".parse().unwrap();
    let out = fetcher.fetch(date, date).await.unwrap();

    assert_eq!(auth.hits_async().await, 1);
    assert_eq!(report.hits_async().await, 1);
    assert_eq!(csv.hits_async().await, 1);

    assert_eq!(out.revenue, 51.75);
    assert_eq!(out.impressions, 22_800);
    assert_eq!(out.platforms.ios.ad_totals.rewarded.revenue, 48.5);
    assert_eq!(out.latest_active_date(), Some(date));

    // Token was persisted for the next run.
    let record = tokens.get(Network::DtExchange).await.unwrap().unwrap();
    assert_eq!(record.token, "dt-tok");
}

#[tokio::test]
async fn bad_credentials_surface_as_auth_error() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let tokens = Arc::new(TokenCache::new(dir.path()));

    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/token");
            then.status(401).body("bad credentials");
        })
        .await;

    let fetcher = DtExchangeFetcher::new(config(), tokens).with_base_url(server.base_url());
    let date = "2026-01-08".parse().unwrap();
    let err = fetcher.fetch(date, date).await.unwrap_err();
    assert!(matches!(
        err,
        AdreconError::Auth {
            network: Network::DtExchange,
            ..
        }
    ));
}
