use adrecon_max::MaxFetcher;
use adrecon_types::config::{ApplicationConfig, MediatorConfig};
use adrecon_types::{AdType, AdreconError, Network, Platform};
use httpmock::prelude::*;

fn config() -> MediatorConfig {
    MediatorConfig {
        api_key: "max-key".into(),
        package_name: None,
        applications: vec![
            ApplicationConfig {
                name: "MyApp (Android)".into(),
                platform: Platform::Android,
                package_name: Some("com.example.app".into()),
            },
            ApplicationConfig {
                name: "MyApp (iOS)".into(),
                platform: Platform::Ios,
                package_name: Some("com.example.app.ios".into()),
            },
        ],
    }
}

fn max_rows() -> serde_json::Value {
    serde_json::json!({
        "results": [
            {"day": "2026-01-08", "package_name": "com.example.app.ios", "network": "UNITY_BIDDING",
             "ad_format": "REWARDED", "estimated_revenue": "50.00", "impressions": 10000, "platform": "ios"},
            {"day": "2026-01-08", "package_name": "com.example.app.ios", "network": "UNITY_BIDDING",
             "ad_format": "REWARDED", "estimated_revenue": 0.0, "impressions": 0, "platform": "ios"},
            {"day": "2026-01-08", "package_name": "com.example.app", "network": "Pangle Bidding",
             "ad_format": "INTER", "estimated_revenue": 12.5, "impressions": 5000, "platform": "android"},
            {"day": "2026-01-08", "package_name": "com.example.app", "network": "Mystery Ads",
             "ad_format": "BANNER", "estimated_revenue": 1.0, "impressions": 400, "platform": "android"}
        ]
    })
}

#[tokio::test]
async fn first_non_empty_variant_wins_and_rows_are_keyed() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .query_param(
                    "columns",
                    "day,package_name,network,ad_format,estimated_revenue,impressions,platform",
                )
                .query_param("format", "json")
                .query_param("api_key", "max-key");
            then.status(200).json_body(max_rows());
        })
        .await;

    let fetcher = MaxFetcher::new(config()).with_base_url(server.base_url());
    let start = "2026-01-08".parse().unwrap();
    let breakdown = fetcher.fetch_report(start, start).await.unwrap();

    assert_eq!(mock.hits_async().await, 1);
    assert!(breakdown.columns_used.contains("network"));

    // The unresolvable "Mystery Ads" row is counted, not guessed.
    assert_eq!(breakdown.unresolved_networks, 1);

    // Duplicate (app, platform, network, ad type, day) keys merge.
    assert_eq!(breakdown.comparison_rows.len(), 2);
    let unity = breakdown
        .comparison_rows
        .iter()
        .find(|r| r.network == Network::Unity)
        .unwrap();
    assert_eq!(unity.application, "MyApp (iOS)");
    assert_eq!(unity.platform, Platform::Ios);
    assert_eq!(unity.ad_type, AdType::Rewarded);
    assert_eq!(unity.revenue, 50.0);
    assert_eq!(unity.impressions, 10_000);
    assert_eq!(unity.ecpm, 5.0);

    // Totals include the dropped-network row: totals follow the report,
    // comparison rows follow resolvability.
    assert_eq!(breakdown.totals.revenue, 63.5);
    assert_eq!(breakdown.totals.impressions, 15_400);
    assert_eq!(
        breakdown.totals.platforms.ios.ad_totals.rewarded.revenue,
        50.0
    );
}

#[tokio::test]
async fn schema_rejection_falls_through_variants() {
    let server = MockServer::start_async().await;
    // The network-carrying variants are rejected by this account.
    let rejected = server
        .mock_async(|when, then| {
            when.method(GET).query_param(
                "columns",
                "day,package_name,network,ad_format,estimated_revenue,impressions,platform",
            );
            then.status(400).body("unknown column: network");
        })
        .await;
    let rejected_os = server
        .mock_async(|when, then| {
            when.method(GET).query_param(
                "columns",
                "day,package_name,network,ad_format,estimated_revenue,impressions,os",
            );
            then.status(400).body("unknown column: network");
        })
        .await;
    let accepted = server
        .mock_async(|when, then| {
            when.method(GET).query_param(
                "columns",
                "day,package_name,ad_format,estimated_revenue,impressions,platform",
            );
            then.status(200).json_body(serde_json::json!({
                "results": [
                    {"day": "2026-01-08", "package_name": "com.example.app",
                     "ad_format": "BANNER", "estimated_revenue": 2.0, "impressions": 900,
                     "platform": "android"}
                ]
            }));
        })
        .await;

    let fetcher = MaxFetcher::new(config()).with_base_url(server.base_url());
    let start = "2026-01-08".parse().unwrap();
    let breakdown = fetcher.fetch_report(start, start).await.unwrap();

    assert_eq!(rejected.hits_async().await, 1);
    assert_eq!(rejected_os.hits_async().await, 1);
    assert_eq!(accepted.hits_async().await, 1);

    assert!(breakdown.comparison_rows.is_empty());
    assert_eq!(breakdown.totals.revenue, 2.0);
}

#[tokio::test]
async fn exhausted_variants_are_a_mediator_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(403).body("invalid api key");
        })
        .await;

    let fetcher = MaxFetcher::new(config()).with_base_url(server.base_url());
    let start = "2026-01-08".parse().unwrap();
    let err = fetcher.fetch_report(start, start).await.unwrap_err();
    assert!(matches!(err, AdreconError::Mediator(_)), "{err:?}");
    assert!(err.is_fatal());
}
