use adrecon_networks::MintegralFetcher;
use adrecon_core::NetworkFetcher;
use adrecon_types::config::MintegralConfig;
use httpmock::prelude::*;

fn config() -> MintegralConfig {
    MintegralConfig {
        enabled: true,
        skey: "sk".into(),
        secret: "secret".into(),
        app_ids: Some("123".into()),
    }
}

#[tokio::test]
async fn per_format_requests_accumulate() {
    let server = MockServer::start_async().await;

    let rewarded = server
        .mock_async(|when, then| {
            when.method(GET)
                .query_param("ad_format", "rewarded_video")
                .query_param("group_by", "platform")
                .query_param("app_id", "123")
                .query_param("start", "20260108")
                .query_param("end", "20260108");
            then.status(200).json_body(serde_json::json!({
                "code": "ok",
                "data": {"lists": [
                    {"date": "20260108", "platform": "ios", "est_revenue": "48.50", "impression": "9800"}
                ]}
            }));
        })
        .await;
    let interstitial = server
        .mock_async(|when, then| {
            when.method(GET).query_param("ad_format", "interstitial_video");
            then.status(200).json_body(serde_json::json!({
                "code": "ok",
                "data": {"lists": [
                    {"date": "20260108", "platform": "android", "est_revenue": 12.0, "impression": 4000}
                ]}
            }));
        })
        .await;
    let banner = server
        .mock_async(|when, then| {
            when.method(GET).query_param("ad_format", "sdk_banner");
            then.status(200).json_body(serde_json::json!({"code": "no data"}));
        })
        .await;

    let fetcher = MintegralFetcher::new(config()).with_base_url(server.url("/"));
    let date = "2026-01-08".parse().unwrap();
    let out = fetcher.fetch(date, date).await.unwrap();

    assert_eq!(rewarded.hits_async().await, 1);
    assert_eq!(interstitial.hits_async().await, 1);
    assert_eq!(banner.hits_async().await, 1);

    assert_eq!(out.revenue, 60.5);
    assert_eq!(out.impressions, 13_800);
    assert_eq!(out.platforms.ios.ad_totals.rewarded.revenue, 48.5);
    assert_eq!(out.platforms.ios.ad_totals.rewarded.ecpm, 4.95);
    assert_eq!(out.platforms.android.ad_totals.interstitial.impressions, 4000);
    assert_eq!(out.ad_totals.banner.revenue, 0.0);
    assert_eq!(out.latest_active_date(), Some(date));
}

#[tokio::test]
async fn signature_is_present_and_hex() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).query_param_exists("sign").query_param_exists("time");
            then.status(200).json_body(serde_json::json!({"code": "ok", "data": {"lists": []}}));
        })
        .await;

    let fetcher = MintegralFetcher::new(config()).with_base_url(server.url("/"));
    let date = "2026-01-08".parse().unwrap();
    fetcher.fetch(date, date).await.unwrap();

    // One signed request per ad format.
    assert_eq!(mock.hits_async().await, 3);
}
