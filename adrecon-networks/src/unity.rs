//! Unity Ads monetization stats adapter.
//!
//! Static key auth in the query string. The stats endpoint groups by
//! (game, platform, placement); the ad format is carried in the placement
//! name (`Rewarded_IOS`, `Banner_DRD`, ...).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::UnityConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://monetization.api.unity.com/stats/v1/operate/organizations";

/// Fetcher for Unity Ads monetization data.
pub struct UnityFetcher {
    config: UnityConfig,
    client: HttpClient,
    base_url: String,
}

impl UnityFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: UnityConfig) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn ad_type_from_placement(placement: &str) -> AdType {
        let lower = placement.to_ascii_lowercase();
        if lower.contains("banner") {
            AdType::Banner
        } else if lower.contains("rewarded") {
            AdType::Rewarded
        } else {
            AdType::Interstitial
        }
    }
}

#[async_trait]
impl NetworkFetcher for UnityFetcher {
    fn network(&self) -> Network {
        Network::Unity
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let url = format!("{}/{}", self.base_url, self.config.organization_id);
        let mut params = vec![
            ("apikey".to_string(), self.config.api_key.clone()),
            ("start".to_string(), format!("{start}T00:00:00Z")),
            ("end".to_string(), format!("{end}T23:59:00Z")),
            ("scale".to_string(), "day".to_string()),
            ("groupBy".to_string(), "game,platform,placement".to_string()),
            (
                "fields".to_string(),
                "revenue_sum,start_count,view_count".to_string(),
            ),
        ];
        if let Some(game_ids) = &self.config.game_ids {
            params.push(("gameIds".to_string(), game_ids.clone()));
        }

        let data: Value = self
            .client
            .send_json(
                self.client
                    .get(&url)
                    .header("Accept", "application/json")
                    .query(&params),
            )
            .await
            .map_err(|e| e.into_fetch_error(Network::Unity))?;

        let rows = match &data {
            Value::Array(rows) => rows.clone(),
            Value::Object(_) => ["results", "data", "rows"]
                .iter()
                .find_map(|k| data.get(k).and_then(Value::as_array))
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        if rows.is_empty() {
            debug!("unity returned no rows for the window");
        }

        let mut builder = BreakdownBuilder::new(Network::Unity);
        for row in rows {
            // Aggregate rows carry a null placement; only placement-level
            // rows are comparable.
            let Some(placement) = row.get("placement").and_then(Value::as_str) else {
                continue;
            };
            let revenue = coerce_f64(row.get("revenue_sum").or_else(|| row.get("revenue")));
            let impressions = coerce_i64(
                row.get("start_count")
                    .or_else(|| row.get("view_count"))
                    .or_else(|| row.get("impressions")),
            );
            let platform = row
                .get("platform")
                .and_then(Value::as_str)
                .map(Platform::from_label)
                .unwrap_or(Platform::Android);
            let ad_type = Self::ad_type_from_placement(placement);

            let date = row
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|ts| ts.get(..10))
                .and_then(|day| day.parse::<NaiveDate>().ok());
            match date {
                Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                None => builder.record(platform, ad_type, revenue, impressions),
            }
        }

        Ok(builder.finish(start, end))
    }
}
