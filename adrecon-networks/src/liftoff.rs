//! Liftoff Monetize (Vungle) performance report adapter.
//!
//! Static bearer auth. The report dimensions include `incentivized`, which
//! is the only way to split the generic `video` ad type into rewarded vs
//! interstitial.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::LiftoffConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://report.api.vungle.com";
const REPORT_ENDPOINT: &str = "/ext/pub/reports/performance";

/// Fetcher for Liftoff Monetize data.
pub struct LiftoffFetcher {
    config: LiftoffConfig,
    client: HttpClient,
    base_url: String,
}

impl LiftoffFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: LiftoffConfig) -> Self {
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
}

fn incentivized_flag(value: Option<&Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => Some(s.eq_ignore_ascii_case("true")),
        _ => None,
    }
}

#[async_trait]
impl NetworkFetcher for LiftoffFetcher {
    fn network(&self) -> Network {
        Network::Liftoff
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let url = format!("{}{}", self.base_url, REPORT_ENDPOINT);
        let mut params = vec![
            ("start".to_string(), start.to_string()),
            ("end".to_string(), end.to_string()),
            (
                "dimensions".to_string(),
                "date,platform,adType,incentivized".to_string(),
            ),
            (
                "aggregates".to_string(),
                "impressions,revenue,clicks,ecpm".to_string(),
            ),
        ];
        if let Some(application_ids) = &self.config.application_ids {
            params.push(("applicationId".to_string(), application_ids.clone()));
        }

        let data: Value = self
            .client
            .send_json(
                self.client
                    .get(&url)
                    .header("Authorization", format!("Bearer {}", self.config.api_key))
                    .header("Vungle-Version", "1")
                    .header("Accept", "application/json")
                    .query(&params),
            )
            .await
            .map_err(|e| e.into_fetch_error(Network::Liftoff))?;

        let Some(rows) = data.as_array() else {
            return Err(AdreconError::response_shape(
                Network::Liftoff,
                format!("expected an array, got: {data}"),
            ));
        };

        let mut builder = BreakdownBuilder::new(Network::Liftoff);
        for row in rows {
            let revenue = coerce_f64(row.get("revenue"));
            let impressions = coerce_i64(row.get("impressions"));
            let platform = row
                .get("platform")
                .and_then(Value::as_str)
                .map(Platform::from_label)
                .unwrap_or(Platform::Android);
            let ad_type = row
                .get("adType")
                .and_then(Value::as_str)
                .map(|raw| AdType::from_label(raw, incentivized_flag(row.get("incentivized"))))
                .unwrap_or(AdType::Interstitial);

            let date = row
                .get("date")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<NaiveDate>().ok());
            match date {
                Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                None => builder.record(platform, ad_type, revenue, impressions),
            }
        }

        Ok(builder.finish(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn incentivized_spellings() {
        assert_eq!(incentivized_flag(Some(&json!(true))), Some(true));
        assert_eq!(incentivized_flag(Some(&json!("true"))), Some(true));
        assert_eq!(incentivized_flag(Some(&json!("FALSE"))), Some(false));
        assert_eq!(incentivized_flag(Some(&json!(null))), None);
        assert_eq!(incentivized_flag(None), None);
    }

    #[test]
    fn video_split_follows_flag() {
        assert_eq!(AdType::from_label("video", Some(true)), AdType::Rewarded);
        assert_eq!(AdType::from_label("video", Some(false)), AdType::Interstitial);
        assert_eq!(AdType::from_label("banner", None), AdType::Banner);
    }
}
