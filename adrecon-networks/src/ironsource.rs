//! ironSource mediation stats adapter.
//!
//! Basic auth (`username:secret_key`). App keys are platform-scoped, so the
//! window is fetched once per platform that has keys configured and the
//! platform is known from the request side.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::IronsourceConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://platform.ironsrc.com";
const REPORT_ENDPOINT: &str = "/partners/publisher/mediation/applications/v5/stats";

/// Offerwall is deliberately absent: it has no mediation counterpart.
const SUPPORTED_AD_UNITS: &str = "rewardedVideo,interstitial,banner";

fn ad_type_for_unit(unit: &str) -> Option<AdType> {
    match unit {
        "Rewarded Video" | "rewardedVideo" | "REWARDED_VIDEO" => Some(AdType::Rewarded),
        "Interstitial" | "interstitial" | "INTERSTITIAL" => Some(AdType::Interstitial),
        "Banner" | "banner" | "BANNER" => Some(AdType::Banner),
        _ => None,
    }
}

/// Fetcher for ironSource mediation data.
pub struct IronsourceFetcher {
    config: IronsourceConfig,
    client: HttpClient,
    base_url: String,
}

impl IronsourceFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: IronsourceConfig) -> Self {
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

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.config.username, self.config.secret_key);
        format!("Basic {}", BASE64.encode(credentials))
    }

    async fn fetch_platform(
        &self,
        builder: &mut BreakdownBuilder,
        start: NaiveDate,
        end: NaiveDate,
        app_keys: &str,
        platform: Platform,
    ) -> Result<(), AdreconError> {
        let url = format!("{}{}", self.base_url, REPORT_ENDPOINT);
        let params = [
            ("startDate", start.to_string()),
            ("endDate", end.to_string()),
            ("appKey", app_keys.to_string()),
            ("adUnits", SUPPORTED_AD_UNITS.to_string()),
            ("metrics", "revenue,impressions,eCPM,clicks".to_string()),
            ("breakdown", "adUnits,date".to_string()),
        ];

        let data: Value = self
            .client
            .send_json(
                self.client
                    .get(&url)
                    .header("Authorization", self.auth_header())
                    .header("Accept", "application/json")
                    .query(&params),
            )
            .await
            .map_err(|e| e.into_fetch_error(Network::Ironsource))?;

        let Some(items) = data.as_array() else {
            // A root object is how the API spells an error.
            return Err(AdreconError::response_shape(
                Network::Ironsource,
                format!("expected an array, got: {data}"),
            ));
        };

        for item in items {
            let Some(ad_type) = item
                .get("adUnits")
                .and_then(Value::as_str)
                .and_then(ad_type_for_unit)
            else {
                continue;
            };
            let date = item
                .get("date")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<NaiveDate>().ok());

            let metrics = item
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for entry in metrics {
                let revenue = coerce_f64(entry.get("revenue"));
                let impressions = coerce_i64(entry.get("impressions"));
                match date {
                    Some(date) => {
                        builder.record_daily(date, platform, ad_type, revenue, impressions);
                    }
                    None => builder.record(platform, ad_type, revenue, impressions),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkFetcher for IronsourceFetcher {
    fn network(&self) -> Network {
        Network::Ironsource
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let mut builder = BreakdownBuilder::new(Network::Ironsource);

        let scopes = [
            (self.config.android_app_keys.as_deref(), Platform::Android),
            (self.config.ios_app_keys.as_deref(), Platform::Ios),
        ];
        for (keys, platform) in scopes {
            match keys {
                Some(keys) if !keys.trim().is_empty() => {
                    self.fetch_platform(&mut builder, start, end, keys, platform)
                        .await?;
                }
                _ => debug!(%platform, "no ironsource app keys for platform"),
            }
        }

        Ok(builder.finish(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offerwall_is_skipped() {
        assert_eq!(ad_type_for_unit("Rewarded Video"), Some(AdType::Rewarded));
        assert_eq!(ad_type_for_unit("banner"), Some(AdType::Banner));
        assert_eq!(ad_type_for_unit("Offerwall"), None);
    }
}
