//! Mintegral reporting adapter.
//!
//! Digest-signed query auth: `sign = md5(secret + md5(timestamp))`. The
//! reporting endpoint does not echo the ad format back, so one request is
//! made per format and the format is taken from the request itself.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::NaiveDate;
use md5::{Digest, Md5};
use serde_json::Value;
use tracing::{debug, warn};

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::MintegralConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://api.mintegral.com/reporting/data";

/// The three report formats and the canonical type each maps to.
const AD_FORMATS: [(&str, AdType); 3] = [
    ("rewarded_video", AdType::Rewarded),
    ("interstitial_video", AdType::Interstitial),
    ("sdk_banner", AdType::Banner),
];

/// Fetcher for Mintegral monetization data.
pub struct MintegralFetcher {
    config: MintegralConfig,
    client: HttpClient,
    base_url: String,
}

impl MintegralFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: MintegralConfig) -> Self {
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

    fn sign(&self, timestamp: u64) -> String {
        let time_digest = hex::encode(Md5::digest(timestamp.to_string().as_bytes()));
        hex::encode(Md5::digest(format!("{}{}", self.config.secret, time_digest).as_bytes()))
    }

    async fn fetch_format(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        ad_format: &str,
    ) -> Result<Value, AdreconError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let sign = self.sign(timestamp);

        let mut params = vec![
            ("skey".to_string(), self.config.skey.clone()),
            ("sign".to_string(), sign),
            ("time".to_string(), timestamp.to_string()),
            ("start".to_string(), start.format("%Y%m%d").to_string()),
            ("end".to_string(), end.format("%Y%m%d").to_string()),
            ("group_by".to_string(), "platform".to_string()),
            ("timezone".to_string(), "0".to_string()),
            ("ad_format".to_string(), ad_format.to_string()),
        ];
        if let Some(app_id) = &self.config.app_ids {
            params.push(("app_id".to_string(), app_id.clone()));
        }

        self.client
            .send_json(self.client.get(&self.base_url).query(&params))
            .await
            .map_err(|e| e.into_fetch_error(Network::Mintegral))
    }
}

#[async_trait]
impl NetworkFetcher for MintegralFetcher {
    fn network(&self) -> Network {
        Network::Mintegral
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let mut builder = BreakdownBuilder::new(Network::Mintegral);

        for (ad_format, ad_type) in AD_FORMATS {
            let data = self.fetch_format(start, end, ad_format).await?;

            let code = data
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_ascii_lowercase();
            if code != "ok" {
                // Formats with no inventory report a non-ok code; that is
                // data absence, not a failure.
                debug!(ad_format, code, "mintegral format returned no data");
                continue;
            }

            let rows = data
                .pointer("/data/lists")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for row in rows {
                let revenue = coerce_f64(row.get("est_revenue"));
                let impressions = coerce_i64(row.get("impression"));
                let platform = row
                    .get("platform")
                    .and_then(Value::as_str)
                    .map(Platform::from_label)
                    .unwrap_or(Platform::Android);

                // The API reports one row per (date, platform) when asked
                // for a window; date arrives as yyyymmdd.
                let date = row
                    .get("date")
                    .and_then(Value::as_str)
                    .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y%m%d").ok());
                match date {
                    Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                    None => builder.record(platform, ad_type, revenue, impressions),
                }
            }
        }

        if builder.is_empty() {
            warn!("mintegral returned no rows for the window");
        }
        Ok(builder.finish(start, end))
    }
}
