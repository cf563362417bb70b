//! Pangle reporting adapter.
//!
//! Digest-signed query: parameters are sorted, concatenated as
//! `k=v&k=v`, suffixed with the secure key and hashed. The endpoint only
//! answers single-day queries, so the window is iterated day by day under
//! the documented 5 QPS cap (a 200ms floor between requests).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use md5::{Digest, Md5};
use serde_json::Value;
use tracing::debug;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::PangleConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://open-api.pangleglobal.com";
const REPORT_ENDPOINT: &str = "/union_pangle/open/api/rt/income";
const API_VERSION: &str = "2.0";
const SIGN_TYPE: &str = "MD5";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

/// Numeric slot codes from the reporting API.
fn ad_type_for_slot(slot: i64) -> Option<AdType> {
    match slot {
        // In-feed, horizontal banner, draw in-feed.
        1 | 2 | 7 => Some(AdType::Banner),
        // Splash, interstitial, full-page video, in-stream, new interstitial.
        3 | 4 | 6 | 8 | 9 => Some(AdType::Interstitial),
        5 => Some(AdType::Rewarded),
        _ => None,
    }
}

/// Fetcher for Pangle monetization data.
pub struct PangleFetcher {
    config: PangleConfig,
    client: HttpClient,
    base_url: String,
}

impl PangleFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: PangleConfig) -> Self {
        Self {
            config,
            client: HttpClient::new().with_min_interval(MIN_REQUEST_INTERVAL),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn sign(&self, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Md5::digest(format!("{joined}{}", self.config.secure_key).as_bytes()))
    }

    async fn fetch_single_day(&self, date: NaiveDate) -> Result<Vec<Value>, AdreconError> {
        let mut params = vec![
            ("user_id".to_string(), self.config.user_id.clone()),
            ("role_id".to_string(), self.config.role_id.clone()),
            ("date".to_string(), date.to_string()),
            ("version".to_string(), API_VERSION.to_string()),
            ("sign_type".to_string(), SIGN_TYPE.to_string()),
            ("time_zone".to_string(), self.config.time_zone.to_string()),
            ("currency".to_string(), self.config.currency.clone()),
        ];
        params.push(("sign".to_string(), self.sign(&params)));

        let url = format!("{}{}", self.base_url, REPORT_ENDPOINT);
        let data: Value = self
            .client
            .send_json(self.client.get(&url).query(&params))
            .await
            .map_err(|e| e.into_fetch_error(Network::Pangle))?;

        let code = data.get("Code").and_then(Value::as_str).unwrap_or_default();
        let message = data.get("Message").and_then(Value::as_str).unwrap_or_default();
        match code {
            "100" => {}
            // Success with no rows for the day.
            "PD0004" => return Ok(Vec::new()),
            "101" | "102" => {
                return Err(AdreconError::auth(
                    Network::Pangle,
                    format!("signature rejected (code {code})"),
                ));
            }
            "106" => return Err(AdreconError::RateLimit { network: Network::Pangle }),
            other => {
                return Err(AdreconError::response_shape(
                    Network::Pangle,
                    format!("code {other}: {message}"),
                ));
            }
        }

        // Rows are nested under their date key inside Data.
        let mut records = Vec::new();
        if let Some(map) = data.get("Data").and_then(Value::as_object) {
            for day_records in map.values() {
                if let Some(list) = day_records.as_array() {
                    records.extend(list.iter().cloned());
                }
            }
        }
        Ok(records)
    }

    fn package_filter(&self) -> Vec<String> {
        self.config
            .package_names
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl NetworkFetcher for PangleFetcher {
    fn network(&self) -> Network {
        Network::Pangle
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let packages = self.package_filter();
        let mut builder = BreakdownBuilder::new(Network::Pangle);

        let mut date = start;
        while date <= end {
            let records = self.fetch_single_day(date).await?;
            debug!(%date, rows = records.len(), "pangle day fetched");

            for record in records {
                if !packages.is_empty() {
                    let package = record
                        .get("package_name")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if !packages.iter().any(|p| p == package) {
                        continue;
                    }
                }

                let Some(platform) = record
                    .get("os")
                    .and_then(Value::as_str)
                    .and_then(Platform::try_from_label)
                else {
                    // Aggregate rows carry no usable platform.
                    continue;
                };
                let revenue = coerce_f64(record.get("revenue"));
                let impressions = coerce_i64(record.get("show"));

                let slot = coerce_i64(record.get("ad_slot_type"));
                match ad_type_for_slot(slot) {
                    Some(ad_type) => {
                        builder.record_daily(date, platform, ad_type, revenue, impressions);
                    }
                    // Unknown slot codes still count toward totals.
                    None => builder.record_daily(
                        date,
                        platform,
                        AdType::Interstitial,
                        revenue,
                        impressions,
                    ),
                }
            }

            date = match date.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(builder.finish(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_codes_resolve() {
        assert_eq!(ad_type_for_slot(5), Some(AdType::Rewarded));
        assert_eq!(ad_type_for_slot(2), Some(AdType::Banner));
        assert_eq!(ad_type_for_slot(4), Some(AdType::Interstitial));
        assert_eq!(ad_type_for_slot(42), None);
    }

    #[test]
    fn sign_is_order_independent() {
        let fetcher = PangleFetcher::new(PangleConfig {
            enabled: true,
            user_id: "1".into(),
            role_id: "2".into(),
            secure_key: "sk".into(),
            ..PangleConfig::default()
        });
        let a = fetcher.sign(&[
            ("user_id".into(), "1".into()),
            ("date".into(), "2026-01-08".into()),
        ]);
        let b = fetcher.sign(&[
            ("date".into(), "2026-01-08".into()),
            ("user_id".into(), "1".into()),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
