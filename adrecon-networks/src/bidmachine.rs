//! BidMachine SSP report adapter.
//!
//! Basic auth; the report endpoint streams NDJSON, one row per line, with
//! an exclusive end date.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde_json::Value;
use tracing::debug;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::BidmachineConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://api-eu.bidmachine.io";
const REPORT_ENDPOINT: &str = "/api/v1/report/ssp";

/// Fetcher for BidMachine SSP data.
pub struct BidmachineFetcher {
    config: BidmachineConfig,
    client: HttpClient,
    base_url: String,
}

impl BidmachineFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: BidmachineConfig) -> Self {
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

    fn bundle_filter(&self) -> Vec<String> {
        self.config
            .app_bundle_ids
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

fn parse_ndjson(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            serde_json::from_str(line).ok()
        })
        .collect()
}

#[async_trait]
impl NetworkFetcher for BidmachineFetcher {
    fn network(&self) -> Network {
        Network::Bidmachine
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        // The API treats `end` as exclusive.
        let api_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
        let url = format!("{}{}", self.base_url, REPORT_ENDPOINT);
        let params = [
            ("start", start.to_string()),
            ("end", api_end.to_string()),
            ("format", "json".to_string()),
            (
                "fields",
                "date,app_bundle,platform,ad_type,impressions,clicks,ecpm,revenue".to_string(),
            ),
        ];

        let response = self
            .client
            .send(
                self.client
                    .get(&url)
                    .basic_auth(&self.config.username, Some(&self.config.password))
                    .query(&params),
            )
            .await
            .map_err(|e| e.into_fetch_error(Network::Bidmachine))?;

        let rows = parse_ndjson(&response.text());
        if rows.is_empty() {
            debug!("bidmachine returned no rows for the window");
        }

        let bundles = self.bundle_filter();
        let mut builder = BreakdownBuilder::new(Network::Bidmachine);
        for row in rows {
            if !bundles.is_empty() {
                let bundle = row.get("app_bundle").map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                if !bundle.is_some_and(|b| bundles.contains(&b)) {
                    continue;
                }
            }

            let revenue = coerce_f64(row.get("revenue"));
            let impressions = coerce_i64(row.get("impressions"));
            let platform = row
                .get("platform")
                .and_then(Value::as_str)
                .map(Platform::from_label)
                .unwrap_or(Platform::Android);
            let ad_type = row
                .get("ad_type")
                .and_then(Value::as_str)
                .map(|raw| AdType::from_label(raw, Some(true)))
                .unwrap_or(AdType::Banner);

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

    #[test]
    fn ndjson_skips_garbage_lines() {
        let text = "{\"date\":\"2026-01-08\",\"revenue\":1.5}\nnot json\n\n{\"revenue\":2}\n";
        let rows = parse_ndjson(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["date"], "2026-01-08");
    }
}
