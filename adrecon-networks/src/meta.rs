//! Meta Audience Network adapter.
//!
//! Static bearer token against the graph insights endpoint. Each metric
//! arrives as its own row keyed by a breakdown list. Large windows are
//! answered asynchronously with a query id that must be polled. Single-day
//! windows are assembled from hourly slices and carry an hour-coverage
//! diagnostic, since the daily figure is not final inside Meta's 48h
//! reporting delay.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown};
use adrecon_types::config::MetaConfig;
use adrecon_types::delta::coerce_f64;
use adrecon_types::{AdType, AdreconError, Network, Platform};

const API_VERSION: &str = "v21.0";
const POLL_ATTEMPTS: u32 = 10;
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// Fetcher for Meta Audience Network data.
pub struct MetaFetcher {
    config: MetaConfig,
    client: HttpClient,
    base_url: String,
}

impl MetaFetcher {
    /// Build the adapter from its config block.
    #[must_use]
    pub fn new(config: MetaConfig) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            base_url: format!("https://graph.facebook.com/{API_VERSION}"),
        }
    }

    /// Point the adapter at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn query(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        hourly: bool,
    ) -> Result<Vec<Value>, AdreconError> {
        let url = format!("{}/{}/adnetworkanalytics", self.base_url, self.config.business_id);
        let breakdowns = if hourly {
            r#"["platform","display_format","time"]"#
        } else {
            r#"["platform","display_format"]"#
        };
        let params = [
            ("access_token", self.config.access_token.clone()),
            ("since", format!("{start}T00:00:00Z+0000")),
            ("until", format!("{end}T23:59:59Z+0000")),
            (
                "metrics",
                r#"["fb_ad_network_revenue","fb_ad_network_imp"]"#.to_string(),
            ),
            ("breakdowns", breakdowns.to_string()),
        ];

        let response: Value = self
            .client
            .send_json(self.client.get(&url).query(&params))
            .await
            .map_err(|e| e.into_fetch_error(Network::Meta))?;

        if let Some(query_id) = response.get("query_id").and_then(Value::as_str) {
            debug!(query_id, "meta answered with an async query");
            return self.poll_results(query_id).await;
        }
        Ok(flatten_results(response.get("data")))
    }

    async fn poll_results(&self, query_id: &str) -> Result<Vec<Value>, AdreconError> {
        let url = format!(
            "{}/{}/adnetworkanalytics_results",
            self.base_url, self.config.business_id
        );
        let query_ids = format!(r#"["{query_id}"]"#);

        for _ in 0..POLL_ATTEMPTS {
            let params = [
                ("access_token", self.config.access_token.as_str()),
                ("query_ids", query_ids.as_str()),
            ];
            let response: Value = self
                .client
                .send_json(self.client.get(&url).query(&params))
                .await
                .map_err(|e| e.into_fetch_error(Network::Meta))?;

            for item in response
                .get("data")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                match item.get("status").and_then(Value::as_str) {
                    Some("complete") => {
                        return Ok(item
                            .get("results")
                            .and_then(Value::as_array)
                            .cloned()
                            .unwrap_or_default());
                    }
                    Some("failed" | "error") => {
                        return Err(AdreconError::response_shape(
                            Network::Meta,
                            format!("async query failed: {item}"),
                        ));
                    }
                    _ => {}
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Err(AdreconError::transport(
            Network::Meta,
            "async query polling timed out",
        ))
    }
}

fn flatten_results(data: Option<&Value>) -> Vec<Value> {
    let mut out = Vec::new();
    for entry in data.and_then(Value::as_array).into_iter().flatten() {
        if let Some(results) = entry.get("results").and_then(Value::as_array) {
            out.extend(results.iter().cloned());
        } else if entry.get("metric").is_some() {
            out.push(entry.clone());
        }
    }
    out
}

fn breakdown_value<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get("breakdowns")
        .and_then(Value::as_array)?
        .iter()
        .find(|b| b.get("key").and_then(Value::as_str) == Some(key))
        .and_then(|b| b.get("value"))
        .and_then(Value::as_str)
}

#[async_trait]
impl NetworkFetcher for MetaFetcher {
    fn network(&self) -> Network {
        Network::Meta
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let hourly = start == end;
        let rows = self.query(start, end, hourly).await?;
        if rows.is_empty() {
            debug!("meta returned no metric rows");
        }

        let mut builder = BreakdownBuilder::new(Network::Meta);
        let mut hours: BTreeSet<u32> = BTreeSet::new();

        for row in &rows {
            let metric = row.get("metric").and_then(Value::as_str).unwrap_or_default();
            let value = coerce_f64(row.get("value"));

            let platform = breakdown_value(row, "platform")
                .map(Platform::from_label)
                .unwrap_or(Platform::Android);
            let ad_type = breakdown_value(row, "display_format")
                .map(|f| AdType::from_label(f, None))
                .unwrap_or(AdType::Interstitial);
            if let Some(time) = breakdown_value(row, "time") {
                // "YYYY-MM-DD HH:MM:SS" slices; track observed hours.
                if let Some(hour) = time.get(11..13).and_then(|h| h.parse::<u32>().ok()) {
                    hours.insert(hour);
                }
            }

            match metric {
                "fb_ad_network_revenue" => builder.record(platform, ad_type, value, 0),
                "fb_ad_network_imp" => builder.record(platform, ad_type, 0.0, value as i64),
                // cpm is derived locally, everything else is noise.
                _ => {}
            }
        }

        if hourly && !hours.is_empty() {
            let first = hours.iter().next().copied().unwrap_or(0);
            let last = hours.iter().next_back().copied().unwrap_or(0);
            builder.set_hour_range(format!(
                "{first:02}:00-{last:02}:00 UTC ({}/24)",
                hours.len()
            ));
        }

        Ok(builder.finish(start, end))
    }
}
