//! adrecon-max
//!
//! The mediator side of the reconciliation. Beyond behaving like a normal
//! fetcher (aggregate platform / ad-type totals), the MAX report also yields
//! one comparison row per (application, platform, network, ad type, day) --
//! the baseline every network's own numbers are compared against.
#![warn(missing_docs)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use adrecon_core::{BreakdownBuilder, HttpClient, RawBreakdown};
use adrecon_types::config::MediatorConfig;
use adrecon_types::delta::{calculate_ecpm, coerce_f64, coerce_i64, round2};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://r.applovin.com/maxReport";

/// Column sets to try, most informative first. Accounts differ in which
/// dimension spellings their report schema accepts; the first variant that
/// yields a non-empty payload wins.
const COLUMN_VARIANTS: [&str; 6] = [
    "day,package_name,network,ad_format,estimated_revenue,impressions,platform",
    "day,package_name,network,ad_format,estimated_revenue,impressions,os",
    "day,package_name,ad_format,estimated_revenue,impressions,platform",
    "day,package_name,ad_format,estimated_revenue,impressions,os",
    "day,package_name,estimated_revenue,impressions,platform",
    "day,package_name,estimated_revenue,impressions,os",
];

/// One MAX-side comparison row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxComparisonRow {
    /// Report day.
    pub date: NaiveDate,
    /// Application display name, e.g. `"MyApp (iOS)"`.
    pub application: String,
    /// Store platform of the application listing.
    pub platform: Platform,
    /// Demand network that served the impressions.
    pub network: Network,
    /// Canonical ad format.
    pub ad_type: AdType,
    /// MAX-reported impressions.
    pub impressions: i64,
    /// MAX-reported revenue in USD.
    pub revenue: f64,
    /// MAX-reported eCPM, derived.
    pub ecpm: f64,
}

/// The mediator's view of a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediatorBreakdown {
    /// Aggregate totals, shape-identical to a network fetcher's output.
    pub totals: RawBreakdown,
    /// Per-(application, platform, network, ad type, day) rows. Empty when
    /// the account's schema refused every network-carrying column variant.
    pub comparison_rows: Vec<MaxComparisonRow>,
    /// Rows dropped because their network label resolved to nothing.
    pub unresolved_networks: usize,
    /// The column variant the account accepted.
    pub columns_used: String,
}

/// Fetcher for the AppLovin MAX report.
pub struct MaxFetcher {
    config: MediatorConfig,
    client: HttpClient,
    base_url: String,
}

impl MaxFetcher {
    /// Build the mediator fetcher from its config block.
    #[must_use]
    pub fn new(config: MediatorConfig) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the fetcher at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Fetch the window and build totals plus comparison rows.
    ///
    /// # Errors
    /// Always [`AdreconError::Mediator`]: any failure on the mediator side
    /// is fatal for the run.
    pub async fn fetch_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MediatorBreakdown, AdreconError> {
        let (rows, columns_used) = self.fetch_rows(start, end).await?;
        let has_network = columns_used.contains("network");
        if !has_network {
            warn!(columns = %columns_used, "account schema has no network column, comparison rows unavailable");
        }

        let mut builder = BreakdownBuilder::new(Network::Applovin);
        let mut keyed: BTreeMap<(NaiveDate, Network, Platform, AdType, String), (f64, i64)> =
            BTreeMap::new();
        let mut unresolved = 0usize;

        for row in &rows {
            let revenue = coerce_f64(row.get("estimated_revenue").or_else(|| row.get("revenue")));
            let impressions =
                coerce_i64(row.get("impressions").or_else(|| row.get("impression")));
            let platform = detect_platform(row);
            let ad_type = detect_ad_type(row);
            let date = row
                .get("day")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<NaiveDate>().ok());

            let package = row
                .get("package_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !self.package_matches(package) {
                continue;
            }

            match date {
                Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                None => builder.record(platform, ad_type, revenue, impressions),
            }

            if !has_network {
                continue;
            }
            let label = row.get("network").and_then(Value::as_str).unwrap_or_default();
            let Some(network) = Network::from_api_name(label) else {
                // Unknown demand source: counted, never guessed.
                unresolved += 1;
                debug!(label, "dropping row with unresolvable network label");
                continue;
            };
            let Some(date) = date else {
                continue;
            };

            let application = self.application_name(package, platform);
            let entry = keyed
                .entry((date, network, platform, ad_type, application))
                .or_insert((0.0, 0));
            entry.0 += revenue;
            entry.1 += impressions;
        }

        let comparison_rows = keyed
            .into_iter()
            .map(|((date, network, platform, ad_type, application), (revenue, impressions))| {
                MaxComparisonRow {
                    date,
                    application,
                    platform,
                    network,
                    ad_type,
                    impressions,
                    revenue: round2(revenue),
                    ecpm: calculate_ecpm(revenue, impressions),
                }
            })
            .collect();

        Ok(MediatorBreakdown {
            totals: builder.finish(start, end),
            comparison_rows,
            unresolved_networks: unresolved,
            columns_used,
        })
    }

    async fn fetch_rows(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Vec<Value>, String), AdreconError> {
        let mut last_error = String::from("no column variant accepted");

        for columns in COLUMN_VARIANTS {
            let mut params = vec![
                ("api_key", self.config.api_key.clone()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("columns", columns.to_string()),
                ("format", "json".to_string()),
            ];
            if let Some(package) = &self.config.package_name {
                params.push(("filter_package_name", package.clone()));
            }

            let response = self
                .client
                .send(self.client.get(&self.base_url).query(&params))
                .await;
            let data: Value = match response.and_then(|r| r.json()) {
                Ok(data) => data,
                Err(e) => {
                    // Schema rejections come back as 4xx; remember and try
                    // the next variant.
                    last_error = e.to_string();
                    continue;
                }
            };

            let rows = ["results", "data", "rows"]
                .iter()
                .find_map(|k| data.get(k).and_then(Value::as_array))
                .cloned()
                .unwrap_or_default();
            if rows.is_empty() {
                last_error = "empty payload".to_string();
                continue;
            }
            debug!(columns, rows = rows.len(), "max report accepted");
            return Ok((rows, columns.to_string()));
        }

        let truncated: String = last_error.chars().take(300).collect();
        Err(AdreconError::mediator(format!(
            "max report failed for every column variant: {truncated}"
        )))
    }

    fn package_matches(&self, package: &str) -> bool {
        if self.config.applications.is_empty() {
            return true;
        }
        if package.is_empty() {
            return true;
        }
        self.config
            .applications
            .iter()
            .all(|app| app.package_name.is_none())
            || self
                .config
                .applications
                .iter()
                .any(|app| app.package_name.as_deref() == Some(package))
    }

    fn application_name(&self, package: &str, platform: Platform) -> String {
        self.config
            .applications
            .iter()
            .find(|app| {
                app.platform == platform
                    && (app.package_name.is_none()
                        || app.package_name.as_deref() == Some(package))
            })
            .map(|app| app.name.clone())
            .unwrap_or_else(|| {
                if package.is_empty() {
                    format!("unknown ({})", platform.display_name())
                } else {
                    format!("{package} ({})", platform.display_name())
                }
            })
    }
}

fn detect_platform(row: &Value) -> Platform {
    for key in ["platform", "os", "os_name"] {
        if let Some(label) = row.get(key).and_then(Value::as_str) {
            if let Some(platform) = Platform::try_from_label(label) {
                return platform;
            }
        }
    }
    Platform::Android
}

fn detect_ad_type(row: &Value) -> AdType {
    let label = ["ad_format", "format", "format_name"]
        .iter()
        .find_map(|k| row.get(k).and_then(Value::as_str))
        .unwrap_or_default();
    let upper = label.to_ascii_uppercase();
    // MAX spells interstitial as the bare INTER in several schemas.
    if upper.contains("BANNER") || upper.contains("MREC") {
        AdType::Banner
    } else if upper.contains("REWARD") {
        AdType::Rewarded
    } else if upper.contains("INTER") || upper.contains("APPOPEN") || upper.contains("APP_OPEN") {
        AdType::Interstitial
    } else {
        AdType::from_label(label, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn max_format_spellings() {
        assert_eq!(detect_ad_type(&json!({"ad_format": "INTER"})), AdType::Interstitial);
        assert_eq!(detect_ad_type(&json!({"ad_format": "BANNER"})), AdType::Banner);
        assert_eq!(detect_ad_type(&json!({"ad_format": "REWARDED"})), AdType::Rewarded);
        assert_eq!(detect_ad_type(&json!({"format": "MREC"})), AdType::Banner);
        assert_eq!(detect_ad_type(&json!({})), AdType::Interstitial);
    }

    #[test]
    fn platform_detection_prefers_known_labels() {
        assert_eq!(detect_platform(&json!({"platform": "ios"})), Platform::Ios);
        assert_eq!(detect_platform(&json!({"os": "ANDROID"})), Platform::Android);
        assert_eq!(
            detect_platform(&json!({"platform": "roku", "os": "ios"})),
            Platform::Ios
        );
        assert_eq!(detect_platform(&json!({})), Platform::Android);
    }
}
