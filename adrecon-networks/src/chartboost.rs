//! Chartboost publisher metrics adapter.
//!
//! OAuth2 client-credentials against the platform gateway, cached through
//! the shared token store. The metrics endpoint has no OS dimension; the
//! operator supplies an app -> platform map and anything outside it is
//! skipped with a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::warn;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown, TokenCache};
use adrecon_types::config::ChartboostConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const AUTH_URL: &str = "https://api.chartboost.com/v5/oauth/token";
const REPORT_URL: &str = "https://helium-api.chartboost.com/v2/publisher/metrics";
const OAUTH_AUDIENCE: &str = "https://public.api.gateway.chartboost.com";

/// Fetcher for Chartboost monetization data.
pub struct ChartboostFetcher {
    config: ChartboostConfig,
    client: HttpClient,
    tokens: Arc<TokenCache>,
    auth_url: String,
    report_url: String,
}

impl ChartboostFetcher {
    /// Build the adapter from its config block and the shared token store.
    #[must_use]
    pub fn new(config: ChartboostConfig, tokens: Arc<TokenCache>) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            tokens,
            auth_url: AUTH_URL.to_string(),
            report_url: REPORT_URL.to_string(),
        }
    }

    /// Point the adapter at different endpoints (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let base = url.into();
        self.auth_url = format!("{base}/v5/oauth/token");
        self.report_url = format!("{base}/v2/publisher/metrics");
        self
    }

    async fn authenticate(&self) -> Result<String, AdreconError> {
        let payload = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "audience": OAUTH_AUDIENCE,
            "grant_type": "client_credentials",
        });

        let data: Value = self
            .client
            .send_json(self.client.post(&self.auth_url).json(&payload))
            .await
            .map_err(|e| match e.status() {
                Some(400 | 401 | 403) => {
                    AdreconError::auth(Network::Chartboost, "invalid client credentials")
                }
                _ => e.into_fetch_error(Network::Chartboost),
            })?;

        let token = data
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdreconError::response_shape(Network::Chartboost, "no access_token in response")
            })?
            .to_string();
        let expires_in = data.get("expires_in").and_then(Value::as_u64).unwrap_or(86_400);

        self.tokens
            .put(Network::Chartboost, &token, expires_in, "Bearer", BTreeMap::new())
            .await?;
        Ok(token)
    }

    async fn access_token(&self) -> Result<String, AdreconError> {
        if let Some(record) = self.tokens.get(Network::Chartboost).await? {
            return Ok(record.token);
        }
        self.authenticate().await
    }

    async fn request_metrics(
        &self,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, adrecon_core::HttpError> {
        let mut payload = json!({
            "date_min": start.to_string(),
            "date_max": end.to_string(),
            "timezone": self.config.time_zone,
            "dimensions": ["date", "app", "placement_type"],
            "metrics": ["impressions", "estimated_earnings", "ecpm"],
        });
        let app_ids: Vec<&str> = self
            .config
            .app_ids
            .as_deref()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if !app_ids.is_empty() {
            payload["filters"] = json!({"apps": app_ids});
        }

        let request = self
            .client
            .post(&self.report_url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&payload);
        self.client.send(request).await.and_then(|r| r.json())
    }
}

#[async_trait]
impl NetworkFetcher for ChartboostFetcher {
    fn network(&self) -> Network {
        Network::Chartboost
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let token = self.access_token().await?;

        let data = match self.request_metrics(&token, start, end).await {
            Ok(data) => data,
            Err(e) if e.is_auth() => {
                warn!("chartboost token rejected, re-authenticating");
                self.tokens.delete(Network::Chartboost).await?;
                let fresh = self.authenticate().await?;
                self.request_metrics(&fresh, start, end)
                    .await
                    .map_err(|e| e.into_fetch_error(Network::Chartboost))?
            }
            Err(e) => return Err(e.into_fetch_error(Network::Chartboost)),
        };

        let rows = data.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut builder = BreakdownBuilder::new(Network::Chartboost);
        let mut unmapped = 0usize;

        for row in rows {
            let app_id = row.get("app").and_then(Value::as_str).unwrap_or_default();
            let Some(platform) = self.config.app_platform_map.get(app_id).copied() else {
                unmapped += 1;
                continue;
            };
            let ad_type = row
                .get("placement_type")
                .and_then(Value::as_str)
                .map(|raw| AdType::from_label(raw, None))
                .unwrap_or(AdType::Interstitial);
            let revenue = coerce_f64(row.get("estimated_earnings"));
            let impressions = coerce_i64(row.get("impressions"));

            let date = row
                .get("date")
                .and_then(Value::as_str)
                .and_then(|raw| raw.get(..10))
                .and_then(|raw| raw.parse::<NaiveDate>().ok());
            match date {
                Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                None => builder.record(platform, ad_type, revenue, impressions),
            }
        }

        if unmapped > 0 {
            warn!(
                unmapped,
                "chartboost rows skipped: app ids missing from app_platform_map"
            );
        }
        Ok(builder.finish(start, end))
    }
}
