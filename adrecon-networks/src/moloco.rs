//! Moloco publisher summary adapter.
//!
//! A login endpoint issues a session bearer valid for about an hour; the
//! session is cached through the shared token store so consecutive runs
//! reuse it. Report rows nest the dimensions (`device.os`,
//! `ad_unit.inventory_type`) and the metrics under `metric`, with
//! impressions spelled as strings.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::{debug, warn};

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown, TokenCache};
use adrecon_types::config::MolocoConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://sdkpubapi.moloco.com/api/adcloud/publisher/v1";
const TOKEN_LIFETIME_SECS: u64 = 3600;

fn ad_type_for_inventory(inventory: &str) -> AdType {
    match inventory.to_ascii_uppercase().as_str() {
        "BANNER" | "NATIVE" | "MREC" => AdType::Banner,
        "INTERSTITIAL" | "APP_OPEN" | "APPOPEN" => AdType::Interstitial,
        "REWARDED" | "REWARDED_VIDEO" | "REWARD_VIDEO" | "REWARDED_INTERSTITIAL" => {
            AdType::Rewarded
        }
        _ => AdType::Banner,
    }
}

/// Fetcher for Moloco SDK monetization data.
pub struct MolocoFetcher {
    config: MolocoConfig,
    client: HttpClient,
    tokens: Arc<TokenCache>,
    base_url: String,
}

impl MolocoFetcher {
    /// Build the adapter from its config block and the shared token store.
    #[must_use]
    pub fn new(config: MolocoConfig, tokens: Arc<TokenCache>) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            tokens,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn login(&self) -> Result<String, AdreconError> {
        let url = format!("{}/auth/tokens", self.base_url);
        let payload = json!({
            "email": self.config.email,
            "password": self.config.password,
            "workplace_id": self.config.platform_id,
        });

        let data: Value = self
            .client
            .send_json(self.client.post(&url).json(&payload))
            .await
            .map_err(|e| e.into_fetch_error(Network::Moloco))?;

        if data.get("token_type").and_then(Value::as_str) == Some("UPDATE_PASSWORD") {
            return Err(AdreconError::auth(
                Network::Moloco,
                "portal requires a password update before API access",
            ));
        }
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdreconError::response_shape(Network::Moloco, "no token in auth response")
            })?
            .to_string();

        self.tokens
            .put(Network::Moloco, &token, TOKEN_LIFETIME_SECS, "Bearer", BTreeMap::new())
            .await?;
        Ok(token)
    }

    async fn session_token(&self) -> Result<String, AdreconError> {
        if let Some(record) = self.tokens.get(Network::Moloco).await? {
            debug!("using cached moloco session");
            return Ok(record.token);
        }
        self.login().await
    }

    async fn request_summary(
        &self,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, adrecon_core::HttpError> {
        let url = format!("{}/sdk/summary", self.base_url);
        let mut payload = json!({
            "publisher_id": self.config.publisher_id,
            "date_range": {"start": start.to_string(), "end": end.to_string()},
            "dimensions": ["UTC_DATE", "DEVICE_OS", "AD_UNIT_ID"],
            "metrics": ["REVENUE", "IMPRESSIONS"],
        });
        let bundles: Vec<&str> = self
            .config
            .app_bundle_ids
            .as_deref()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if !bundles.is_empty() {
            payload["dimension_filters"] = json!([
                {"dimension": "PUBLISHER_APP_STORE_ID", "values": bundles}
            ]);
        }

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&payload);
        self.client.send(request).await.and_then(|r| r.json())
    }

    fn ad_type_for_row(&self, ad_unit: &Value) -> AdType {
        let ad_unit_id = ad_unit.get("ad_unit_id").and_then(Value::as_str).unwrap_or_default();
        if let Some(mapped) = self.config.ad_unit_mapping.get(ad_unit_id) {
            return *mapped;
        }
        ad_unit
            .get("inventory_type")
            .and_then(Value::as_str)
            .map(ad_type_for_inventory)
            .unwrap_or(AdType::Banner)
    }
}

#[async_trait]
impl NetworkFetcher for MolocoFetcher {
    fn network(&self) -> Network {
        Network::Moloco
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let token = self.session_token().await?;

        let data = match self.request_summary(&token, start, end).await {
            Ok(data) => data,
            Err(e) if e.is_auth() => {
                // One refresh on the first rejection: drop the cached
                // session, log in again, retry once.
                warn!("moloco session rejected, re-authenticating");
                self.tokens.delete(Network::Moloco).await?;
                let fresh = self.login().await?;
                self.request_summary(&fresh, start, end)
                    .await
                    .map_err(|e| e.into_fetch_error(Network::Moloco))?
            }
            Err(e) => return Err(e.into_fetch_error(Network::Moloco)),
        };

        let rows = data.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut builder = BreakdownBuilder::new(Network::Moloco);

        for row in rows {
            let metric = row.get("metric").cloned().unwrap_or_default();
            let revenue = coerce_f64(metric.get("revenue"));
            // Impressions arrive as strings from this API.
            let impressions = coerce_i64(metric.get("impressions"));

            let platform = row
                .pointer("/device/os")
                .and_then(Value::as_str)
                .map(Platform::from_label)
                .unwrap_or(Platform::Android);
            let ad_type = self.ad_type_for_row(row.get("ad_unit").unwrap_or(&Value::Null));

            let date = row
                .get("date")
                .or_else(|| row.get("utc_date"))
                .and_then(Value::as_str)
                .and_then(|raw| raw.get(..10))
                .and_then(|raw| raw.parse::<NaiveDate>().ok());
            match date {
                Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                None => builder.record(platform, ad_type, revenue, impressions),
            }
        }

        Ok(builder.finish(start, end))
    }
}
