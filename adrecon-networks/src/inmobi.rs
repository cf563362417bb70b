//! InMobi publisher reporting adapter.
//!
//! A session endpoint turns account credentials into a session id that the
//! reporting call carries in its headers. Sessions are cached through the
//! shared token store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::warn;

use adrecon_core::{BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown, TokenCache};
use adrecon_types::config::InmobiConfig;
use adrecon_types::delta::{coerce_f64, coerce_i64};
use adrecon_types::{AdType, AdreconError, Network, Platform};

const SESSION_URL: &str = "https://api.inmobi.com/v1.0/generatesession/generate";
const REPORTING_URL: &str = "https://api.inmobi.com/v3.0/reporting/publisher";
const SESSION_LIFETIME_SECS: u64 = 4 * 3600;

/// Fetcher for InMobi monetization data.
pub struct InmobiFetcher {
    config: InmobiConfig,
    client: HttpClient,
    tokens: Arc<TokenCache>,
    session_url: String,
    reporting_url: String,
}

impl InmobiFetcher {
    /// Build the adapter from its config block and the shared token store.
    #[must_use]
    pub fn new(config: InmobiConfig, tokens: Arc<TokenCache>) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            tokens,
            session_url: SESSION_URL.to_string(),
            reporting_url: REPORTING_URL.to_string(),
        }
    }

    /// Point the adapter at different endpoints (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let base = url.into();
        self.session_url = format!("{base}/v1.0/generatesession/generate");
        self.reporting_url = format!("{base}/v3.0/reporting/publisher");
        self
    }

    fn username(&self) -> &str {
        self.config.username.as_deref().unwrap_or(&self.config.account_id)
    }

    async fn generate_session(&self) -> Result<String, AdreconError> {
        let data: Value = self
            .client
            .send_json(
                self.client
                    .get(&self.session_url)
                    .header("userName", self.username())
                    .header("secretKey", &self.config.secret_key)
                    .header("Accept", "application/json"),
            )
            .await
            .map_err(|e| e.into_fetch_error(Network::Inmobi))?;

        if data.get("error").and_then(Value::as_bool) == Some(true) {
            return Err(AdreconError::auth(
                Network::Inmobi,
                format!("session rejected: {data}"),
            ));
        }
        let session_id = data
            .pointer("/respList/0/sessionId")
            .or_else(|| data.get("sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdreconError::response_shape(Network::Inmobi, "no sessionId in session response")
            })?
            .to_string();

        self.tokens
            .put(
                Network::Inmobi,
                &session_id,
                SESSION_LIFETIME_SECS,
                "Session",
                BTreeMap::new(),
            )
            .await?;
        Ok(session_id)
    }

    async fn session(&self) -> Result<String, AdreconError> {
        if let Some(record) = self.tokens.get(Network::Inmobi).await? {
            return Ok(record.token);
        }
        self.generate_session().await
    }

    async fn request_report(
        &self,
        session_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, adrecon_core::HttpError> {
        let mut report_request = json!({
            "metrics": ["adImpressions", "earnings"],
            "timeFrame": format!("{start}:{end}"),
            "groupBy": ["platform", "adUnitType"],
        });
        if let Some(app_ids) = &self.config.app_ids {
            report_request["filterBy"] = json!([
                {"filterName": "inmobiAppId", "filterValue": app_ids}
            ]);
        }

        let request = self
            .client
            .post(&self.reporting_url)
            .header("accountId", &self.config.account_id)
            .header("sessionId", session_id)
            .header("secretKey", &self.config.secret_key)
            .json(&json!({"reportRequest": report_request}));
        self.client.send(request).await.and_then(|r| r.json())
    }
}

#[async_trait]
impl NetworkFetcher for InmobiFetcher {
    fn network(&self) -> Network {
        Network::Inmobi
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let session_id = self.session().await?;

        let data = match self.request_report(&session_id, start, end).await {
            Ok(data) => data,
            Err(e) if e.is_auth() => {
                warn!("inmobi session rejected, regenerating");
                self.tokens.delete(Network::Inmobi).await?;
                let fresh = self.generate_session().await?;
                self.request_report(&fresh, start, end)
                    .await
                    .map_err(|e| e.into_fetch_error(Network::Inmobi))?
            }
            Err(e) => return Err(e.into_fetch_error(Network::Inmobi)),
        };

        if data.get("error").and_then(Value::as_bool) == Some(true) {
            return Err(AdreconError::response_shape(
                Network::Inmobi,
                format!("report rejected: {data}"),
            ));
        }

        let rows = data.get("respList").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut builder = BreakdownBuilder::new(Network::Inmobi);
        for row in rows {
            let revenue = coerce_f64(row.get("earnings"));
            let impressions = coerce_i64(row.get("adImpressions"));
            let platform = row
                .get("platform")
                .and_then(Value::as_str)
                .map(Platform::from_label)
                .unwrap_or(Platform::Android);
            let ad_type = row
                .get("adUnitType")
                .and_then(Value::as_str)
                .map(|raw| AdType::from_label(raw, None))
                .unwrap_or(AdType::Interstitial);
            builder.record(platform, ad_type, revenue, impressions);
        }

        Ok(builder.finish(start, end))
    }
}
