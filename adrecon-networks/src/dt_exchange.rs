//! DT Exchange (Digital Turbine) reporting adapter.
//!
//! OAuth2 client-credentials, cached through the shared token store. The
//! report endpoint answers with a URL that must be polled until the CSV
//! materializes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::warn;

use adrecon_core::{
    BreakdownBuilder, HttpClient, NetworkFetcher, PollConfig, RawBreakdown, TokenCache,
};
use adrecon_types::config::DtExchangeConfig;
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://reporting.fyber.com";
const AUTH_ENDPOINT: &str = "/auth/v1/token";
const REPORT_ENDPOINT: &str = "/api/v1/report";

/// 59 minutes; the provider grants 60.
const TOKEN_LIFETIME_SECS: u64 = 3540;

/// Fetcher for DT Exchange monetization data.
pub struct DtExchangeFetcher {
    config: DtExchangeConfig,
    client: HttpClient,
    tokens: Arc<TokenCache>,
    base_url: String,
}

impl DtExchangeFetcher {
    /// Build the adapter from its config block and the shared token store.
    #[must_use]
    pub fn new(config: DtExchangeConfig, tokens: Arc<TokenCache>) -> Self {
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

    async fn authenticate(&self) -> Result<String, AdreconError> {
        let url = format!("{}{}", self.base_url, AUTH_ENDPOINT);
        let payload = json!({
            "grant_type": "client_credentials",
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
        });

        let data: Value = self
            .client
            .send_json(self.client.post(&url).json(&payload))
            .await
            .map_err(|e| match e.status() {
                Some(400 | 401) => AdreconError::auth(
                    Network::DtExchange,
                    "invalid client credentials",
                ),
                _ => e.into_fetch_error(Network::DtExchange),
            })?;

        let token = data
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdreconError::response_shape(Network::DtExchange, "no accessToken in auth response")
            })?
            .to_string();

        self.tokens
            .put(
                Network::DtExchange,
                &token,
                TOKEN_LIFETIME_SECS,
                "Bearer",
                BTreeMap::new(),
            )
            .await?;
        Ok(token)
    }

    async fn access_token(&self) -> Result<String, AdreconError> {
        if let Some(record) = self.tokens.get(Network::DtExchange).await? {
            return Ok(record.token);
        }
        self.authenticate().await
    }

    fn report_payload(&self, start: NaiveDate, end: NaiveDate) -> Value {
        let mut filters = Vec::new();
        let app_ids: Vec<&str> = self
            .config
            .app_ids
            .as_deref()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if !app_ids.is_empty() {
            filters.push(json!({"dimension": "Fyber App ID", "values": app_ids}));
        }
        json!({
            "source": self.config.source,
            "dateRange": {"start": start.to_string(), "end": end.to_string()},
            "metrics": ["Impressions", "Clicks", "Revenue (USD)"],
            "splits": ["Date", "Device OS", "Placement Type"],
            "filters": filters,
        })
    }

    async fn request_report_url(
        &self,
        token: &str,
        payload: &Value,
    ) -> Result<Value, adrecon_core::HttpError> {
        let url = format!("{}{}?format=csv", self.base_url, REPORT_ENDPOINT);
        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/json")
            .json(payload);
        self.client.send(request).await.and_then(|r| r.json())
    }

    fn ingest_csv(builder: &mut BreakdownBuilder, csv_bytes: &[u8]) -> Result<(), AdreconError> {
        let mut reader = csv::Reader::from_reader(csv_bytes);
        let headers = reader
            .headers()
            .map_err(|e| {
                AdreconError::response_shape(Network::DtExchange, format!("bad csv header: {e}"))
            })?
            .clone();
        let index = |name: &str| headers.iter().position(|h| h == name);
        let (date_col, os_col, placement_col, revenue_col, imp_col) = (
            index("Date"),
            index("Device OS"),
            index("Placement Type"),
            index("Revenue (USD)"),
            index("Impressions"),
        );

        for record in reader.records() {
            let record = record.map_err(|e| {
                AdreconError::response_shape(Network::DtExchange, format!("bad csv row: {e}"))
            })?;
            let field = |col: Option<usize>| col.and_then(|i| record.get(i)).unwrap_or_default();

            let platform = Platform::from_label(field(os_col));
            let ad_type = AdType::from_label(field(placement_col), None);
            let revenue: f64 = field(revenue_col).trim().parse().unwrap_or(0.0);
            let impressions = field(imp_col)
                .trim()
                .parse::<f64>()
                .map(|f| f as i64)
                .unwrap_or(0);

            match field(date_col).parse::<NaiveDate>() {
                Ok(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
                Err(_) => builder.record(platform, ad_type, revenue, impressions),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkFetcher for DtExchangeFetcher {
    fn network(&self) -> Network {
        Network::DtExchange
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let token = self.access_token().await?;
        let payload = self.report_payload(start, end);

        let response = match self.request_report_url(&token, &payload).await {
            Ok(response) => response,
            Err(e) if e.is_auth() => {
                warn!("dt_exchange token rejected, re-authenticating");
                self.tokens.delete(Network::DtExchange).await?;
                let fresh = self.authenticate().await?;
                self.request_report_url(&fresh, &payload)
                    .await
                    .map_err(|e| e.into_fetch_error(Network::DtExchange))?
            }
            Err(e) => return Err(e.into_fetch_error(Network::DtExchange)),
        };

        let report_url = response
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdreconError::response_shape(Network::DtExchange, "no report url in response")
            })?
            .to_string();

        let csv_bytes = self
            .client
            .poll_until_ready(&report_url, PollConfig::default(), |r| r)
            .await
            .map_err(|e| e.into_fetch_error(Network::DtExchange))?;

        let mut builder = BreakdownBuilder::new(Network::DtExchange);
        Self::ingest_csv(&mut builder, &csv_bytes)?;
        Ok(builder.finish(start, end))
    }
}
