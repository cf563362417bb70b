//! AdMob network report adapter.
//!
//! Service-account OAuth (RS256 JWT grant) through the shared helper. The
//! report endpoint streams a JSON array whose elements wrap header, rows
//! and footer; earnings arrive in micros.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};

use adrecon_core::{
    BreakdownBuilder, HttpClient, NetworkFetcher, RawBreakdown, ServiceAccountAuth,
    ServiceAccountKey,
};
use adrecon_types::config::AdmobConfig;
use adrecon_types::delta::coerce_i64;
use adrecon_types::{AdType, AdreconError, Network, Platform};

const BASE_URL: &str = "https://admob.googleapis.com/v1";
const SCOPE: &str = "https://www.googleapis.com/auth/admob.readonly";
const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Fetcher for AdMob network report data.
pub struct AdmobFetcher {
    config: AdmobConfig,
    client: HttpClient,
    auth: Option<ServiceAccountAuth>,
    base_url: String,
}

impl AdmobFetcher {
    /// Build the adapter; the service-account key is loaded lazily on the
    /// first fetch so a disabled network never touches the key file.
    #[must_use]
    pub fn new(config: AdmobConfig) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            auth: None,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Inject a pre-built auth source (tests).
    #[must_use]
    pub fn with_auth(mut self, auth: ServiceAccountAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Point the adapter at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn account_name(&self) -> String {
        let id = self.config.publisher_id.trim_start_matches("pub-");
        format!("accounts/pub-{id}")
    }

    async fn bearer(&self) -> Result<String, AdreconError> {
        match &self.auth {
            Some(auth) => auth.bearer(&self.client).await,
            None => {
                let key = ServiceAccountKey::load(&self.config.service_account_path).await?;
                ServiceAccountAuth::new(key, SCOPE.to_string())
                    .bearer(&self.client)
                    .await
            }
        }
        .map_err(|e| match e {
            AdreconError::Config(msg) => AdreconError::auth(Network::Admob, msg),
            other => other,
        })
    }

    fn report_body(&self, start: NaiveDate, end: NaiveDate) -> Value {
        let date_json = |d: NaiveDate| {
            json!({"year": d.year(), "month": d.month(), "day": d.day()})
        };
        let mut filters = Vec::new();
        let app_ids: Vec<&str> = self
            .config
            .app_ids
            .as_deref()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if !app_ids.is_empty() {
            filters.push(json!({"dimension": "APP", "matchesAny": {"values": app_ids}}));
        }
        json!({
            "reportSpec": {
                "dateRange": {"startDate": date_json(start), "endDate": date_json(end)},
                "dimensions": ["DATE", "APP", "PLATFORM", "FORMAT"],
                "metrics": ["ESTIMATED_EARNINGS", "IMPRESSIONS"],
                "dimensionFilters": filters,
                "sortConditions": [{"dimension": "DATE", "order": "DESCENDING"}],
            }
        })
    }

    fn ingest_row(builder: &mut BreakdownBuilder, row: &Value) {
        let dimensions = row.get("dimensionValues").cloned().unwrap_or_default();
        let metrics = row.get("metricValues").cloned().unwrap_or_default();

        let platform = dimensions
            .pointer("/PLATFORM/value")
            .and_then(Value::as_str)
            .map(Platform::from_label)
            .unwrap_or(Platform::Android);
        let ad_type = dimensions
            .pointer("/FORMAT/value")
            .and_then(Value::as_str)
            .map(|raw| AdType::from_label(raw, None))
            .unwrap_or(AdType::Interstitial);

        let micros = coerce_i64(metrics.pointer("/ESTIMATED_EARNINGS/microsValue"));
        let revenue = micros as f64 / MICROS_PER_UNIT;
        let impressions = coerce_i64(metrics.pointer("/IMPRESSIONS/integerValue"));

        let date = dimensions
            .pointer("/DATE/value")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y%m%d").ok());
        match date {
            Some(date) => builder.record_daily(date, platform, ad_type, revenue, impressions),
            None => builder.record(platform, ad_type, revenue, impressions),
        }
    }
}

#[async_trait]
impl NetworkFetcher for AdmobFetcher {
    fn network(&self) -> Network {
        Network::Admob
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        let token = self.bearer().await?;
        let url = format!(
            "{}/{}/networkReport:generate",
            self.base_url,
            self.account_name()
        );

        let response: Value = self
            .client
            .send_json(
                self.client
                    .post(&url)
                    .header("Authorization", format!("Bearer {token}"))
                    .json(&self.report_body(start, end)),
            )
            .await
            .map_err(|e| e.into_fetch_error(Network::Admob))?;

        let mut builder = BreakdownBuilder::new(Network::Admob);
        match &response {
            // Streaming shape: [{header}, {row}, {row}, ..., {footer}]
            Value::Array(items) => {
                for item in items {
                    if let Some(row) = item.get("row") {
                        Self::ingest_row(&mut builder, row);
                    }
                }
            }
            Value::Object(_) => {
                for row in response
                    .get("rows")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    Self::ingest_row(&mut builder, row);
                }
            }
            other => {
                return Err(AdreconError::response_shape(
                    Network::Admob,
                    format!("unexpected report shape: {other}"),
                ));
            }
        }

        Ok(builder.finish(start, end))
    }
}
