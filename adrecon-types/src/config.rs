//! Configuration structs deserialized from the operator's config file.
//!
//! Each network gets its own credential block keyed by the canonical network
//! name. Unknown keys anywhere in the tree are collected rather than
//! rejected so an operator typo degrades to a logged warning, never a crash.

use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{AdType, AdreconError, Platform};

/// Root configuration for a reconciliation deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mediator (AppLovin MAX) credentials and application list.
    #[serde(default)]
    pub mediator: MediatorConfig,
    /// Per-network credential blocks.
    #[serde(default)]
    pub networks: NetworksConfig,
    /// Threshold / floor / window settings for the comparison.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Columnar export destination.
    #[serde(default)]
    pub export: ExportConfig,
    /// Alert delivery settings.
    #[serde(default)]
    pub alerting: AlertingConfig,
    /// Daemon scheduling settings.
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    /// Directory for persisted token records.
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,
    /// Unrecognized top-level keys, kept for warning output.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_credentials_dir() -> String {
    "credentials".to_string()
}

impl AppConfig {
    /// Check the invariants a run cannot start without.
    ///
    /// # Errors
    /// Returns [`AdreconError::Config`] when the mediator block is unusable
    /// or validation numbers are out of range.
    pub fn validate(&self) -> Result<(), AdreconError> {
        if self.mediator.api_key.trim().is_empty() {
            return Err(AdreconError::config("mediator.api_key is required"));
        }
        if self.mediator.applications.is_empty() && self.mediator.package_name.is_none() {
            return Err(AdreconError::config(
                "mediator needs either an applications list or a package_name",
            ));
        }
        if self.validation.threshold_pct <= 0.0 {
            return Err(AdreconError::config("validation.threshold_pct must be > 0"));
        }
        if self.validation.min_revenue_floor < 0.0 {
            return Err(AdreconError::config(
                "validation.min_revenue_floor must be >= 0",
            ));
        }
        if self.validation.date_range_days < 1 {
            return Err(AdreconError::config(
                "validation.date_range_days must be >= 1",
            ));
        }
        self.scheduling.parsed_times()?;
        Ok(())
    }

    /// Dotted paths of every unrecognized key in the tree, for warning logs.
    #[must_use]
    pub fn unknown_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.extra.keys().cloned().collect();
        keys.extend(self.networks.extra.keys().map(|k| format!("networks.{k}")));
        keys
    }
}

/// Mediator (AppLovin MAX) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediatorConfig {
    /// MAX reporting API key.
    #[serde(default)]
    pub api_key: String,
    /// Single package filter; superseded by `applications` when both are set.
    #[serde(default)]
    pub package_name: Option<String>,
    /// Applications to reconcile, one entry per store listing.
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

/// One mediated application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Display name as it appears in MAX rows, e.g. `"MyApp (iOS)"`.
    pub name: String,
    /// Store platform of this listing.
    pub platform: Platform,
    /// Store package / bundle identifier.
    #[serde(default)]
    pub package_name: Option<String>,
}

/// Per-network credential blocks. A `None` block behaves like
/// `enabled = false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworksConfig {
    /// Mintegral reporting credentials.
    #[serde(default)]
    pub mintegral: Option<MintegralConfig>,
    /// Unity Ads monetization stats credentials.
    #[serde(default)]
    pub unity: Option<UnityConfig>,
    /// AdMob network report credentials.
    #[serde(default)]
    pub admob: Option<AdmobConfig>,
    /// ironSource mediation stats credentials.
    #[serde(default)]
    pub ironsource: Option<IronsourceConfig>,
    /// Meta Audience Network graph credentials.
    #[serde(default)]
    pub meta: Option<MetaConfig>,
    /// Moloco publisher summary credentials.
    #[serde(default)]
    pub moloco: Option<MolocoConfig>,
    /// InMobi reporting credentials.
    #[serde(default)]
    pub inmobi: Option<InmobiConfig>,
    /// BidMachine SSP report credentials.
    #[serde(default)]
    pub bidmachine: Option<BidmachineConfig>,
    /// Liftoff Monetize report credentials.
    #[serde(default)]
    pub liftoff: Option<LiftoffConfig>,
    /// DT Exchange reporting credentials.
    #[serde(default)]
    pub dt_exchange: Option<DtExchangeConfig>,
    /// Pangle reporting credentials.
    #[serde(default)]
    pub pangle: Option<PangleConfig>,
    /// Chartboost metrics credentials.
    #[serde(default)]
    pub chartboost: Option<ChartboostConfig>,
    /// Unrecognized network blocks, kept for warning output.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Mintegral: digest-signed query auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintegralConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// API skey from the Mintegral dashboard.
    pub skey: String,
    /// API secret used for request signing.
    pub secret: String,
    /// Optional comma-separated app id filter.
    #[serde(default)]
    pub app_ids: Option<String>,
}

/// Unity Ads: static key auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnityConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Monetization stats API key.
    pub api_key: String,
    /// Organization core id.
    pub organization_id: String,
    /// Optional comma-separated game id filter.
    #[serde(default)]
    pub game_ids: Option<String>,
}

/// AdMob: service-account OAuth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmobConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Publisher id (`pub-...`, prefix optional).
    pub publisher_id: String,
    /// Path to the service-account JSON key.
    pub service_account_path: String,
    /// Optional comma-separated app id filter.
    #[serde(default)]
    pub app_ids: Option<String>,
}

/// ironSource: Basic auth with per-platform app keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IronsourceConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Account username (email).
    pub username: String,
    /// Reporting secret key.
    pub secret_key: String,
    /// Optional comma-separated Android app keys.
    #[serde(default)]
    pub android_app_keys: Option<String>,
    /// Optional comma-separated iOS app keys.
    #[serde(default)]
    pub ios_app_keys: Option<String>,
}

/// Meta Audience Network: static bearer token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Long-lived system-user access token.
    pub access_token: String,
    /// Business id owning the monetization properties.
    pub business_id: String,
    /// Optional comma-separated property id filter.
    #[serde(default)]
    pub property_ids: Option<String>,
}

/// Moloco: login-issued session token, cached on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MolocoConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Publisher portal login email.
    pub email: String,
    /// Publisher portal password.
    pub password: String,
    /// Platform (workplace) id used during login.
    pub platform_id: String,
    /// Publisher id used in report requests.
    pub publisher_id: String,
    /// Optional comma-separated store bundle id filter.
    #[serde(default)]
    pub app_bundle_ids: Option<String>,
    /// Reporting timezone passed to the API.
    #[serde(default = "default_utc")]
    pub time_zone: String,
    /// Overrides mapping opaque ad-unit ids to canonical ad types.
    #[serde(default)]
    pub ad_unit_mapping: BTreeMap<String, AdType>,
}

fn default_utc() -> String {
    "UTC".to_string()
}

/// InMobi: session-token auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InmobiConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Account id from the publisher dashboard.
    pub account_id: String,
    /// API secret key.
    pub secret_key: String,
    /// Login email; defaults to the account id when absent.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional comma-separated app id filter.
    #[serde(default)]
    pub app_ids: Option<String>,
}

/// BidMachine: Basic auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidmachineConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// SSP account username.
    pub username: String,
    /// SSP account password.
    pub password: String,
    /// Optional comma-separated store bundle id filter.
    #[serde(default)]
    pub app_bundle_ids: Option<String>,
}

/// Liftoff Monetize: static bearer token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiftoffConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Reporting API key.
    pub api_key: String,
    /// Optional comma-separated application id filter.
    #[serde(default)]
    pub application_ids: Option<String>,
}

/// DT Exchange: OAuth2 client credentials with async CSV reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DtExchangeConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Report source; `mediation` for DT Exchange traffic.
    #[serde(default = "default_dt_source")]
    pub source: String,
    /// Optional comma-separated app id filter.
    #[serde(default)]
    pub app_ids: Option<String>,
}

fn default_dt_source() -> String {
    "mediation".to_string()
}

/// Pangle: digest-signed query over single-day requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PangleConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// Account user id.
    pub user_id: String,
    /// Role id paired with the secure key.
    pub role_id: String,
    /// Secure key used for request signing.
    pub secure_key: String,
    /// Timezone offset passed to the API (0 = UTC).
    #[serde(default)]
    pub time_zone: i32,
    /// Revenue currency (`usd` or `cny`).
    #[serde(default = "default_usd")]
    pub currency: String,
    /// Optional comma-separated package name filter.
    #[serde(default)]
    pub package_names: Option<String>,
}

fn default_usd() -> String {
    "usd".to_string()
}

/// Chartboost: OAuth2 client credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartboostConfig {
    /// Whether this network participates in the run.
    #[serde(default)]
    pub enabled: bool,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Optional comma-separated app id filter.
    #[serde(default)]
    pub app_ids: Option<String>,
    /// Reporting timezone passed to the API.
    #[serde(default = "default_utc")]
    pub time_zone: String,
    /// Overrides mapping app ids to platforms when the API omits the OS.
    #[serde(default)]
    pub app_platform_map: BTreeMap<String, Platform>,
}

/// Threshold / floor / window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Revenue delta (percent) above which a row counts as a breach.
    #[serde(default = "default_threshold")]
    pub threshold_pct: f64,
    /// Rows whose MAX revenue is below this floor are never breaches.
    #[serde(default = "default_floor")]
    pub min_revenue_floor: f64,
    /// Default reporting window length in days.
    #[serde(default = "default_window_days")]
    pub date_range_days: i64,
}

fn default_threshold() -> f64 {
    10.0
}

fn default_floor() -> f64 {
    25.0
}

fn default_window_days() -> i64 {
    7
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            threshold_pct: default_threshold(),
            min_revenue_floor: default_floor(),
            date_range_days: default_window_days(),
        }
    }
}

/// Columnar export destination. When `bucket` is set the remote store is
/// used; `--dry-run` or a missing bucket falls back to `local_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Whether partition export runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cloud project owning the bucket.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Destination bucket name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix inside the bucket.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Path to the service-account JSON key for the remote store.
    #[serde(default)]
    pub service_account_path: Option<String>,
    /// Local partition root for dry runs.
    #[serde(default = "default_local_root")]
    pub local_root: String,
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "network_data".to_string()
}

fn default_local_root() -> String {
    "./output".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_id: None,
            bucket: None,
            prefix: default_prefix(),
            service_account_path: None,
            local_root: default_local_root(),
        }
    }
}

/// Alert delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Webhook URL the serialized payload is POSTed to.
    #[serde(default)]
    pub webhook: Option<String>,
    /// Channel hint forwarded inside the payload.
    #[serde(default)]
    pub channel: Option<String>,
    /// Dashboard URL embedded in the payload context.
    #[serde(default)]
    pub dashboard_url: Option<String>,
}

/// Daemon scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Wall-clock run times, `HH:MM`.
    #[serde(default = "default_times")]
    pub times_of_day: Vec<String>,
    /// Timezone label; only `UTC` is supported and anything else is
    /// coerced with a warning.
    #[serde(default = "default_utc")]
    pub timezone: String,
}

fn default_times() -> Vec<String> {
    vec!["09:30".to_string(), "17:30".to_string()]
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            times_of_day: default_times(),
            timezone: default_utc(),
        }
    }
}

impl SchedulingConfig {
    /// Parse the configured times of day.
    ///
    /// # Errors
    /// Returns [`AdreconError::Config`] when an entry is not `HH:MM`.
    pub fn parsed_times(&self) -> Result<Vec<NaiveTime>, AdreconError> {
        self.times_of_day
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
                    AdreconError::config(format!("scheduling.times_of_day entry {raw:?} is not HH:MM"))
                })
            })
            .collect()
    }
}
