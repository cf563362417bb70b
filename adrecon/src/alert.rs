//! Alert payload construction: floor and threshold filtering, per-network
//! ranking, coverage accounting.
//!
//! The payload is a plain serde structure and is deterministic for a given
//! row set: downstream notifiers render it, this module never formats
//! human text beyond display names.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use adrecon_types::config::{AlertingConfig, ValidationConfig};
use adrecon_types::delta::calculate_delta;
use adrecon_types::{AdType, Network, Platform};

use crate::comparison::ComparisonRow;
use crate::reconcile::RunSummary;

/// Overall verdict of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertHeader {
    /// Every checked network stayed inside the threshold.
    AllNormal,
    /// At least one network breached the threshold.
    ThresholdExceeded,
    /// The mediator fetch failed; no comparison happened.
    MediatorFailure,
}

/// Breach magnitude tiers on |revenue delta|.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Below 5%.
    Minor,
    /// 5% up to 15%.
    Major,
    /// 15% and beyond.
    Critical,
}

impl Severity {
    fn for_delta(delta_pct: f64) -> Self {
        let magnitude = delta_pct.abs();
        if magnitude < 5.0 {
            Self::Minor
        } else if magnitude < 15.0 {
            Self::Major
        } else {
            Self::Critical
        }
    }
}

/// One breaching placement row inside a network block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementBreach {
    /// Application display name.
    pub application: String,
    /// Platform of the placement.
    pub platform: Platform,
    /// Ad format of the placement.
    pub ad_type: AdType,
    /// MAX-side revenue.
    pub max_revenue: f64,
    /// Network-side revenue.
    pub network_revenue: f64,
    /// Signed revenue delta.
    pub rev_delta_pct: f64,
    /// Signed impressions delta, when comparable.
    pub imp_delta_pct: Option<f64>,
    /// Signed eCPM delta, when comparable.
    pub ecpm_delta_pct: Option<f64>,
    /// Magnitude tier.
    pub severity: Severity,
}

/// Per-network roll-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkBlock {
    /// Network key.
    pub network: Network,
    /// Display name for rendering.
    pub display_name: String,
    /// Icon tag for rendering.
    pub icon: String,
    /// Day the network's numbers are final for.
    pub last_available_date: Option<NaiveDate>,
    /// Total MAX revenue across the network's rows.
    pub total_max_revenue: f64,
    /// Total network-reported revenue across compared rows.
    pub total_network_revenue: f64,
    /// Aggregate revenue delta over compared rows.
    pub rev_delta_pct: Option<f64>,
    /// Aggregate impressions delta over compared rows.
    pub imp_delta_pct: Option<f64>,
    /// Whether any above-floor row breached the threshold.
    pub threshold_exceeded: bool,
    /// Placement table for breaching rows (empty for normal networks).
    pub breaches: Vec<PlacementBreach>,
}

/// One failed network in the `failed` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedNetwork {
    /// Network key.
    pub network: Network,
    /// Display name for rendering.
    pub display_name: String,
    /// Failure class (`auth`, `rate_limit`, ...).
    pub class: String,
    /// Failure message.
    pub message: String,
}

/// How much of the MAX baseline was actually compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageInfo {
    /// MAX revenue over every row.
    pub all_max_revenue: f64,
    /// MAX revenue over rows with network data.
    pub compared_max_revenue: f64,
    /// Baseline revenue with nothing to compare against.
    pub missing_revenue: f64,
    /// `compared / all * 100`, 100 when the baseline is empty.
    pub coverage_pct: f64,
    /// Networks with at least one uncompared row.
    pub networks_with_missing: Vec<String>,
}

/// Totals at the window's end date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    /// The end date.
    pub date: NaiveDate,
    /// MAX revenue on that day.
    pub total_max_revenue: f64,
    /// Network-reported revenue on that day.
    pub total_network_revenue: f64,
    /// Networks contributing compared data on that day.
    pub networks: Vec<String>,
}

/// Reporting window and run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertContext {
    /// First day of the window.
    pub start_date: NaiveDate,
    /// Last day of the window.
    pub end_date: NaiveDate,
    /// When the payload was generated.
    pub generated_at: DateTime<Utc>,
    /// Breach threshold in percent.
    pub threshold_pct: f64,
    /// Revenue floor under which rows are not checked.
    pub min_revenue_floor: f64,
    /// Total comparison rows.
    pub total_rows: usize,
    /// Rows with network data above the floor.
    pub checked_rows: usize,
    /// Rows excluded by the floor.
    pub low_revenue_rows: usize,
    /// Breaching rows.
    pub breached_rows: usize,
    /// Breaching networks.
    pub breached_networks: usize,
    /// Whether the window spans more than one day.
    pub multi_day: bool,
    /// Channel hint for the notifier.
    pub channel: Option<String>,
    /// Dashboard link for the notifier.
    pub dashboard_url: Option<String>,
    /// Export failure carried into the alert, when the write failed.
    pub export_warning: Option<String>,
}

/// The complete structured alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Overall verdict.
    pub header: AlertHeader,
    /// Window and run metadata.
    pub context: AlertContext,
    /// Coverage accounting; absent on mediator failure.
    pub coverage: Option<CoverageInfo>,
    /// Breaching networks, MAX revenue descending (name tie-break).
    pub exceeded: Vec<NetworkBlock>,
    /// Normal networks, same order.
    pub normal: Vec<NetworkBlock>,
    /// Failed networks.
    pub failed: Vec<FailedNetwork>,
    /// End-date totals; absent on mediator failure.
    pub daily_summary: Option<DailySummary>,
    /// Mediator error text, only for `MediatorFailure`.
    pub error: Option<String>,
}

/// Build the payload for a completed reconciliation.
#[must_use]
pub fn build_payload(
    rows: &[ComparisonRow],
    summary: &RunSummary,
    validation: &ValidationConfig,
    alerting: &AlertingConfig,
    generated_at: DateTime<Utc>,
    export_warning: Option<String>,
) -> AlertPayload {
    let threshold = validation.threshold_pct;
    let floor = validation.min_revenue_floor;

    // Group rows per network and aggregate; multi-day windows collapse
    // dates inside each placement key.
    let mut per_network: BTreeMap<Network, Vec<&ComparisonRow>> = BTreeMap::new();
    for row in rows {
        per_network.entry(row.network).or_default().push(row);
    }

    let multi_day = summary.start != summary.end;
    let mut low_revenue_rows = 0usize;
    let mut checked_rows = 0usize;
    let mut breached_rows = 0usize;
    let mut blocks = Vec::new();

    for (network, network_rows) in &per_network {
        let placements = aggregate_placements(network_rows, multi_day);

        let mut breaches = Vec::new();
        for placement in &placements {
            // The floor applies to every row; only the remainder with
            // network data is checked against the threshold.
            if placement.max_revenue < floor {
                low_revenue_rows += 1;
                continue;
            }
            if !placement.has_network_data {
                continue;
            }
            checked_rows += 1;
            let Some(delta) = placement.rev_delta_pct else {
                continue;
            };
            if delta.abs() > threshold {
                breached_rows += 1;
                breaches.push(PlacementBreach {
                    application: placement.application.clone(),
                    platform: placement.platform,
                    ad_type: placement.ad_type,
                    max_revenue: placement.max_revenue,
                    network_revenue: placement.network_revenue,
                    rev_delta_pct: delta,
                    imp_delta_pct: placement.imp_delta_pct,
                    ecpm_delta_pct: placement.ecpm_delta_pct,
                    severity: Severity::for_delta(delta),
                });
            }
        }
        breaches.sort_by(|a, b| {
            b.rev_delta_pct
                .abs()
                .partial_cmp(&a.rev_delta_pct.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total_max: f64 = network_rows.iter().map(|r| r.max_revenue).sum();
        let compared: Vec<&&ComparisonRow> = network_rows
            .iter()
            .filter(|r| r.has_network_data)
            .collect();
        let compared_max: f64 = compared.iter().map(|r| r.max_revenue).sum();
        let compared_net: f64 = compared.iter().map(|r| r.network_revenue).sum();
        let compared_max_imp: i64 = compared.iter().map(|r| r.max_impressions).sum();
        let compared_net_imp: i64 = compared.iter().map(|r| r.network_impressions).sum();

        blocks.push(NetworkBlock {
            network: *network,
            display_name: network.display_name().to_string(),
            icon: network.icon().to_string(),
            last_available_date: summary
                .networks
                .get(network)
                .and_then(|s| s.last_available_date),
            total_max_revenue: total_max,
            total_network_revenue: compared_net,
            rev_delta_pct: calculate_delta(compared_max, compared_net),
            imp_delta_pct: calculate_delta(compared_max_imp as f64, compared_net_imp as f64),
            threshold_exceeded: !breaches.is_empty(),
            breaches,
        });
    }

    // Descending MAX revenue, deterministic name tie-break.
    blocks.sort_by(|a, b| {
        b.total_max_revenue
            .partial_cmp(&a.total_max_revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    let (exceeded, normal): (Vec<_>, Vec<_>) =
        blocks.into_iter().partition(|b| b.threshold_exceeded);

    let failed: Vec<FailedNetwork> = summary
        .failed_networks()
        .into_iter()
        .map(|status| FailedNetwork {
            network: status.network,
            display_name: status.network.display_name().to_string(),
            class: status.error_class.clone().unwrap_or_default(),
            message: status.error.clone().unwrap_or_default(),
        })
        .collect();

    let all_max: f64 = rows.iter().map(|r| r.max_revenue).sum();
    let compared_max: f64 = rows
        .iter()
        .filter(|r| r.has_network_data)
        .map(|r| r.max_revenue)
        .sum();
    let mut missing_networks: Vec<String> = rows
        .iter()
        .filter(|r| !r.has_network_data)
        .map(|r| r.network.display_name().to_string())
        .collect();
    missing_networks.sort();
    missing_networks.dedup();

    let coverage = CoverageInfo {
        all_max_revenue: all_max,
        compared_max_revenue: compared_max,
        missing_revenue: all_max - compared_max,
        coverage_pct: if all_max > 0.0 {
            compared_max / all_max * 100.0
        } else {
            100.0
        },
        networks_with_missing: missing_networks,
    };

    let end_rows: Vec<&ComparisonRow> =
        rows.iter().filter(|r| r.date == summary.end).collect();
    let mut end_networks: Vec<String> = end_rows
        .iter()
        .filter(|r| r.has_network_data)
        .map(|r| r.network.display_name().to_string())
        .collect();
    end_networks.sort();
    end_networks.dedup();
    let daily_summary = DailySummary {
        date: summary.end,
        total_max_revenue: end_rows.iter().map(|r| r.max_revenue).sum(),
        total_network_revenue: end_rows
            .iter()
            .filter(|r| r.has_network_data)
            .map(|r| r.network_revenue)
            .sum(),
        networks: end_networks,
    };

    let header = if exceeded.is_empty() {
        AlertHeader::AllNormal
    } else {
        AlertHeader::ThresholdExceeded
    };
    info!(
        ?header,
        breached_rows,
        breached_networks = exceeded.len(),
        failed = failed.len(),
        "alert payload built"
    );

    AlertPayload {
        header,
        context: AlertContext {
            start_date: summary.start,
            end_date: summary.end,
            generated_at,
            threshold_pct: threshold,
            min_revenue_floor: floor,
            total_rows: rows.len(),
            checked_rows,
            low_revenue_rows,
            breached_rows,
            breached_networks: exceeded.len(),
            multi_day,
            channel: alerting.channel.clone(),
            dashboard_url: alerting.dashboard_url.clone(),
            export_warning,
        },
        coverage: Some(coverage),
        exceeded,
        normal,
        failed,
        daily_summary: Some(daily_summary),
        error: None,
    }
}

/// Build the error payload emitted when the mediator itself failed.
#[must_use]
pub fn build_error_payload(
    error: &str,
    start: NaiveDate,
    end: NaiveDate,
    validation: &ValidationConfig,
    alerting: &AlertingConfig,
    generated_at: DateTime<Utc>,
) -> AlertPayload {
    let truncated: String = error.chars().take(300).collect();
    AlertPayload {
        header: AlertHeader::MediatorFailure,
        context: AlertContext {
            start_date: start,
            end_date: end,
            generated_at,
            threshold_pct: validation.threshold_pct,
            min_revenue_floor: validation.min_revenue_floor,
            total_rows: 0,
            checked_rows: 0,
            low_revenue_rows: 0,
            breached_rows: 0,
            breached_networks: 0,
            multi_day: start != end,
            channel: alerting.channel.clone(),
            dashboard_url: alerting.dashboard_url.clone(),
            export_warning: None,
        },
        coverage: None,
        exceeded: Vec::new(),
        normal: Vec::new(),
        failed: Vec::new(),
        daily_summary: None,
        error: Some(truncated),
    }
}

struct Placement {
    application: String,
    platform: Platform,
    ad_type: AdType,
    max_revenue: f64,
    network_revenue: f64,
    max_impressions: i64,
    network_impressions: i64,
    has_network_data: bool,
    rev_delta_pct: Option<f64>,
    imp_delta_pct: Option<f64>,
    ecpm_delta_pct: Option<f64>,
}

/// Collapse a network's rows into placement-level entries. Single-day
/// windows pass rows through; multi-day windows sum each placement across
/// dates and recompute the deltas from the sums.
fn aggregate_placements(rows: &[&ComparisonRow], multi_day: bool) -> Vec<Placement> {
    if !multi_day {
        return rows
            .iter()
            .map(|r| Placement {
                application: r.application.clone(),
                platform: r.platform,
                ad_type: r.ad_type,
                max_revenue: r.max_revenue,
                network_revenue: r.network_revenue,
                max_impressions: r.max_impressions,
                network_impressions: r.network_impressions,
                has_network_data: r.has_network_data,
                rev_delta_pct: r.rev_delta_pct,
                imp_delta_pct: r.imp_delta_pct,
                ecpm_delta_pct: r.ecpm_delta_pct,
            })
            .collect();
    }

    let mut keyed: BTreeMap<(String, Platform, AdType), Placement> = BTreeMap::new();
    for row in rows {
        let entry = keyed
            .entry((row.application.clone(), row.platform, row.ad_type))
            .or_insert_with(|| Placement {
                application: row.application.clone(),
                platform: row.platform,
                ad_type: row.ad_type,
                max_revenue: 0.0,
                network_revenue: 0.0,
                max_impressions: 0,
                network_impressions: 0,
                has_network_data: false,
                rev_delta_pct: None,
                imp_delta_pct: None,
                ecpm_delta_pct: None,
            });
        entry.max_revenue += row.max_revenue;
        entry.max_impressions += row.max_impressions;
        if row.has_network_data {
            entry.has_network_data = true;
            entry.network_revenue += row.network_revenue;
            entry.network_impressions += row.network_impressions;
        }
    }

    let mut placements: Vec<Placement> = keyed.into_values().collect();
    for p in &mut placements {
        if p.has_network_data {
            p.rev_delta_pct = calculate_delta(p.max_revenue, p.network_revenue);
            p.imp_delta_pct =
                calculate_delta(p.max_impressions as f64, p.network_impressions as f64);
            let max_ecpm = adrecon_types::delta::calculate_ecpm(p.max_revenue, p.max_impressions);
            let net_ecpm =
                adrecon_types::delta::calculate_ecpm(p.network_revenue, p.network_impressions);
            p.ecpm_delta_pct = calculate_delta(max_ecpm, net_ecpm);
        }
    }
    placements
}

/// Thin webhook sink posting the serialized payload.
pub struct AlertSink {
    client: adrecon_core::HttpClient,
    webhook: String,
}

impl AlertSink {
    /// A sink for the configured webhook, when one is set.
    #[must_use]
    pub fn from_config(config: &AlertingConfig) -> Option<Self> {
        config.webhook.as_ref().map(|webhook| Self {
            client: adrecon_core::HttpClient::new(),
            webhook: webhook.clone(),
        })
    }

    /// POST the payload as JSON.
    ///
    /// # Errors
    /// `Transport`-class error when delivery fails after retries.
    pub async fn deliver(&self, payload: &AlertPayload) -> Result<(), adrecon_types::AdreconError> {
        self.client
            .send(self.client.post(&self.webhook).json(payload))
            .await
            .map_err(|e| {
                adrecon_types::AdreconError::transport_unattributed(format!(
                    "alert delivery: {e}"
                ))
            })?;
        info!("alert delivered");
        Ok(())
    }
}
