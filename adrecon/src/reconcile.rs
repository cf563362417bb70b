//! The reconciliation engine: joins the mediator baseline with every
//! network's own breakdown.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use adrecon_core::RawBreakdown;
use adrecon_max::MediatorBreakdown;
use adrecon_types::{AdreconError, Network};

use crate::comparison::ComparisonRow;

/// Observable run phases. A run walks forward through these; `Failed` is
/// reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run is configured but nothing has been fetched.
    Planned,
    /// Mediator and network fetches are in flight.
    Fetching,
    /// Joining the two sides.
    Reconciling,
    /// Writing partitions.
    Exporting,
    /// Building and delivering the alert payload.
    Alerting,
    /// Finished cleanly (discrepancies included).
    Done,
    /// Terminated by a fatal failure.
    Failed,
}

/// Per-network outcome of the fetch phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Network this status describes.
    pub network: Network,
    /// Whether the fetch produced a breakdown.
    pub ok: bool,
    /// Failure class when it did not (`auth`, `rate_limit`, ...).
    pub error_class: Option<String>,
    /// Failure message when it did not.
    pub error: Option<String>,
    /// The day this network's numbers are considered final for.
    pub last_available_date: Option<NaiveDate>,
}

/// Everything observable about one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Current phase.
    pub state: RunState,
    /// Phase transition log.
    pub transitions: Vec<(RunState, DateTime<Utc>)>,
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window.
    pub end: NaiveDate,
    /// Per-network fetch outcomes.
    pub networks: BTreeMap<Network, NetworkStatus>,
    /// Comparison rows emitted.
    pub row_count: usize,
    /// Mediator rows dropped for unresolvable network labels.
    pub unresolved_rows: usize,
    /// Fatal error text when `state == Failed`.
    pub failure: Option<String>,
}

impl RunSummary {
    /// Start a summary in the `Planned` state.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            state: RunState::Planned,
            transitions: vec![(RunState::Planned, Utc::now())],
            start,
            end,
            networks: BTreeMap::new(),
            row_count: 0,
            unresolved_rows: 0,
            failure: None,
        }
    }

    /// Advance to a new phase, recording the transition.
    pub fn transition(&mut self, state: RunState) {
        debug!(from = ?self.state, to = ?state, "run state transition");
        self.state = state;
        self.transitions.push((state, Utc::now()));
    }

    /// Mark the run failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
        self.transition(RunState::Failed);
    }

    /// Networks whose fetch failed.
    #[must_use]
    pub fn failed_networks(&self) -> Vec<&NetworkStatus> {
        self.networks.values().filter(|s| !s.ok).collect()
    }
}

/// The day a network's numbers are considered final for: the latest day
/// with non-zero impressions in its daily split, capped at
/// `end - reporting_delay`; without a daily split, the cap itself.
#[must_use]
pub fn last_available_date(network: Network, breakdown: &RawBreakdown, end: NaiveDate) -> NaiveDate {
    let cap = end
        .checked_sub_days(Days::new(network.reporting_delay_days().max(0) as u64))
        .unwrap_or(end);
    match breakdown.latest_active_date() {
        Some(active) => active.min(cap),
        None => cap,
    }
}

/// Join the mediator's comparison rows against every fetched network
/// breakdown and emit the run's [`ComparisonRow`] set in deterministic
/// (date, network, platform, ad type, application) order.
///
/// Per-network failures never fail the join: their rows come out with
/// `has_network_data = false` and the failure lands in the summary.
pub fn reconcile(
    mediator: &MediatorBreakdown,
    network_results: &BTreeMap<Network, Result<RawBreakdown, AdreconError>>,
    start: NaiveDate,
    end: NaiveDate,
    fetched_at: DateTime<Utc>,
    summary: &mut RunSummary,
) -> Vec<ComparisonRow> {
    summary.unresolved_rows = mediator.unresolved_networks;

    for (network, result) in network_results {
        let status = match result {
            Ok(breakdown) => NetworkStatus {
                network: *network,
                ok: true,
                error_class: None,
                error: None,
                last_available_date: Some(last_available_date(*network, breakdown, end)),
            },
            Err(e) => {
                warn!(%network, error = %e, "network fetch failed, rows degrade to baseline-only");
                NetworkStatus {
                    network: *network,
                    ok: false,
                    error_class: Some(e.class().to_string()),
                    error: Some(e.to_string()),
                    last_available_date: None,
                }
            }
        };
        summary.networks.insert(*network, status);
    }

    // Defensive duplicate merge: the mediator already keys its rows, but a
    // duplicate from any source is a warning, not a failure.
    let mut merged: BTreeMap<_, (f64, i64)> = BTreeMap::new();
    for row in &mediator.comparison_rows {
        if row.date < start || row.date > end {
            continue;
        }
        let key = (
            row.date,
            row.network,
            row.platform,
            row.ad_type,
            row.application.clone(),
        );
        let entry = merged.entry(key).or_insert((0.0, 0));
        if entry.1 > 0 || entry.0 > 0.0 {
            warn!(
                network = %row.network,
                application = %row.application,
                "duplicate mediator key, summing"
            );
        }
        entry.0 += row.revenue;
        entry.1 += row.impressions;
    }

    let mut rows = Vec::with_capacity(merged.len());
    for ((date, network, platform, ad_type, application), (max_revenue, max_impressions)) in merged
    {
        let status = summary.networks.get(&network);
        let breakdown = network_results.get(&network).and_then(|r| r.as_ref().ok());

        let network_side = breakdown.and_then(|b| {
            // The freshest mediator day is compared at the network's own
            // final day; older rows look up their own day.
            let lookup_date = match status.and_then(|s| s.last_available_date) {
                Some(last) if date == end => last,
                _ => date,
            };
            let cell = b.lookup(platform, ad_type, lookup_date);
            if cell.impressions > 0 {
                return Some(((cell.revenue, cell.impressions), lookup_date));
            }
            // Previous-day substitution for networks with known gaps.
            if network.supports_fallback() && !b.daily.is_empty() {
                let previous = lookup_date.checked_sub_days(Days::new(1))?;
                let fallback = b.lookup(platform, ad_type, previous);
                if fallback.impressions > 0 {
                    debug!(%network, %previous, "using previous-day fallback cell");
                    return Some(((fallback.revenue, fallback.impressions), previous));
                }
            }
            None
        });

        let hour_range = breakdown.and_then(|b| b.hour_range.clone());
        rows.push(ComparisonRow::build(
            date,
            network,
            platform,
            ad_type,
            application,
            max_revenue,
            max_impressions,
            network_side.map(|(cell, _)| cell),
            hour_range,
            fetched_at,
        ));
    }

    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    summary.row_count = rows.len();
    info!(
        rows = rows.len(),
        unresolved = summary.unresolved_rows,
        failed_networks = summary.failed_networks().len(),
        "reconciliation complete"
    );
    rows
}
