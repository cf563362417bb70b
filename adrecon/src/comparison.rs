//! The system's atomic output unit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use adrecon_types::delta::{calculate_delta, calculate_ecpm};
use adrecon_types::{AdType, Network, Platform};

/// One reconciled (application, platform, network, ad type, day) cell:
/// the MAX baseline next to the network's own numbers with signed deltas.
///
/// Invariants:
/// - when `has_network_data` is false the three `network_*` fields are zero
///   and the three delta fields are `None` (a sentinel distinct from 0.0);
/// - `rev_delta_pct = (network_revenue - max_revenue) / max_revenue * 100`
///   when `max_revenue > 0`, else `None`;
/// - eCPM fields are `1000 * revenue / impressions`, zero without
///   impressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Report day (the MAX row's own day, never the lookup day).
    pub date: NaiveDate,
    /// Demand network under comparison.
    pub network: Network,
    /// Platform of the application listing.
    pub platform: Platform,
    /// Canonical ad format.
    pub ad_type: AdType,
    /// Application display name.
    pub application: String,
    /// MAX-reported revenue in USD.
    pub max_revenue: f64,
    /// MAX-reported impressions.
    pub max_impressions: i64,
    /// MAX-reported eCPM.
    pub max_ecpm: f64,
    /// Network-reported revenue; zero without network data.
    pub network_revenue: f64,
    /// Network-reported impressions; zero without network data.
    pub network_impressions: i64,
    /// Network-reported eCPM; zero without network data.
    pub network_ecpm: f64,
    /// Signed revenue delta percentage, `None` when incomparable.
    pub rev_delta_pct: Option<f64>,
    /// Signed impressions delta percentage, `None` when incomparable.
    pub imp_delta_pct: Option<f64>,
    /// Signed eCPM delta percentage, `None` when incomparable.
    pub ecpm_delta_pct: Option<f64>,
    /// Whether the network side had a matching cell.
    pub has_network_data: bool,
    /// Hour coverage diagnostic, for hourly-assembled sources only.
    pub hour_range: Option<String>,
    /// When this run fetched the data.
    pub fetched_at: DateTime<Utc>,
}

impl ComparisonRow {
    /// Build a row from both sides, computing deltas per the invariants.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn build(
        date: NaiveDate,
        network: Network,
        platform: Platform,
        ad_type: AdType,
        application: String,
        max_revenue: f64,
        max_impressions: i64,
        network_side: Option<(f64, i64)>,
        hour_range: Option<String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let max_ecpm = calculate_ecpm(max_revenue, max_impressions);
        match network_side {
            Some((network_revenue, network_impressions)) => {
                let network_ecpm = calculate_ecpm(network_revenue, network_impressions);
                Self {
                    date,
                    network,
                    platform,
                    ad_type,
                    application,
                    max_revenue,
                    max_impressions,
                    max_ecpm,
                    network_revenue,
                    network_impressions,
                    network_ecpm,
                    rev_delta_pct: calculate_delta(max_revenue, network_revenue),
                    imp_delta_pct: calculate_delta(max_impressions as f64, network_impressions as f64),
                    ecpm_delta_pct: calculate_delta(max_ecpm, network_ecpm),
                    has_network_data: true,
                    hour_range,
                    fetched_at,
                }
            }
            None => Self {
                date,
                network,
                platform,
                ad_type,
                application,
                max_revenue,
                max_impressions,
                max_ecpm,
                network_revenue: 0.0,
                network_impressions: 0,
                network_ecpm: 0.0,
                rev_delta_pct: None,
                imp_delta_pct: None,
                ecpm_delta_pct: None,
                has_network_data: false,
                hour_range,
                fetched_at,
            },
        }
    }

    /// Ordering key: (date, network, platform, ad type, application).
    #[must_use]
    pub fn sort_key(&self) -> (NaiveDate, Network, Platform, AdType, &str) {
        (
            self.date,
            self.network,
            self.platform,
            self.ad_type,
            self.application.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn missing_side_yields_null_sentinels() {
        let row = ComparisonRow::build(
            d("2026-01-08"),
            Network::Pangle,
            Platform::Ios,
            AdType::Interstitial,
            "MyApp (iOS)".into(),
            30.0,
            6000,
            None,
            None,
            Utc::now(),
        );
        assert!(!row.has_network_data);
        assert_eq!(row.network_revenue, 0.0);
        assert_eq!(row.network_impressions, 0);
        assert_eq!(row.network_ecpm, 0.0);
        assert_eq!(row.rev_delta_pct, None);
        assert_eq!(row.imp_delta_pct, None);
        assert_eq!(row.ecpm_delta_pct, None);
    }

    #[test]
    fn deltas_follow_the_formula() {
        let row = ComparisonRow::build(
            d("2026-01-08"),
            Network::Unity,
            Platform::Ios,
            AdType::Rewarded,
            "MyApp (iOS)".into(),
            50.0,
            10_000,
            Some((48.5, 9800)),
            None,
            Utc::now(),
        );
        assert!(row.has_network_data);
        assert!((row.rev_delta_pct.unwrap() - -3.0).abs() < 0.01);
        assert!((row.imp_delta_pct.unwrap() - -2.0).abs() < 0.01);
        assert!((row.ecpm_delta_pct.unwrap() - -1.02).abs() < 0.02);
        assert_eq!(row.max_ecpm, 5.0);
        assert_eq!(row.network_ecpm, 4.95);
    }

    #[test]
    fn zero_baseline_revenue_has_null_rev_delta() {
        let row = ComparisonRow::build(
            d("2026-01-08"),
            Network::Unity,
            Platform::Ios,
            AdType::Rewarded,
            "MyApp (iOS)".into(),
            0.0,
            1000,
            Some((1.0, 900)),
            None,
            Utc::now(),
        );
        assert_eq!(row.rev_delta_pct, None);
        assert!(row.imp_delta_pct.is_some());
    }
}
