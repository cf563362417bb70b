//! Canonical breakdown structures and the accumulation builder shared by all
//! fetchers.
//!
//! A fetcher never assembles totals by hand: it feeds rows into a
//! [`BreakdownBuilder`] and the builder keeps the three aggregation levels
//! (overall, per platform, per platform x ad type) coherent by construction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use adrecon_types::delta::{calculate_ecpm, round2};
use adrecon_types::{AdType, Network, Platform};

/// Revenue / impressions / eCPM triple for one aggregation cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Revenue in USD.
    pub revenue: f64,
    /// Impression count.
    pub impressions: i64,
    /// Effective cost per mille; derived, never accumulated.
    pub ecpm: f64,
}

impl Metrics {
    /// Add a row into this cell. eCPM stays stale until finalization.
    pub fn add(&mut self, revenue: f64, impressions: i64) {
        self.revenue += revenue;
        self.impressions += impressions;
    }

    fn finalize(&mut self) {
        self.ecpm = calculate_ecpm(self.revenue, self.impressions);
        self.revenue = round2(self.revenue);
    }
}

/// Per-ad-type cells for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdTypeTotals {
    /// Banner-family total.
    pub banner: Metrics,
    /// Interstitial-family total.
    pub interstitial: Metrics,
    /// Rewarded-family total.
    pub rewarded: Metrics,
}

impl AdTypeTotals {
    /// Cell for an ad type.
    #[must_use]
    pub const fn get(&self, ad_type: AdType) -> &Metrics {
        match ad_type {
            AdType::Banner => &self.banner,
            AdType::Interstitial => &self.interstitial,
            AdType::Rewarded => &self.rewarded,
        }
    }

    /// Mutable cell for an ad type.
    pub fn get_mut(&mut self, ad_type: AdType) -> &mut Metrics {
        match ad_type {
            AdType::Banner => &mut self.banner,
            AdType::Interstitial => &mut self.interstitial,
            AdType::Rewarded => &mut self.rewarded,
        }
    }

    /// Iterate cells in canonical ad-type order.
    pub fn iter(&self) -> impl Iterator<Item = (AdType, &Metrics)> {
        AdType::ALL.iter().map(|t| (*t, self.get(*t)))
    }

    fn finalize(&mut self) {
        for ad_type in AdType::ALL {
            self.get_mut(ad_type).finalize();
        }
    }
}

/// Totals for one platform, including its ad-type split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetrics {
    /// Platform-level revenue in USD.
    pub revenue: f64,
    /// Platform-level impression count.
    pub impressions: i64,
    /// Platform-level eCPM; derived.
    pub ecpm: f64,
    /// Ad-type split within the platform.
    pub ad_totals: AdTypeTotals,
}

impl PlatformMetrics {
    fn finalize(&mut self) {
        self.ad_totals.finalize();
        self.ecpm = calculate_ecpm(self.revenue, self.impressions);
        self.revenue = round2(self.revenue);
    }
}

/// Both platform scopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformTotals {
    /// Android scope.
    pub android: PlatformMetrics,
    /// iOS scope.
    pub ios: PlatformMetrics,
}

impl PlatformTotals {
    /// Scope for a platform.
    #[must_use]
    pub const fn get(&self, platform: Platform) -> &PlatformMetrics {
        match platform {
            Platform::Android => &self.android,
            Platform::Ios => &self.ios,
        }
    }

    /// Mutable scope for a platform.
    pub fn get_mut(&mut self, platform: Platform) -> &mut PlatformMetrics {
        match platform {
            Platform::Android => &mut self.android,
            Platform::Ios => &mut self.ios,
        }
    }

    /// Iterate scopes in canonical platform order.
    pub fn iter(&self) -> impl Iterator<Item = (Platform, &PlatformMetrics)> {
        Platform::ALL.iter().map(|p| (*p, self.get(*p)))
    }
}

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

/// A network's own view of the reporting window, normalized onto the
/// canonical schema.
///
/// Invariants (held by [`BreakdownBuilder`]):
/// - overall totals equal the sum of platform totals;
/// - each platform total equals the sum of its ad-type cells (within cent
///   rounding);
/// - eCPM at every level is derived from that level's accumulated revenue
///   and impressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBreakdown {
    /// Network this breakdown came from.
    pub network: Network,
    /// Overall revenue in USD.
    pub revenue: f64,
    /// Overall impression count.
    pub impressions: i64,
    /// Overall eCPM.
    pub ecpm: f64,
    /// Ad-type split across both platforms.
    pub ad_totals: AdTypeTotals,
    /// Per-platform split.
    pub platforms: PlatformTotals,
    /// Window the data covers.
    pub date_range: DateRange,
    /// Day-level split, when the network reports one. Empty when the API
    /// only returns window totals.
    pub daily: BTreeMap<NaiveDate, PlatformTotals>,
    /// Hour coverage diagnostic for sources assembled from hourly slices,
    /// e.g. `"00:00-23:00 UTC (24/24)"`.
    pub hour_range: Option<String>,
}

impl RawBreakdown {
    /// Latest day with non-zero impressions in the daily split, if any.
    #[must_use]
    pub fn latest_active_date(&self) -> Option<NaiveDate> {
        self.daily
            .iter()
            .rev()
            .find(|(_, platforms)| {
                platforms.android.impressions > 0 || platforms.ios.impressions > 0
            })
            .map(|(date, _)| *date)
    }

    /// Cell for a (platform, ad type) pair on a specific day, falling back
    /// to the window-level cell when no daily split exists.
    #[must_use]
    pub fn lookup(&self, platform: Platform, ad_type: AdType, date: NaiveDate) -> Metrics {
        if self.daily.is_empty() {
            return *self.platforms.get(platform).ad_totals.get(ad_type);
        }
        self.daily
            .get(&date)
            .map(|platforms| *platforms.get(platform).ad_totals.get(ad_type))
            .unwrap_or_default()
    }
}

/// Accumulator producing a [`RawBreakdown`].
#[derive(Debug, Clone)]
pub struct BreakdownBuilder {
    network: Network,
    revenue: f64,
    impressions: i64,
    ad_totals: AdTypeTotals,
    platforms: PlatformTotals,
    daily: BTreeMap<NaiveDate, PlatformTotals>,
    hour_range: Option<String>,
}

impl BreakdownBuilder {
    /// Start an empty breakdown for a network.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self {
            network,
            revenue: 0.0,
            impressions: 0,
            ad_totals: AdTypeTotals::default(),
            platforms: PlatformTotals::default(),
            daily: BTreeMap::new(),
            hour_range: None,
        }
    }

    /// Attach the hour-coverage diagnostic for hourly-assembled sources.
    pub fn set_hour_range(&mut self, hour_range: impl Into<String>) {
        self.hour_range = Some(hour_range.into());
    }

    /// Accumulate one row into the overall, ad-type, platform and
    /// platform x ad-type cells.
    pub fn record(&mut self, platform: Platform, ad_type: AdType, revenue: f64, impressions: i64) {
        self.revenue += revenue;
        self.impressions += impressions;
        self.ad_totals.get_mut(ad_type).add(revenue, impressions);
        let scope = self.platforms.get_mut(platform);
        scope.revenue += revenue;
        scope.impressions += impressions;
        scope.ad_totals.get_mut(ad_type).add(revenue, impressions);
    }

    /// Accumulate one dated row: feeds the window totals via
    /// [`record`](Self::record) and the daily split.
    pub fn record_daily(
        &mut self,
        date: NaiveDate,
        platform: Platform,
        ad_type: AdType,
        revenue: f64,
        impressions: i64,
    ) {
        self.record(platform, ad_type, revenue, impressions);
        let day = self.daily.entry(date).or_default();
        let scope = day.get_mut(platform);
        scope.revenue += revenue;
        scope.impressions += impressions;
        scope.ad_totals.get_mut(ad_type).add(revenue, impressions);
    }

    /// Whether anything has been recorded yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.impressions == 0 && self.revenue == 0.0
    }

    /// Compute eCPM at every level, round revenue to cents, and emit the
    /// finished breakdown for the window.
    #[must_use]
    pub fn finish(mut self, start: NaiveDate, end: NaiveDate) -> RawBreakdown {
        self.ad_totals.finalize();
        for platform in Platform::ALL {
            self.platforms.get_mut(platform).finalize();
        }
        for day in self.daily.values_mut() {
            for platform in Platform::ALL {
                day.get_mut(platform).finalize();
            }
        }
        RawBreakdown {
            network: self.network,
            ecpm: calculate_ecpm(self.revenue, self.impressions),
            revenue: round2(self.revenue),
            impressions: self.impressions,
            ad_totals: self.ad_totals,
            platforms: self.platforms,
            date_range: DateRange { start, end },
            daily: self.daily,
            hour_range: self.hour_range,
        }
    }
}
