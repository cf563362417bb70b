//! adrecon-mock
//!
//! Deterministic [`NetworkFetcher`] implementations for tests and examples:
//! no network, no credentials, reproducible numbers.
#![warn(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use adrecon_core::{BreakdownBuilder, NetworkFetcher, RawBreakdown};
use adrecon_types::{AdType, AdreconError, Network, Platform};

/// One scripted cell of mock data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockRow {
    /// Day the row lands on; clamped into the requested window by the mock.
    pub date: NaiveDate,
    /// Platform of the cell.
    pub platform: Platform,
    /// Ad format of the cell.
    pub ad_type: AdType,
    /// Revenue in USD.
    pub revenue: f64,
    /// Impressions.
    pub impressions: i64,
}

/// Instruction for how a mock fetch behaves.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return the scripted rows that fall inside the requested window.
    Rows(Vec<MockRow>),
    /// Fail with the given error class and message.
    Fail(MockFailure),
    /// Sleep this long, then return no rows (deadline tests).
    Stall(Duration),
}

/// Failure classes a mock can produce.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Credential rejection.
    Auth(String),
    /// Exhausted rate limiting.
    RateLimit,
    /// Connectivity failure.
    Transport(String),
    /// Unmappable payload.
    ResponseShape(String),
}

/// A scripted network fetcher.
pub struct MockNetworkFetcher {
    network: Network,
    behavior: MockBehavior,
    daily: bool,
}

impl MockNetworkFetcher {
    /// A fetcher for `network` returning the given rows with a daily split.
    #[must_use]
    pub fn new(network: Network, rows: Vec<MockRow>) -> Self {
        Self {
            network,
            behavior: MockBehavior::Rows(rows),
            daily: true,
        }
    }

    /// A fetcher that only reports window totals, the way several real
    /// APIs do.
    #[must_use]
    pub fn without_daily_split(mut self) -> Self {
        self.daily = false;
        self
    }

    /// A fetcher that fails every fetch.
    #[must_use]
    pub fn failing(network: Network, failure: MockFailure) -> Self {
        Self {
            network,
            behavior: MockBehavior::Fail(failure),
            daily: true,
        }
    }

    /// A fetcher that stalls, for cancellation and deadline tests.
    #[must_use]
    pub fn stalling(network: Network, delay: Duration) -> Self {
        Self {
            network,
            behavior: MockBehavior::Stall(delay),
            daily: true,
        }
    }
}

#[async_trait]
impl NetworkFetcher for MockNetworkFetcher {
    fn network(&self) -> Network {
        self.network
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError> {
        match &self.behavior {
            MockBehavior::Rows(rows) => {
                let mut builder = BreakdownBuilder::new(self.network);
                for row in rows {
                    if row.date < start || row.date > end {
                        continue;
                    }
                    if self.daily {
                        builder.record_daily(
                            row.date,
                            row.platform,
                            row.ad_type,
                            row.revenue,
                            row.impressions,
                        );
                    } else {
                        builder.record(row.platform, row.ad_type, row.revenue, row.impressions);
                    }
                }
                Ok(builder.finish(start, end))
            }
            MockBehavior::Fail(failure) => Err(match failure {
                MockFailure::Auth(msg) => AdreconError::auth(self.network, msg.clone()),
                MockFailure::RateLimit => AdreconError::RateLimit {
                    network: self.network,
                },
                MockFailure::Transport(msg) => AdreconError::transport(self.network, msg.clone()),
                MockFailure::ResponseShape(msg) => {
                    AdreconError::response_shape(self.network, msg.clone())
                }
            }),
            MockBehavior::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(BreakdownBuilder::new(self.network).finish(start, end))
            }
        }
    }
}

/// Convenience: a single-cell fetcher, the common case in tests.
#[must_use]
pub fn single_cell(
    network: Network,
    date: NaiveDate,
    platform: Platform,
    ad_type: AdType,
    revenue: f64,
    impressions: i64,
) -> MockNetworkFetcher {
    MockNetworkFetcher::new(
        network,
        vec![MockRow {
            date,
            platform,
            ad_type,
            revenue,
            impressions,
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn rows_outside_the_window_are_dropped() {
        let fetcher = MockNetworkFetcher::new(
            Network::Unity,
            vec![
                MockRow {
                    date: d("2026-01-07"),
                    platform: Platform::Ios,
                    ad_type: AdType::Rewarded,
                    revenue: 10.0,
                    impressions: 1000,
                },
                MockRow {
                    date: d("2026-01-09"),
                    platform: Platform::Ios,
                    ad_type: AdType::Rewarded,
                    revenue: 99.0,
                    impressions: 9900,
                },
            ],
        );
        let out = fetcher.fetch(d("2026-01-07"), d("2026-01-08")).await.unwrap();
        assert_eq!(out.revenue, 10.0);
        assert_eq!(out.daily.len(), 1);
    }

    #[tokio::test]
    async fn failing_mock_maps_error_classes() {
        let fetcher = MockNetworkFetcher::failing(Network::Pangle, MockFailure::RateLimit);
        let err = fetcher.fetch(d("2026-01-08"), d("2026-01-08")).await.unwrap_err();
        assert_eq!(err.class(), "rate_limit");
    }
}
