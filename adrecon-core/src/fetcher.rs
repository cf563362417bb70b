use async_trait::async_trait;
use chrono::NaiveDate;

use adrecon_types::{AdreconError, Network};

use crate::breakdown::RawBreakdown;

/// Contract implemented by every per-network adapter.
///
/// A fetcher either produces a complete [`RawBreakdown`] for the requested
/// inclusive window or fails with one of the taxonomy errors; partial data
/// is never returned. Implementations own their HTTP session and token
/// cache entry for the duration of a run.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// The network this adapter speaks for.
    fn network(&self) -> Network;

    /// Fetch and normalize the network's own report for `[start, end]`.
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawBreakdown, AdreconError>;
}
