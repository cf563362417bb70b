//! adrecon-core
//!
//! Shared plumbing for the adrecon fetcher ecosystem.
//!
//! - `breakdown`: the canonical per-network result shape and its
//!   accumulation builder.
//! - `fetcher`: the `NetworkFetcher` contract every adapter implements.
//! - `gauth`: service-account token exchange for Google-backed endpoints.
//! - `http`: the retrying HTTP transport all adapters funnel through.
//! - `token`: the persistent per-network token cache.
#![warn(missing_docs)]

pub mod breakdown;
pub mod fetcher;
pub mod gauth;
pub mod http;
pub mod token;

pub use breakdown::{BreakdownBuilder, DateRange, Metrics, RawBreakdown};
pub use fetcher::NetworkFetcher;
pub use gauth::{ServiceAccountAuth, ServiceAccountKey};
pub use http::{HttpClient, HttpError, PollConfig, RetryPolicy};
pub use token::{TokenCache, TokenRecord};
