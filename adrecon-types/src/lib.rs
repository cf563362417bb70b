//! adrecon-types
//!
//! Canonical schema for the adrecon mediation-reconciliation workspace.
//!
//! - `platform`, `ad_type`, `network`: the closed enumerations every ingress
//!   and egress passes through, with their normalization tables.
//! - `delta`: the delta-percentage grammar and shared metric arithmetic.
//! - `config`: serde structs for the operator configuration file.
//! - `error`: the workspace error taxonomy.
#![warn(missing_docs)]

mod ad_type;
pub mod config;
pub mod delta;
mod error;
mod network;
mod platform;

pub use ad_type::AdType;
pub use config::AppConfig;
pub use error::AdreconError;
pub use network::{Network, UnknownNetwork};
pub use platform::Platform;
