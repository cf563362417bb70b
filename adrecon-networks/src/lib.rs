//! adrecon-networks
//!
//! One adapter per upstream demand network. Every adapter implements
//! [`NetworkFetcher`](adrecon_core::NetworkFetcher), normalizes platforms
//! and ad formats exclusively through `adrecon-types`, and accumulates its
//! output through the shared breakdown builder. Wire semantics (auth mode,
//! request shape, scaling) are adapter-private.
#![warn(missing_docs)]

pub mod admob;
pub mod bidmachine;
pub mod chartboost;
pub mod dt_exchange;
pub mod inmobi;
pub mod ironsource;
pub mod liftoff;
pub mod meta;
pub mod mintegral;
pub mod moloco;
pub mod pangle;
pub mod unity;

mod factory;

pub use admob::AdmobFetcher;
pub use bidmachine::BidmachineFetcher;
pub use chartboost::ChartboostFetcher;
pub use dt_exchange::DtExchangeFetcher;
pub use factory::build_enabled_fetchers;
pub use inmobi::InmobiFetcher;
pub use ironsource::IronsourceFetcher;
pub use liftoff::LiftoffFetcher;
pub use meta::MetaFetcher;
pub use mintegral::MintegralFetcher;
pub use moloco::MolocoFetcher;
pub use pangle::PangleFetcher;
pub use unity::UnityFetcher;
