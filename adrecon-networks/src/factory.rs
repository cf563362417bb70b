//! Config-driven fetcher construction.

use std::sync::Arc;

use tracing::{debug, info, warn};

use adrecon_core::{NetworkFetcher, TokenCache};
use adrecon_types::{AppConfig, Network};

use crate::{
    AdmobFetcher, BidmachineFetcher, ChartboostFetcher, DtExchangeFetcher, InmobiFetcher,
    IronsourceFetcher, LiftoffFetcher, MetaFetcher, MintegralFetcher, MolocoFetcher,
    PangleFetcher, UnityFetcher,
};

/// Build one fetcher per enabled, credential-complete network block.
///
/// A missing or disabled block is skipped silently; an enabled block with
/// blank required credentials is skipped with a warning so the operator
/// sees the misconfiguration without failing the run.
#[must_use]
pub fn build_enabled_fetchers(
    config: &AppConfig,
    tokens: &Arc<TokenCache>,
) -> Vec<Box<dyn NetworkFetcher>> {
    let mut fetchers: Vec<Box<dyn NetworkFetcher>> = Vec::new();
    let networks = &config.networks;

    let skip = |network: Network, missing: &str| {
        warn!(%network, missing, "network enabled but credentials incomplete, skipping");
    };

    if let Some(cfg) = &networks.mintegral {
        if !cfg.enabled {
            debug!("mintegral disabled");
        } else if cfg.skey.is_empty() || cfg.secret.is_empty() {
            skip(Network::Mintegral, "skey/secret");
        } else {
            fetchers.push(Box::new(MintegralFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.unity {
        if !cfg.enabled {
            debug!("unity disabled");
        } else if cfg.api_key.is_empty() || cfg.organization_id.is_empty() {
            skip(Network::Unity, "api_key/organization_id");
        } else {
            fetchers.push(Box::new(UnityFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.admob {
        if !cfg.enabled {
            debug!("admob disabled");
        } else if cfg.publisher_id.is_empty() || cfg.service_account_path.is_empty() {
            skip(Network::Admob, "publisher_id/service_account_path");
        } else {
            fetchers.push(Box::new(AdmobFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.ironsource {
        if !cfg.enabled {
            debug!("ironsource disabled");
        } else if cfg.username.is_empty() || cfg.secret_key.is_empty() {
            skip(Network::Ironsource, "username/secret_key");
        } else {
            fetchers.push(Box::new(IronsourceFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.meta {
        if !cfg.enabled {
            debug!("meta disabled");
        } else if cfg.access_token.is_empty() || cfg.business_id.is_empty() {
            skip(Network::Meta, "access_token/business_id");
        } else {
            fetchers.push(Box::new(MetaFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.moloco {
        if !cfg.enabled {
            debug!("moloco disabled");
        } else if cfg.email.is_empty() || cfg.password.is_empty() || cfg.publisher_id.is_empty() {
            skip(Network::Moloco, "email/password/publisher_id");
        } else {
            fetchers.push(Box::new(MolocoFetcher::new(cfg.clone(), Arc::clone(tokens))));
        }
    }

    if let Some(cfg) = &networks.inmobi {
        if !cfg.enabled {
            debug!("inmobi disabled");
        } else if cfg.account_id.is_empty() || cfg.secret_key.is_empty() {
            skip(Network::Inmobi, "account_id/secret_key");
        } else {
            fetchers.push(Box::new(InmobiFetcher::new(cfg.clone(), Arc::clone(tokens))));
        }
    }

    if let Some(cfg) = &networks.bidmachine {
        if !cfg.enabled {
            debug!("bidmachine disabled");
        } else if cfg.username.is_empty() || cfg.password.is_empty() {
            skip(Network::Bidmachine, "username/password");
        } else {
            fetchers.push(Box::new(BidmachineFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.liftoff {
        if !cfg.enabled {
            debug!("liftoff disabled");
        } else if cfg.api_key.is_empty() {
            skip(Network::Liftoff, "api_key");
        } else {
            fetchers.push(Box::new(LiftoffFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.dt_exchange {
        if !cfg.enabled {
            debug!("dt_exchange disabled");
        } else if cfg.client_id.is_empty() || cfg.client_secret.is_empty() {
            skip(Network::DtExchange, "client_id/client_secret");
        } else {
            fetchers.push(Box::new(DtExchangeFetcher::new(cfg.clone(), Arc::clone(tokens))));
        }
    }

    if let Some(cfg) = &networks.pangle {
        if !cfg.enabled {
            debug!("pangle disabled");
        } else if cfg.user_id.is_empty() || cfg.role_id.is_empty() || cfg.secure_key.is_empty() {
            skip(Network::Pangle, "user_id/role_id/secure_key");
        } else {
            fetchers.push(Box::new(PangleFetcher::new(cfg.clone())));
        }
    }

    if let Some(cfg) = &networks.chartboost {
        if !cfg.enabled {
            debug!("chartboost disabled");
        } else if cfg.client_id.is_empty() || cfg.client_secret.is_empty() {
            skip(Network::Chartboost, "client_id/client_secret");
        } else {
            fetchers.push(Box::new(ChartboostFetcher::new(cfg.clone(), Arc::clone(tokens))));
        }
    }

    info!(count = fetchers.len(), "network fetchers initialized");
    fetchers
}
