use thiserror::Error;

use crate::Network;

/// Unified error type for the adrecon workspace.
///
/// Variants follow the run-level failure taxonomy: configuration and
/// mediator failures are fatal for a run, per-network failures degrade the
/// run and surface in the alert payload instead.
#[derive(Debug, Error)]
pub enum AdreconError {
    /// Malformed or incomplete configuration. Fatal; maps to exit code 2.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credentials or a token were rejected after one refresh attempt.
    #[error("{network} authentication failed: {msg}")]
    Auth {
        /// Network whose credentials failed.
        network: Network,
        /// Provider-reported reason.
        msg: String,
    },

    /// The network kept rate-limiting after retries were exhausted.
    #[error("{network} rate limited after retries")]
    RateLimit {
        /// Network that kept returning 429.
        network: Network,
    },

    /// Connectivity, timeout or persistent 5xx failure.
    #[error("transport failure: {msg}")]
    Transport {
        /// Network the request targeted, when attributable.
        network: Option<Network>,
        /// Underlying transport error text.
        msg: String,
    },

    /// The response arrived but could not be mapped onto the canonical
    /// breakdown schema.
    #[error("{network} returned an unmappable payload: {msg}")]
    ResponseShape {
        /// Network whose payload was unmappable.
        network: Network,
        /// What failed to parse.
        msg: String,
    },

    /// Partition write failed. Fatal for the export step only; the alert
    /// still goes out carrying a warning.
    #[error("export failed: {0}")]
    Export(String),

    /// Any failure while fetching the mediator baseline. Fatal for the run.
    #[error("mediator failure: {0}")]
    Mediator(String),

    /// Filesystem error from the token cache or local store.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdreconError {
    /// Helper: build a `Config` error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Helper: build an `Auth` error for a network.
    pub fn auth(network: Network, msg: impl Into<String>) -> Self {
        Self::Auth {
            network,
            msg: msg.into(),
        }
    }

    /// Helper: build a `Transport` error attributed to a network.
    pub fn transport(network: Network, msg: impl Into<String>) -> Self {
        Self::Transport {
            network: Some(network),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Transport` error with no network attribution.
    pub fn transport_unattributed(msg: impl Into<String>) -> Self {
        Self::Transport {
            network: None,
            msg: msg.into(),
        }
    }

    /// Helper: build a `ResponseShape` error for a network.
    pub fn response_shape(network: Network, msg: impl Into<String>) -> Self {
        Self::ResponseShape {
            network,
            msg: msg.into(),
        }
    }

    /// Helper: build a `Mediator` error.
    pub fn mediator(msg: impl Into<String>) -> Self {
        Self::Mediator(msg.into())
    }

    /// Whether this failure terminates the run (as opposed to marking one
    /// network failed and continuing).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Mediator(_))
    }

    /// Process exit code for a run that terminated with this error:
    /// configuration errors exit 2, everything else fatal exits 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }

    /// Short class label used in run summaries and the alert `failed` group.
    #[must_use]
    pub const fn class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth { .. } => "auth",
            Self::RateLimit { .. } => "rate_limit",
            Self::Transport { .. } => "transport",
            Self::ResponseShape { .. } => "response_shape",
            Self::Export(_) => "export",
            Self::Mediator(_) => "mediator",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_split() {
        assert!(AdreconError::config("x").is_fatal());
        assert!(AdreconError::mediator("x").is_fatal());
        assert!(!AdreconError::auth(Network::Moloco, "bad password").is_fatal());
        assert!(
            !AdreconError::RateLimit {
                network: Network::Pangle
            }
            .is_fatal()
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(AdreconError::config("x").exit_code(), 2);
        assert_eq!(AdreconError::mediator("x").exit_code(), 1);
    }

    #[test]
    fn display_carries_network() {
        let err = AdreconError::auth(Network::DtExchange, "invalid client credentials");
        assert_eq!(
            err.to_string(),
            "dt_exchange authentication failed: invalid client credentials"
        );
    }
}
