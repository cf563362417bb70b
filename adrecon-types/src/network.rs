use serde::{Deserialize, Serialize};

/// A mediation demand partner.
///
/// The enumeration is closed: every network the mediator can report appears
/// here, and [`Network::from_api_name`] is the single authority for mapping
/// observed API spellings onto it. Per-network reporting characteristics
/// (delay, fallback tolerance) live on the enum so fetchers and the
/// reconciler agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Mintegral bidding.
    Mintegral,
    /// Unity Ads bidding.
    Unity,
    /// Google AdMob bidding.
    Admob,
    /// ironSource bidding.
    Ironsource,
    /// Meta Audience Network bidding.
    Meta,
    /// Moloco SDK bidding.
    Moloco,
    /// InMobi bidding.
    Inmobi,
    /// BidMachine bidding.
    Bidmachine,
    /// Liftoff Monetize (formerly Vungle) bidding.
    Liftoff,
    /// DT Exchange (formerly Fyber) bidding.
    DtExchange,
    /// AppLovin's own bidding demand inside MAX.
    Applovin,
    /// AppLovin Exchange (ALX).
    ApplovinExchange,
    /// Chartboost bidding.
    Chartboost,
    /// Pangle (TikTok / ByteDance) bidding.
    Pangle,
}

impl Network {
    /// Every network, in canonical order.
    pub const ALL: [Self; 14] = [
        Self::Mintegral,
        Self::Unity,
        Self::Admob,
        Self::Ironsource,
        Self::Meta,
        Self::Moloco,
        Self::Inmobi,
        Self::Bidmachine,
        Self::Liftoff,
        Self::DtExchange,
        Self::Applovin,
        Self::ApplovinExchange,
        Self::Chartboost,
        Self::Pangle,
    ];

    /// Stable snake_case key used for config blocks, token files and
    /// partition columns.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Mintegral => "mintegral",
            Self::Unity => "unity",
            Self::Admob => "admob",
            Self::Ironsource => "ironsource",
            Self::Meta => "meta",
            Self::Moloco => "moloco",
            Self::Inmobi => "inmobi",
            Self::Bidmachine => "bidmachine",
            Self::Liftoff => "liftoff",
            Self::DtExchange => "dt_exchange",
            Self::Applovin => "applovin",
            Self::ApplovinExchange => "applovin_exchange",
            Self::Chartboost => "chartboost",
            Self::Pangle => "pangle",
        }
    }

    /// Human-readable name used in report output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Mintegral => "Mintegral Bidding",
            Self::Unity => "Unity Bidding",
            Self::Admob => "Google Bidding",
            Self::Ironsource => "Ironsource Bidding",
            Self::Meta => "Meta Bidding",
            Self::Moloco => "Moloco Bidding",
            Self::Inmobi => "Inmobi Bidding",
            Self::Bidmachine => "Bidmachine Bidding",
            Self::Liftoff => "Liftoff Bidding",
            Self::DtExchange => "DT Exchange Bidding",
            Self::Applovin => "Applovin Bidding",
            Self::ApplovinExchange => "Applovin Exchange",
            Self::Chartboost => "Chartboost Bidding",
            Self::Pangle => "Pangle Bidding",
        }
    }

    /// Icon tag attached to alert blocks for this network.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Mintegral => ":mintegral:",
            Self::Unity => ":unity:",
            Self::Admob => ":google:",
            Self::Ironsource => ":ironsource:",
            Self::Meta => ":meta:",
            Self::Moloco => ":moloco:",
            Self::Inmobi => ":inmobi:",
            Self::Bidmachine => ":bidmachine:",
            Self::Liftoff => ":liftoff:",
            Self::DtExchange => ":dt_exchange:",
            Self::Applovin | Self::ApplovinExchange => ":applovin:",
            Self::Chartboost => ":chartboost:",
            Self::Pangle => ":pangle:",
        }
    }

    /// Typical reporting delay of the network's own API, in days.
    ///
    /// Meta finalizes data roughly 48h behind; Pangle similarly lags. The
    /// rest are reliable at T-1.
    #[must_use]
    pub const fn reporting_delay_days(self) -> i64 {
        match self {
            Self::Meta | Self::Pangle => 2,
            _ => 1,
        }
    }

    /// Whether substituting the previous day's data is acceptable when the
    /// fetch for the target day comes back empty. Set for networks with a
    /// history of intermittent API gaps.
    #[must_use]
    pub const fn supports_fallback(self) -> bool {
        matches!(self, Self::Bidmachine | Self::Liftoff | Self::Meta)
    }

    /// Resolve an observed API network label to a `Network`.
    ///
    /// Covers the UPPER_SNAKE constants of the raw reporting endpoints, the
    /// title-cased forms the MAX dashboard emits (with and without the
    /// `Bidding`/`Network`/`Exchange` suffixes) and legacy vendor aliases
    /// (Facebook, Vungle, Fyber, TikTok/Bytedance, Google/AdMob). Unknown
    /// labels return `None`; callers drop and count such rows rather than
    /// guessing.
    #[must_use]
    pub fn from_api_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        // ALX must win before suffix stripping turns "AppLovin Exchange"
        // into plain AppLovin.
        match trimmed {
            "ALX" | "APPLOVIN_EXCHANGE" | "AppLovin Exchange" | "Applovin Exchange"
            | "applovin_exchange" => return Some(Self::ApplovinExchange),
            _ => {}
        }

        let mut base = trimmed.to_ascii_lowercase().replace('-', "_");
        for suffix in ["_bidding", " bidding", "_network", " network", "_ads", " ads"] {
            if let Some(stripped) = base.strip_suffix(suffix) {
                base = stripped.to_string();
                break;
            }
        }
        let base = base.replace(' ', "_");

        match base.as_str() {
            "mintegral" => Some(Self::Mintegral),
            "unity" => Some(Self::Unity),
            "admob" | "google" | "google_admob" => Some(Self::Admob),
            "ironsource" | "iron_source" => Some(Self::Ironsource),
            "meta" | "facebook" | "meta_audience" | "meta_audience_network" => Some(Self::Meta),
            "moloco" => Some(Self::Moloco),
            "inmobi" => Some(Self::Inmobi),
            "bidmachine" => Some(Self::Bidmachine),
            "liftoff" | "liftoff_monetize" | "vungle" => Some(Self::Liftoff),
            "dt_exchange" | "dt" | "fyber" | "digital_turbine" => Some(Self::DtExchange),
            "applovin" => Some(Self::Applovin),
            "applovin_exchange" | "alx" => Some(Self::ApplovinExchange),
            "chartboost" => Some(Self::Chartboost),
            "pangle" | "tiktok" | "bytedance" => Some(Self::Pangle),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_api_name(s).ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

/// Error returned when a network label cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network label: {0}")]
pub struct UnknownNetwork(pub String);
