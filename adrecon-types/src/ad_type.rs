use serde::{Deserialize, Serialize};

/// Canonical ad format after normalization.
///
/// The mediation comparison only distinguishes three formats; every vendor
/// label (native, mrec, app-open, skippable video, ...) folds into one of
/// them through [`AdType::from_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdType {
    /// Small-footprint formats: banner, native, mrec, adaptive banner.
    Banner,
    /// Full-screen non-rewarded formats, including app-open.
    Interstitial,
    /// Opt-in rewarded formats.
    Rewarded,
}

const BANNER_LABELS: &[&str] = &[
    "banner",
    "sdk_banner",
    "native",
    "native_banner",
    "medium_rectangle",
    "mrec",
    "adaptive_banner",
    "leaderboard",
    "large_banner",
    "smart_banner",
];

const INTERSTITIAL_LABELS: &[&str] = &[
    "interstitial",
    "interstitial_video",
    "fullscreen",
    "non_skippable_interstitial",
    "app_open",
    "appopen",
    "static_interstitial",
    "video_interstitial",
];

const REWARDED_LABELS: &[&str] = &[
    "rewarded",
    "rewarded_video",
    "rewardedvideo",
    "rewarded_interstitial",
    "reward_video",
    "fullscreen_rewarded",
    "skippable_video",
    "non_skippable_video",
    "incentivized",
    "incentivized_video",
];

impl AdType {
    /// All ad types, in canonical emission order.
    pub const ALL: [Self; 3] = [Self::Banner, Self::Interstitial, Self::Rewarded];

    /// Map a vendor ad-format label onto an `AdType`.
    ///
    /// The mediator-independent `video` label is ambiguous: it resolves to
    /// [`AdType::Rewarded`] only when the source row carried an
    /// `incentivized = true` companion field, otherwise to
    /// [`AdType::Interstitial`]. Empty or unknown labels default to
    /// [`AdType::Interstitial`].
    #[must_use]
    pub fn from_label(label: &str, incentivized: Option<bool>) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return Self::Interstitial;
        }
        if lower == "video" {
            return if incentivized == Some(true) {
                Self::Rewarded
            } else {
                Self::Interstitial
            };
        }
        if BANNER_LABELS.contains(&lower.as_str()) {
            return Self::Banner;
        }
        if INTERSTITIAL_LABELS.contains(&lower.as_str()) {
            return Self::Interstitial;
        }
        if REWARDED_LABELS.contains(&lower.as_str()) {
            return Self::Rewarded;
        }

        // Second pass with separators stripped catches rewarded_video vs
        // rewardedvideo style drift between vendors.
        let compact: String = lower.chars().filter(|c| *c != '_' && *c != ' ').collect();
        match compact.as_str() {
            "rewardedvideo" | "rewardvideo" => Self::Rewarded,
            "interstitialvideo" | "videointerstitial" => Self::Interstitial,
            _ => Self::Interstitial,
        }
    }

    /// Canonical serialized form: `"banner"`, `"interstitial"` or `"rewarded"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Interstitial => "interstitial",
            Self::Rewarded => "rewarded",
        }
    }

    /// Capitalized name for report output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Banner => "Banner",
            Self::Interstitial => "Interstitial",
            Self::Rewarded => "Rewarded",
        }
    }
}

impl std::fmt::Display for AdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_family() {
        for label in ["banner", "MREC", "native_banner", "adaptive_banner", "Smart_Banner"] {
            assert_eq!(AdType::from_label(label, None), AdType::Banner, "{label}");
        }
    }

    #[test]
    fn fullscreen_family() {
        for label in ["interstitial", "FULLSCREEN", "app_open", "non_skippable_interstitial"] {
            assert_eq!(AdType::from_label(label, None), AdType::Interstitial, "{label}");
        }
        for label in ["rewarded_video", "skippable_video", "incentivized_video", "Reward Video"] {
            assert_eq!(AdType::from_label(label, None), AdType::Rewarded, "{label}");
        }
    }

    #[test]
    fn video_needs_incentivized_flag() {
        assert_eq!(AdType::from_label("video", Some(true)), AdType::Rewarded);
        assert_eq!(AdType::from_label("video", Some(false)), AdType::Interstitial);
        assert_eq!(AdType::from_label("video", None), AdType::Interstitial);
    }

    #[test]
    fn unknown_defaults_to_interstitial() {
        assert_eq!(AdType::from_label("", None), AdType::Interstitial);
        assert_eq!(AdType::from_label("hologram", None), AdType::Interstitial);
    }
}
