use serde::{Deserialize, Serialize};

/// Operating-system platform an impression was served on.
///
/// Every row emitted by the system carries exactly one `Platform`. Incoming
/// API spellings are funneled through [`Platform::from_label`]; nothing else
/// in the workspace is allowed to interpret platform strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Google Android (including Play-store spellings such as `google`).
    Android,
    /// Apple iOS (including `apple`, `iphone`, `ipad` spellings).
    Ios,
}

impl Platform {
    /// Both platforms, in canonical emission order.
    pub const ALL: [Self; 2] = [Self::Android, Self::Ios];

    /// Map an API platform label onto a `Platform`.
    ///
    /// Recognizes the casings and vendor aliases observed across the network
    /// reporting APIs. Unknown or empty labels resolve to [`Platform::Android`];
    /// callers that care about the distinction should check
    /// [`Platform::try_from_label`] first and log the fallback.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        Self::try_from_label(label).unwrap_or(Self::Android)
    }

    /// Map an API platform label onto a `Platform`, returning `None` for
    /// labels outside the known variation table.
    #[must_use]
    pub fn try_from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "PLATFORM_TYPE_ANDROID" => return Some(Self::Android),
            "PLATFORM_TYPE_IOS" => return Some(Self::Ios),
            _ => {}
        }
        match label.trim().to_ascii_lowercase().as_str() {
            "android" | "google" => Some(Self::Android),
            "ios" | "apple" | "iphone" | "ipad" => Some(Self::Ios),
            _ => None,
        }
    }

    /// Canonical serialized form: `"android"` or `"ios"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
        }
    }

    /// Human-readable name used in reports: `"Android"` or `"iOS"`.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Android => "Android",
            Self::Ios => "iOS",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
