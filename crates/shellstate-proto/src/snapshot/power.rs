use serde::{Deserialize, Serialize};

/// Power profile as reported by `powerprofilesctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerProfile {
    PowerSaver,
    Balanced,
    Performance,
    #[default]
    Unknown,
}

impl PowerProfile {
    /// Parses the daemon's output; anything unexpected maps to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "power-saver" => Self::PowerSaver,
            "balanced" => Self::Balanced,
            "performance" => Self::Performance,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerSaver => "power-saver",
            Self::Balanced => "balanced",
            Self::Performance => "performance",
            Self::Unknown => "unknown",
        }
    }
}

/// Last-known power-profile state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PowerSnapshot {
    pub profile: PowerProfile,
    /// False when `powerprofilesctl` is missing or returned garbage.
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_profile_is_unknown() {
        assert_eq!(PowerProfile::parse("balanced\n"), PowerProfile::Balanced);
        assert_eq!(PowerProfile::parse("turbo"), PowerProfile::Unknown);
        assert_eq!(PowerProfile::parse(""), PowerProfile::Unknown);
    }
}
