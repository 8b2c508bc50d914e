use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Full,
    #[default]
    Unknown,
}

impl BatteryStatus {
    /// Maps the free-form sysfs `status` string onto the known states.
    pub fn parse(raw: &str) -> Self {
        let clean = raw.trim().to_lowercase();
        if clean.contains("discharging") {
            Self::Discharging
        } else if clean.contains("charging") {
            Self::Charging
        } else if clean.contains("full") {
            Self::Full
        } else {
            Self::Unknown
        }
    }
}

/// Last-known battery readings inferred from `/sys/class/power_supply`.
///
/// Every field except `available` is best-effort: hardware that does not
/// expose a given attribute yields `None` rather than a guess.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatterySnapshot {
    /// Whether a battery directory was found at all.
    pub available: bool,
    pub percent: Option<u8>,
    pub status: BatteryStatus,
    /// Full-charge capacity relative to design capacity, one decimal.
    pub health_percent: Option<f64>,
    pub on_ac: Option<bool>,
    pub power_watts: Option<f64>,
    pub time_remaining_minutes: Option<u32>,
}
