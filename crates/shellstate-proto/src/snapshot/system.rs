use serde::{Deserialize, Serialize};

use super::{
    battery::BatterySnapshot,
    maintenance::{ArchNewsSnapshot, SnapperAvailability, UpdatesBreakdown},
    power::PowerSnapshot,
};

/// Aggregated control-center system tab state.
///
/// Each leg is produced by an independent sub-query; a failing leg degrades
/// to its own empty shape without affecting its siblings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub updates: UpdatesBreakdown,
    pub news: ArchNewsSnapshot,
    pub snapper: SnapperAvailability,
    pub battery: BatterySnapshot,
    /// Hottest thermal zone reading, °C with one decimal.
    pub max_temperature_c: Option<f64>,
    pub power: PowerSnapshot,
}
