//! Battery state from `/sys/class/power_supply`.
//!
//! Kernels expose either the energy_* family (µWh) or the charge_* family
//! (µAh) depending on the driver, so every derived value tries both. All
//! reads are best effort: a missing file just leaves its field unset.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, warn};
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::battery::{BatterySnapshot, BatteryStatus},
};

use crate::services::{clamp_percent, parse_f64_loose, round1};

const DEFAULT_POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Percent at or below which a single low-battery notification fires.
const LOW_BATTERY_PERCENT: u8 = 15;
/// Percent at or above which the notification latch resets.
const LOW_BATTERY_RESET_PERCENT: u8 = 20;

pub struct BatteryService {
    runner: Arc<dyn CommandRunner>,
    power_supply_dir: PathBuf,
    low_notified: AtomicBool,
}

impl BatteryService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_power_supply_dir(runner, PathBuf::from(DEFAULT_POWER_SUPPLY_DIR))
    }

    pub fn with_power_supply_dir(runner: Arc<dyn CommandRunner>, dir: PathBuf) -> Self {
        Self {
            runner,
            power_supply_dir: dir,
            low_notified: AtomicBool::new(false),
        }
    }

    /// Reads the first battery and AC adapter found under the sysfs root.
    pub async fn read(&self) -> BatterySnapshot {
        let Some(battery_dir) = self.find_supply_dir("BAT").await else {
            debug!("no battery under {:?}", self.power_supply_dir);
            return BatterySnapshot::default();
        };

        let status = read_value(&battery_dir.join("status"))
            .await
            .map(|raw| BatteryStatus::parse(&raw))
            .unwrap_or_default();

        let percent = self.read_percent(&battery_dir).await;
        let health_percent = self.read_health(&battery_dir).await;
        let power_watts = self.read_power_watts(&battery_dir).await;
        let on_ac = self.read_on_ac().await;
        let time_remaining_minutes =
            self.read_time_remaining(&battery_dir, status, power_watts).await;

        BatterySnapshot {
            available: true,
            percent,
            status,
            health_percent,
            on_ac,
            power_watts,
            time_remaining_minutes,
        }
    }

    /// Fires a desktop notification once per discharge below the threshold.
    pub async fn notify_if_low(&self, snapshot: &BatterySnapshot) {
        let Some(percent) = snapshot.percent else {
            return;
        };

        if percent >= LOW_BATTERY_RESET_PERCENT {
            self.low_notified.store(false, Ordering::Relaxed);
            return;
        }

        let discharging = snapshot.status == BatteryStatus::Discharging
            && snapshot.on_ac != Some(true);
        if percent > LOW_BATTERY_PERCENT || !discharging {
            return;
        }

        if self.low_notified.swap(true, Ordering::Relaxed) {
            return;
        }

        let request = CommandRequest::new(format!(
            "notify-send -u critical 'Battery low' 'Battery at {percent}%'"
        ))
        .timeout(Duration::from_secs(5))
        .allow_failure();

        if let Err(err) = self.runner.run(request).await {
            warn!("low battery notification failed: {err}");
        }
    }

    async fn find_supply_dir(&self, prefix: &str) -> Option<PathBuf> {
        let mut entries = tokio::fs::read_dir(&self.power_supply_dir).await.ok()?;
        let mut matches = Vec::new();

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(prefix) {
                matches.push(entry.path());
            }
        }

        matches.sort();
        matches.into_iter().next()
    }

    async fn read_percent(&self, dir: &Path) -> Option<u8> {
        if let Some(capacity) = read_number(&dir.join("capacity")).await {
            return Some(clamp_percent(capacity.round() as i64));
        }

        let (now, full) = read_pair(dir, "energy_now", "energy_full")
            .await
            .or(read_pair(dir, "charge_now", "charge_full").await)?;
        if full <= 0.0 {
            return None;
        }
        Some(clamp_percent((now / full * 100.0).round() as i64))
    }

    async fn read_health(&self, dir: &Path) -> Option<f64> {
        let (full, design) = read_pair(dir, "energy_full", "energy_full_design")
            .await
            .or(read_pair(dir, "charge_full", "charge_full_design").await)?;
        if design <= 0.0 {
            return None;
        }
        Some(round1((full / design * 100.0).min(100.0)))
    }

    async fn read_power_watts(&self, dir: &Path) -> Option<f64> {
        if let Some(micro_watts) = read_number(&dir.join("power_now")).await {
            return Some(round1(micro_watts.abs() / 1_000_000.0));
        }

        // charge_* drivers expose current and voltage instead of power.
        let current = read_number(&dir.join("current_now")).await?;
        let voltage = read_number(&dir.join("voltage_now")).await?;
        Some(round1((current.abs() * voltage.abs()) / 1e12))
    }

    async fn read_on_ac(&self) -> Option<bool> {
        for prefix in ["AC", "ADP"] {
            if let Some(adapter) = self.find_supply_dir(prefix).await {
                if let Some(online) = read_value(&adapter.join("online")).await {
                    return Some(online.trim() == "1");
                }
            }
        }
        None
    }

    /// Energy now/full in µWh. charge_* drivers store µAh, so their values
    /// are scaled by the pack voltage first.
    async fn read_energy_pair(&self, dir: &Path) -> Option<(f64, f64)> {
        if let Some(pair) = read_pair(dir, "energy_now", "energy_full").await {
            return Some(pair);
        }

        let (now, full) = read_pair(dir, "charge_now", "charge_full").await?;
        let voltage = read_number(&dir.join("voltage_now")).await?;
        let volts = voltage.abs() / 1_000_000.0;
        Some((now * volts, full * volts))
    }

    async fn read_time_remaining(
        &self,
        dir: &Path,
        status: BatteryStatus,
        power_watts: Option<f64>,
    ) -> Option<u32> {
        let power = power_watts.filter(|watts| *watts > 0.05)?;

        let (now, full) = self.read_energy_pair(dir).await?;

        // Energy is µWh; power is already in watts.
        let remaining_hours = match status {
            BatteryStatus::Discharging => now / 1_000_000.0 / power,
            BatteryStatus::Charging => (full - now).max(0.0) / 1_000_000.0 / power,
            _ => return None,
        };

        let minutes = remaining_hours * 60.0;
        if !minutes.is_finite() || minutes < 0.0 || minutes > 60.0 * 24.0 * 7.0 {
            return None;
        }
        Some(minutes.round() as u32)
    }
}

async fn read_value(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path)
        .await
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

async fn read_number(path: &Path) -> Option<f64> {
    parse_f64_loose(&read_value(path).await?)
}

async fn read_pair(dir: &Path, now_file: &str, full_file: &str) -> Option<(f64, f64)> {
    let now = read_number(&dir.join(now_file)).await?;
    let full = read_number(&dir.join(full_file)).await?;
    Some((now, full))
}
