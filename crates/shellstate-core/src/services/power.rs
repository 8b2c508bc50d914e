//! Power profile state and thermal readings.

use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use log::warn;
use masterror::{AppError, AppResult};
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::power::{PowerProfile, PowerSnapshot},
};

use crate::{
    runner::shell_quote,
    services::{parse_f64_loose, round1},
};

const DEFAULT_THERMAL_DIR: &str = "/sys/class/thermal";

pub struct PowerService {
    runner: Arc<dyn CommandRunner>,
    thermal_dir: PathBuf,
}

impl PowerService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_thermal_dir(runner, PathBuf::from(DEFAULT_THERMAL_DIR))
    }

    pub fn with_thermal_dir(runner: Arc<dyn CommandRunner>, dir: PathBuf) -> Self {
        Self {
            runner,
            thermal_dir: dir,
        }
    }

    /// Reads the active power profile; hosts without `powerprofilesctl`
    /// report an unavailable snapshot.
    pub async fn read_profile(&self) -> PowerSnapshot {
        let request = CommandRequest::new(
            "if command -v powerprofilesctl >/dev/null 2>&1; then powerprofilesctl get; fi",
        )
        .timeout(Duration::from_millis(2500))
        .allow_failure()
        .dedupe_key("power-profile");

        let raw = match self.runner.run(request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("power profile query failed: {err}");
                String::new()
            }
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return PowerSnapshot::default();
        }

        PowerSnapshot {
            profile: PowerProfile::parse(raw),
            available: true,
        }
    }

    pub async fn set_profile(&self, profile: PowerProfile) -> AppResult<()> {
        if profile == PowerProfile::Unknown {
            return Err(AppError::internal("cannot set an unknown power profile"));
        }

        let request = CommandRequest::new(format!(
            "powerprofilesctl set {}",
            shell_quote(profile.as_str())
        ))
        .timeout(Duration::from_secs(5));

        self.runner
            .run(request)
            .await
            .map(|_| ())
            .map_err(|err| AppError::internal(err.to_string()))
    }

    /// Hottest thermal zone in whole degrees-and-tenths Celsius.
    ///
    /// Zones report millidegrees; non-positive readings are sensor noise and
    /// are skipped.
    pub async fn read_max_temperature(&self) -> Option<f64> {
        let mut entries = tokio::fs::read_dir(&self.thermal_dir).await.ok()?;
        let mut max_millidegrees: Option<f64> = None;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("thermal_zone") {
                continue;
            }

            let Ok(raw) = tokio::fs::read_to_string(entry.path().join("temp")).await else {
                continue;
            };
            let Some(value) = parse_f64_loose(&raw) else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }

            max_millidegrees = Some(match max_millidegrees {
                Some(current) => current.max(value),
                None => value,
            });
        }

        max_millidegrees.map(|millidegrees| round1(millidegrees / 1000.0))
    }
}
