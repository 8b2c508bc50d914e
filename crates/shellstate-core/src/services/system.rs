//! Aggregate host snapshot: updates, news, snapper, battery, thermals and
//! the power profile, gathered concurrently.

use std::sync::Arc;

use shellstate_proto::snapshot::{maintenance::UpdatesBreakdown, system::SystemSnapshot};

use crate::services::{
    battery::BatteryService, maintenance::MaintenanceService, power::PowerService,
};

pub struct SystemService {
    maintenance: Arc<MaintenanceService>,
    battery: Arc<BatteryService>,
    power: Arc<PowerService>,
}

impl SystemService {
    pub fn new(
        maintenance: Arc<MaintenanceService>,
        battery: Arc<BatteryService>,
        power: Arc<PowerService>,
    ) -> Self {
        Self {
            maintenance,
            battery,
            power,
        }
    }

    /// Gathers the whole host snapshot. Every leg degrades independently, so
    /// one broken tool never blanks the others.
    ///
    /// `include_updates` lets fast callers skip the package legs, which are
    /// the only ones that may hit the network on a cache miss.
    pub async fn read(&self, include_updates: bool) -> SystemSnapshot {
        let (updates, news, snapper, battery, max_temperature_c, power) = tokio::join!(
            async {
                if include_updates {
                    self.maintenance.read_updates().await
                } else {
                    UpdatesBreakdown::default()
                }
            },
            async {
                if include_updates {
                    self.maintenance.read_news().await
                } else {
                    Default::default()
                }
            },
            self.maintenance.read_snapper(),
            self.battery.read(),
            self.power.read_max_temperature(),
            self.power.read_profile(),
        );

        self.battery.notify_if_low(&battery).await;

        SystemSnapshot {
            updates,
            news,
            snapper,
            battery,
            max_temperature_c,
            power,
        }
    }

    /// Forces the updates query and news fetch past their caches.
    pub async fn refresh_updates(&self) -> UpdatesBreakdown {
        let (updates, _news) = tokio::join!(
            self.maintenance.refresh_updates(),
            self.maintenance.refresh_news(),
        );
        updates
    }

    pub async fn mark_news_read(&self) {
        self.maintenance.mark_news_read().await;
    }
}
