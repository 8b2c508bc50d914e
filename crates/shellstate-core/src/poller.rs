//! Background polling loops.
//!
//! One task per subsystem, each on its own configured period. A loop never
//! exits on failure: services already degrade to previous or empty
//! snapshots, and a full event queue only costs the superseded event.

use std::{sync::Arc, time::Duration};

use log::warn;
use shellstate_proto::config::PollConfig;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    event_bus::{BusEvent, EventSender, SnapshotEvent},
    services::{
        audio::AudioService,
        battery::BatteryService,
        bluetooth::BluetoothService,
        hypr::HyprService,
        media::MediaService,
        network::{NetworkService, ReadWifiOptions},
        system::SystemService,
    },
};

/// Everything the polling loops need, shared with the rest of the process.
#[derive(Clone)]
pub struct PollerServices {
    pub network: Arc<NetworkService>,
    pub bluetooth: Arc<BluetoothService>,
    pub audio: Arc<AudioService>,
    pub hypr: Arc<HyprService>,
    pub battery: Arc<BatteryService>,
    pub media: Arc<MediaService>,
    pub system: Arc<SystemService>,
}

/// Handle over the spawned polling tasks; dropping it aborts them.
pub struct Poller {
    tasks: Vec<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn(services: PollerServices, poll: &PollConfig, sender: EventSender) -> Self {
        let tasks = vec![
            spawn_wifi_loop(
                Arc::clone(&services.network),
                poll.wifi_secs,
                sender.clone(),
            ),
            spawn_loop(poll.bluetooth_secs, sender.clone(), {
                let bluetooth = Arc::clone(&services.bluetooth);
                move || {
                    let bluetooth = Arc::clone(&bluetooth);
                    async move { SnapshotEvent::Bluetooth(bluetooth.read().await) }
                }
            }),
            spawn_loop(poll.audio_secs, sender.clone(), {
                let audio = Arc::clone(&services.audio);
                move || {
                    let audio = Arc::clone(&audio);
                    async move { SnapshotEvent::Audio(audio.read().await) }
                }
            }),
            spawn_loop(poll.hypr_secs, sender.clone(), {
                let hypr = Arc::clone(&services.hypr);
                move || {
                    let hypr = Arc::clone(&hypr);
                    async move { SnapshotEvent::Hypr(hypr.read().await) }
                }
            }),
            spawn_loop(poll.battery_secs, sender.clone(), {
                let battery = Arc::clone(&services.battery);
                move || {
                    let battery = Arc::clone(&battery);
                    async move {
                        let snapshot = battery.read().await;
                        battery.notify_if_low(&snapshot).await;
                        SnapshotEvent::Battery(snapshot)
                    }
                }
            }),
            spawn_loop(poll.media_secs, sender.clone(), {
                let media = Arc::clone(&services.media);
                move || {
                    let media = Arc::clone(&media);
                    async move { SnapshotEvent::Media(media.read().await) }
                }
            }),
            spawn_loop(poll.system_secs, sender, {
                let system = Arc::clone(&services.system);
                move || {
                    let system = Arc::clone(&system);
                    async move { SnapshotEvent::System(system.read(true).await) }
                }
            }),
        ];

        Self { tasks }
    }

    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn publish(sender: &EventSender, event: SnapshotEvent) {
    if let Err(err) = sender.try_send(BusEvent::Snapshot(event)) {
        warn!("snapshot event dropped: {err}");
    }
}

fn spawn_loop<F, Fut>(period_secs: u64, sender: EventSender, mut read: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = SnapshotEvent> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            publish(&sender, read().await);
        }
    })
}

/// The Wi-Fi loop threads the previous network list through each cycle so a
/// failed scan keeps showing the last successful one.
fn spawn_wifi_loop(
    network: Arc<NetworkService>,
    period_secs: u64,
    sender: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut previous_networks = Vec::new();

        loop {
            ticker.tick().await;
            let snapshot = network
                .read(ReadWifiOptions {
                    skip_networks: false,
                    previous_networks: previous_networks.clone(),
                })
                .await;
            previous_networks = snapshot.networks.clone();
            publish(&sender, SnapshotEvent::Wifi(snapshot));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use shellstate_proto::{config::Config, ports::CommandRunner, snapshot::maintenance::ArchNewsSnapshot};
    use tokio::runtime::Runtime;

    use crate::{
        cache::{CacheRecord, DiskCache},
        event_bus::EventBus,
        services::{maintenance::MaintenanceService, power::PowerService},
        test_utils::FakeRunner,
    };

    fn services(runner: Arc<FakeRunner>, root: &Path) -> PollerServices {
        let runner = runner as Arc<dyn CommandRunner>;
        let maintenance = Arc::new(MaintenanceService::new(
            Arc::clone(&runner),
            &Config::default(),
            &root.join("cache"),
        ));
        let battery = Arc::new(BatteryService::with_power_supply_dir(
            Arc::clone(&runner),
            root.join("power_supply"),
        ));
        let power = Arc::new(PowerService::with_thermal_dir(
            Arc::clone(&runner),
            root.join("thermal"),
        ));

        PollerServices {
            network: Arc::new(NetworkService::new(Arc::clone(&runner))),
            bluetooth: Arc::new(BluetoothService::new(Arc::clone(&runner))),
            audio: Arc::new(AudioService::new(Arc::clone(&runner))),
            hypr: Arc::new(HyprService::new(Arc::clone(&runner))),
            battery: Arc::clone(&battery),
            media: Arc::new(MediaService::new(Arc::clone(&runner))),
            system: Arc::new(SystemService::new(maintenance, battery, power)),
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            wifi_secs: 1,
            bluetooth_secs: 1,
            audio_secs: 1,
            hypr_secs: 1,
            battery_secs: 1,
            media_secs: 1,
            system_secs: 1,
        }
    }

    #[test]
    fn first_tick_publishes_every_subsystem() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");

        // Keep the system loop off the network.
        let news: DiskCache<ArchNewsSnapshot> =
            DiskCache::new(&dir.path().join("cache"), "arch-news");
        runtime.block_on(news.store(&CacheRecord::now(ArchNewsSnapshot::default())));

        let runner = Arc::new(FakeRunner::new());
        runner.respond("checkupdates", "0\n0\n");

        let bus = EventBus::new(std::num::NonZeroUsize::new(16).expect("capacity"));
        let poller_bus = bus.clone();
        let services = services(runner, dir.path());

        runtime.block_on(async move {
            let poller = Poller::spawn(services, &fast_poll(), poller_bus.sender());

            // Intervals fire immediately; give every loop a moment to finish
            // its first read.
            tokio::time::sleep(Duration::from_millis(300)).await;

            let events = poller_bus.drain().expect("drain");
            assert_eq!(events.len(), 7, "one event per subsystem: {events:?}");

            poller.shutdown();
        });
    }

    #[test]
    fn dropping_the_poller_stops_the_loops() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");

        let news: DiskCache<ArchNewsSnapshot> =
            DiskCache::new(&dir.path().join("cache"), "arch-news");
        runtime.block_on(news.store(&CacheRecord::now(ArchNewsSnapshot::default())));

        let runner = Arc::new(FakeRunner::new());
        let bus = EventBus::new(std::num::NonZeroUsize::new(16).expect("capacity"));
        let services = services(Arc::clone(&runner), dir.path());

        runtime.block_on(async {
            let poller = Poller::spawn(services, &fast_poll(), bus.sender());
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(poller);
            bus.drain().expect("drain");

            let calls_after_drop = runner.calls().len();
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(runner.calls().len(), calls_after_drop);
        });
    }
}
