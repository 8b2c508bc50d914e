use std::{
    backtrace::Backtrace,
    num::NonZeroUsize,
    panic,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum, command};
use flexi_logger::{
    Age, Cleanup, Criterion, FileSpec, LogSpecBuilder, LogSpecification, Logger, Naming,
};
use log::{debug, error, info};
use masterror::{AppError, AppResult};
use serde_json::json;
use shellstate_core::{
    config::{cache_dir, get_config},
    event_bus::{BusEvent, EventBus, SnapshotEvent},
    poller::{Poller, PollerServices},
    runner::ShellRunner,
    services::{
        audio::AudioService,
        battery::BatteryService,
        bluetooth::BluetoothService,
        hypr::HyprService,
        maintenance::MaintenanceService,
        media::MediaService,
        network::{NetworkService, ReadWifiOptions},
        power::PowerService,
        session::SessionService,
        system::SystemService,
    },
};
use shellstate_proto::{
    config::Config,
    ports::CommandRunner,
    snapshot::{power::PowerProfile, session::SessionAction},
};

const EVENT_QUEUE_CAPACITY: usize = 32;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one subsystem snapshot as JSON and exit.
    Snapshot {
        #[arg(value_enum)]
        target: SnapshotTarget,
    },
    /// Run the polling daemon and stream snapshot events as JSON lines.
    Watch,
    /// Toggle the Wi-Fi radio.
    Wifi {
        #[arg(value_enum)]
        mode: RadioMode,
    },
    /// Switch the power profile.
    Profile {
        #[arg(value_enum)]
        profile: ProfileArg,
    },
    /// Execute a session action.
    Session {
        #[arg(value_enum)]
        action: SessionArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SnapshotTarget {
    Wifi,
    Bluetooth,
    Audio,
    Battery,
    Hypr,
    Media,
    System,
    All,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RadioMode {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    PowerSaver,
    Balanced,
    Performance,
}

impl From<ProfileArg> for PowerProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::PowerSaver => PowerProfile::PowerSaver,
            ProfileArg::Balanced => PowerProfile::Balanced,
            ProfileArg::Performance => PowerProfile::Performance,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SessionArg {
    Logout,
    Suspend,
    Reboot,
    Shutdown,
}

impl From<SessionArg> for SessionAction {
    fn from(arg: SessionArg) -> Self {
        match arg {
            SessionArg::Logout => SessionAction::Logout,
            SessionArg::Suspend => SessionAction::Suspend,
            SessionArg::Reboot => SessionAction::Reboot,
            SessionArg::Shutdown => SessionAction::Shutdown,
        }
    }
}

pub fn get_log_spec(log_level: &str) -> LogSpecification {
    LogSpecification::env_or_parse(log_level).unwrap_or_else(|err| {
        panic!("Failed to parse log level: {err}");
    })
}

struct Services {
    network: Arc<NetworkService>,
    bluetooth: Arc<BluetoothService>,
    audio: Arc<AudioService>,
    hypr: Arc<HyprService>,
    battery: Arc<BatteryService>,
    media: Arc<MediaService>,
    power: Arc<PowerService>,
    session: Arc<SessionService>,
    system: Arc<SystemService>,
}

fn build_services(config: &Config) -> Services {
    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new());
    let cache = cache_dir(config);

    let maintenance = Arc::new(MaintenanceService::new(Arc::clone(&runner), config, &cache));
    let battery = Arc::new(BatteryService::new(Arc::clone(&runner)));
    let power = Arc::new(PowerService::new(Arc::clone(&runner)));

    Services {
        network: Arc::new(NetworkService::new(Arc::clone(&runner))),
        bluetooth: Arc::new(BluetoothService::new(Arc::clone(&runner))),
        audio: Arc::new(AudioService::new(Arc::clone(&runner))),
        hypr: Arc::new(HyprService::new(Arc::clone(&runner))),
        battery: Arc::clone(&battery),
        media: Arc::new(MediaService::new(Arc::clone(&runner))),
        power: Arc::clone(&power),
        session: Arc::new(SessionService::new(Arc::clone(&runner))),
        system: Arc::new(SystemService::new(maintenance, battery, power)),
    }
}

fn event_json(event: &SnapshotEvent) -> serde_json::Value {
    match event {
        SnapshotEvent::Wifi(snapshot) => json!({"kind": "wifi", "snapshot": snapshot}),
        SnapshotEvent::Bluetooth(snapshot) => json!({"kind": "bluetooth", "snapshot": snapshot}),
        SnapshotEvent::Audio(snapshot) => json!({"kind": "audio", "snapshot": snapshot}),
        SnapshotEvent::Hypr(snapshot) => json!({"kind": "hypr", "snapshot": snapshot}),
        SnapshotEvent::Battery(snapshot) => json!({"kind": "battery", "snapshot": snapshot}),
        SnapshotEvent::Media(snapshot) => json!({"kind": "media", "snapshot": snapshot}),
        SnapshotEvent::System(snapshot) => json!({"kind": "system", "snapshot": snapshot}),
        _ => json!({"kind": "unknown"}),
    }
}

async fn print_snapshot(services: &Services, target: SnapshotTarget) -> AppResult<()> {
    let value = match target {
        SnapshotTarget::Wifi => {
            json!(services.network.read(ReadWifiOptions::default()).await)
        }
        SnapshotTarget::Bluetooth => json!(services.bluetooth.read().await),
        SnapshotTarget::Audio => json!(services.audio.read().await),
        SnapshotTarget::Battery => json!(services.battery.read().await),
        SnapshotTarget::Hypr => json!(services.hypr.read().await),
        SnapshotTarget::Media => json!(services.media.read().await),
        SnapshotTarget::System => json!(services.system.read(true).await),
        SnapshotTarget::All => {
            let (wifi, bluetooth, audio, hypr, media, system) = tokio::join!(
                services.network.read(ReadWifiOptions::default()),
                services.bluetooth.read(),
                services.audio.read(),
                services.hypr.read(),
                services.media.read(),
                services.system.read(true),
            );
            json!({
                "wifi": wifi,
                "bluetooth": bluetooth,
                "audio": audio,
                "hypr": hypr,
                "media": media,
                "system": system,
            })
        }
    };

    let rendered = serde_json::to_string_pretty(&value)
        .map_err(|err| AppError::internal(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

async fn watch(services: Services, config: &Config) -> AppResult<()> {
    let capacity = NonZeroUsize::new(EVENT_QUEUE_CAPACITY)
        .ok_or_else(|| AppError::internal("event queue capacity must be non-zero"))?;
    let bus = EventBus::new(capacity);
    let poller = Poller::spawn(
        PollerServices {
            network: services.network,
            bluetooth: services.bluetooth,
            audio: services.audio,
            hypr: services.hypr,
            battery: services.battery,
            media: services.media,
            system: services.system,
        },
        &config.poll,
        bus.sender(),
    );

    info!("polling started; streaming snapshot events");
    let mut receiver = bus.receiver();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                while let Some(event) = receiver.try_recv().map_err(AppError::from)? {
                    match event {
                        BusEvent::Snapshot(snapshot) => {
                            println!("{}", event_json(&snapshot));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    info!("shutting down polling loops");
    poller.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();
    debug!("args: {args:?}");

    let logger = Logger::with(
        LogSpecBuilder::new()
            .default(log::LevelFilter::Info)
            .build(),
    )
    .log_to_file(FileSpec::default().directory("/tmp/shellstate"))
    .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
    .rotate(
        Criterion::Age(Age::Day),
        Naming::Timestamps,
        Cleanup::KeepLogFiles(7),
    );
    let logger = if cfg!(debug_assertions) {
        logger.duplicate_to_stderr(flexi_logger::Duplicate::All)
    } else {
        logger
    };
    let logger = logger
        .start()
        .map_err(|err| AppError::internal(err.to_string()))?;
    panic::set_hook(Box::new(|info| {
        let b = Backtrace::capture();
        error!("Panic: {info} \n {b}");
    }));

    let (config, config_path) = get_config(args.config_path).unwrap_or_else(|err| {
        error!("Failed to read config: {err}");

        std::process::exit(1);
    });
    debug!("config loaded from {config_path:?}");

    logger.set_new_spec(get_log_spec(&config.log_level));

    let services = build_services(&config);

    match args.command {
        Command::Snapshot { target } => print_snapshot(&services, target).await,
        Command::Watch => watch(services, &config).await,
        Command::Wifi { mode } => {
            services
                .network
                .set_radio(matches!(mode, RadioMode::On))
                .await
        }
        Command::Profile { profile } => services.power.set_profile(profile.into()).await,
        Command::Session { action } => services.session.execute(action.into()).await,
    }
}
