//! Wi-Fi state over `nmcli`.
//!
//! One read cycle issues the radio and interface queries concurrently, then
//! scans visible networks on the primary interface. A failed scan keeps the
//! previously known network list so the UI never flickers to empty; a failed
//! base query degrades to the empty snapshot.

use std::{collections::HashMap, sync::Arc, time::Duration};

use log::warn;
use masterror::{AppError, AppResult};
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::network::{WifiInterface, WifiNetwork, WifiSnapshot},
};

use super::clamp_percent;
use crate::runner::shell_quote;

/// Placeholder shown for hidden SSIDs.
pub const HIDDEN_SSID_LABEL: &str = "(hidden)";

/// Options for one Wi-Fi read cycle.
#[derive(Debug, Clone, Default)]
pub struct ReadWifiOptions {
    /// Skip the (slow) network scan and keep the previous list.
    pub skip_networks: bool,
    /// Network list from the previous snapshot, kept on scan failure.
    pub previous_networks: Vec<WifiNetwork>,
}

#[derive(Clone)]
pub struct NetworkService {
    runner: Arc<dyn CommandRunner>,
}

impl NetworkService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Reads the current Wi-Fi state. Never fails; degradation order is
    /// previous networks, then the empty snapshot.
    pub async fn read(&self, options: ReadWifiOptions) -> WifiSnapshot {
        let radio = self.runner.run(
            CommandRequest::new("LC_ALL=C nmcli -t -f WIFI g").dedupe_key("wifi-radio"),
        );
        let interfaces = self.runner.run(
            CommandRequest::new(
                "LC_ALL=C nmcli -t --separator '|' -f DEVICE,TYPE,STATE,CONNECTION device status",
            )
            .dedupe_key("wifi-interfaces"),
        );

        let (radio_raw, interfaces_raw) = match tokio::join!(radio, interfaces) {
            (Ok(radio_raw), Ok(interfaces_raw)) => (radio_raw, interfaces_raw),
            (radio, interfaces) => {
                if let Err(err) = radio.and(interfaces) {
                    warn!("wifi base query failed: {err}");
                }
                return WifiSnapshot::empty_keeping(options.previous_networks);
            }
        };

        let radio_enabled = radio_raw.trim().eq_ignore_ascii_case("enabled");
        let interfaces = parse_interfaces(&interfaces_raw);
        let primary = interfaces
            .iter()
            .find(|iface| iface.is_connected())
            .or_else(|| interfaces.first())
            .cloned();

        let mut networks = options.previous_networks;
        if !options.skip_networks && radio_enabled {
            if let Some(primary) = primary.as_ref().filter(|p| !p.device.is_empty()) {
                let list = self.runner.run(
                    CommandRequest::new(format!(
                        "LC_ALL=C nmcli -t --separator '|' -f IN-USE,SSID,SIGNAL,SECURITY,BARS \
                         dev wifi list ifname {}",
                        shell_quote(&primary.device)
                    ))
                    .timeout(Duration::from_secs(10))
                    .dedupe_key("wifi-scan"),
                );

                match list.await {
                    Ok(raw) => networks = parse_networks(&raw),
                    Err(err) => warn!("wifi scan failed, keeping previous list: {err}"),
                }
            }
        }

        let current_connection = primary
            .as_ref()
            .map(|p| p.connection.as_str())
            .filter(|connection| !connection.is_empty() && *connection != "--")
            .unwrap_or_default()
            .to_string();

        WifiSnapshot {
            radio_enabled,
            primary_interface: primary.map(|p| p.device).unwrap_or_default(),
            current_connection,
            interfaces,
            networks,
        }
    }

    /// Turns the Wi-Fi radio on or off.
    pub async fn set_radio(&self, enabled: bool) -> AppResult<()> {
        let mode = if enabled { "on" } else { "off" };
        self.runner
            .run(CommandRequest::new(format!("nmcli radio wifi {mode}")))
            .await
            .map_err(|err| AppError::internal(format!("failed to switch wifi radio: {err}")))?;
        Ok(())
    }

    /// Disconnects the given interface. A blank name is a no-op.
    pub async fn disconnect(&self, interface: &str) -> AppResult<()> {
        let interface = interface.trim();
        if interface.is_empty() {
            return Ok(());
        }

        self.runner
            .run(CommandRequest::new(format!(
                "nmcli device disconnect {}",
                shell_quote(interface)
            )))
            .await
            .map_err(|err| AppError::internal(format!("failed to disconnect wifi: {err}")))?;
        Ok(())
    }

    /// Connects to an SSID on the given interface, optionally with a
    /// password. `nmcli` waits up to 12 seconds for the activation.
    pub async fn connect(
        &self,
        ssid: &str,
        interface: &str,
        password: Option<&str>,
    ) -> AppResult<()> {
        let ssid = ssid.trim();
        if ssid.is_empty() {
            return Err(AppError::internal("SSID must not be blank"));
        }
        let interface = interface.trim();
        if interface.is_empty() {
            return Err(AppError::internal("no Wi-Fi interface available"));
        }

        let mut command = format!(
            "LC_ALL=C nmcli --wait 12 dev wifi connect {} ifname {}",
            shell_quote(ssid),
            shell_quote(interface)
        );

        if let Some(password) = password.map(str::trim).filter(|p| !p.is_empty()) {
            command.push_str(&format!(" password {}", shell_quote(password)));
        }

        self.runner
            .run(CommandRequest::new(command).timeout(Duration::from_secs(15)))
            .await
            .map_err(|err| AppError::internal(format!("failed to connect to `{ssid}`: {err}")))?;
        Ok(())
    }
}

fn parse_table_line(raw: &str) -> Vec<&str> {
    raw.split('|').map(str::trim).collect()
}

/// Parses `nmcli device status` output, keeping real Wi-Fi interfaces only.
pub fn parse_interfaces(raw: &str) -> Vec<WifiInterface> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_table_line)
        .filter(|parts| parts.len() >= 4)
        .filter(|parts| parts[1] == "wifi")
        .filter(|parts| !parts[0].starts_with("p2p-"))
        .map(|parts| WifiInterface {
            device: parts[0].to_string(),
            state: parts[2].to_string(),
            connection: parts[3].to_string(),
        })
        .collect()
}

/// Parses `nmcli dev wifi list` output into a deduplicated, sorted list.
///
/// Duplicate SSIDs keep the in-use entry, then the strongest signal. The
/// final order is in-use first, then signal descending, then display name.
pub fn parse_networks(raw: &str) -> Vec<WifiNetwork> {
    let mut deduped: HashMap<String, WifiNetwork> = HashMap::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts = parse_table_line(line);
        if parts.len() < 5 {
            continue;
        }

        let in_use = parts[0] == "*" || parts[0].eq_ignore_ascii_case("yes");
        let ssid = parts[1].to_string();
        let display_name = if ssid.is_empty() {
            HIDDEN_SSID_LABEL.to_string()
        } else {
            ssid.clone()
        };
        let signal = clamp_percent(parts[2].trim().parse::<i64>().unwrap_or(0));
        let security = if parts[3] == "--" { "" } else { parts[3] }.to_string();

        let key = if ssid.is_empty() {
            format!("hidden:{display_name}")
        } else {
            ssid.clone()
        };

        let candidate = WifiNetwork {
            ssid,
            display_name,
            signal,
            security,
            bars: parts[4].to_string(),
            in_use,
        };

        match deduped.get(&key) {
            None => {
                deduped.insert(key, candidate);
            }
            Some(previous) => {
                if (candidate.in_use && !previous.in_use)
                    || (candidate.in_use == previous.in_use && candidate.signal > previous.signal)
                {
                    deduped.insert(key, candidate);
                }
            }
        }
    }

    let mut networks: Vec<WifiNetwork> = deduped.into_values().collect();
    networks.sort_by(|a, b| {
        b.in_use
            .cmp(&a.in_use)
            .then(b.signal.cmp(&a.signal))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    use crate::test_utils::FakeRunner;

    const DEVICE_STATUS: &str = "\
wlan0|wifi|connected|home-net
p2p-dev-wlan0|wifi-p2p|disconnected|--
eth0|ethernet|connected|wired
wlan1|wifi|disconnected|--
";

    const WIFI_LIST: &str = "\
*|home-net|82|WPA2|▂▄▆█
 |cafe|40|WPA2|▂▄__
 |home-net|67|WPA2|▂▄▆_
 ||55|WPA2|▂▄▆_
 |cafe|71|WPA2|▂▄▆_
 |open-net|40|--|▂▄__
";

    #[test]
    fn interfaces_filter_type_and_p2p() {
        let interfaces = parse_interfaces(DEVICE_STATUS);
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].device, "wlan0");
        assert_eq!(interfaces[1].device, "wlan1");
    }

    #[test]
    fn networks_dedupe_prefers_in_use_then_signal() {
        let networks = parse_networks(WIFI_LIST);

        let home = networks
            .iter()
            .find(|n| n.ssid == "home-net")
            .expect("home-net present");
        assert!(home.in_use, "in-use entry must win over stronger signal");
        assert_eq!(home.signal, 82);

        let cafe = networks.iter().find(|n| n.ssid == "cafe").expect("cafe");
        assert_eq!(cafe.signal, 71);
    }

    #[test]
    fn networks_sort_in_use_signal_name() {
        let networks = parse_networks(WIFI_LIST);
        let order: Vec<&str> = networks.iter().map(|n| n.display_name.as_str()).collect();
        assert_eq!(order, vec!["home-net", "cafe", "(hidden)", "open-net"]);
    }

    #[test]
    fn hidden_and_open_networks() {
        let networks = parse_networks(WIFI_LIST);

        let hidden = networks
            .iter()
            .find(|n| n.ssid.is_empty())
            .expect("hidden network kept");
        assert_eq!(hidden.display_name, HIDDEN_SSID_LABEL);

        let open = networks.iter().find(|n| n.ssid == "open-net").expect("open");
        assert_eq!(open.security, "");
        assert!(!open.needs_password());
    }

    #[test]
    fn malformed_output_yields_empty_lists() {
        assert!(parse_interfaces("garbage\nmore garbage").is_empty());
        assert!(parse_networks("no pipes here\n\n??").is_empty());
    }

    #[test]
    fn read_degrades_to_previous_networks() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.fail(
            "nmcli -t -f WIFI g",
            shellstate_proto::ports::CommandError::failed("nmcli missing"),
        );

        let service = NetworkService::new(runner);
        let previous = parse_networks(WIFI_LIST);

        let snapshot = runtime.block_on(service.read(ReadWifiOptions {
            skip_networks: false,
            previous_networks: previous.clone(),
        }));

        assert!(!snapshot.radio_enabled);
        assert!(snapshot.interfaces.is_empty());
        assert_eq!(snapshot.networks, previous);
    }

    #[test]
    fn read_assembles_snapshot() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("nmcli -t -f WIFI g", "enabled\n");
        runner.respond("device status", DEVICE_STATUS);
        runner.respond("dev wifi list", WIFI_LIST);

        let service = NetworkService::new(runner);
        let snapshot = runtime.block_on(service.read(ReadWifiOptions::default()));

        assert!(snapshot.radio_enabled);
        assert_eq!(snapshot.primary_interface, "wlan0");
        assert_eq!(snapshot.current_connection, "home-net");
        assert_eq!(snapshot.networks.len(), 4);
        assert!(snapshot.networks[0].in_use);
    }

    #[test]
    fn scan_failure_keeps_previous_list() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("nmcli -t -f WIFI g", "enabled\n");
        runner.respond("device status", DEVICE_STATUS);
        runner.fail(
            "dev wifi list",
            shellstate_proto::ports::CommandError::failed("scan failed"),
        );

        let previous = vec![WifiNetwork {
            ssid: "old".into(),
            display_name: "old".into(),
            signal: 10,
            security: "WPA2".into(),
            bars: "▂___".into(),
            in_use: false,
        }];

        let service = NetworkService::new(runner);
        let snapshot = runtime.block_on(service.read(ReadWifiOptions {
            skip_networks: false,
            previous_networks: previous.clone(),
        }));

        assert!(snapshot.radio_enabled);
        assert_eq!(snapshot.networks, previous);
    }
}
