//! Bluetooth state over `bluetoothctl`.
//!
//! `bluetoothctl` decorates its output with ANSI colour codes, carriage
//! returns and interactive `[prompt]>` prefixes even in batch mode, so every
//! read scrubs the output before parsing. Actions tolerate a per-action
//! allow-list of benign errors ("already paired" and friends).

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
    time::Duration,
};

use log::warn;
use masterror::{AppError, AppResult};
use regex::Regex;
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::bluetooth::{BluetoothDevice, BluetoothSnapshot},
};

use crate::runner::shell_quote;

fn ansi_escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").expect("valid pattern"))
}

fn prompt_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[[^\]]+\]>\s*").expect("valid pattern"))
}

fn device_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Device\s+([0-9A-F:]{17})\s+(.+)$").expect("valid pattern"))
}

fn known_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)failed|error|not available|no default controller|invalid|not ready")
            .expect("valid pattern")
    })
}

/// Strips ANSI escapes, CRs and interactive prompt prefixes.
pub fn scrub_output(raw: &str) -> String {
    let without_escapes = ansi_escape_re().replace_all(raw, "");
    let normalized = without_escapes.replace('\r', "\n");

    normalized
        .lines()
        .map(|line| prompt_prefix_re().replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First line that looks like an actual error, or the whole output.
fn useful_error_line(output: &str) -> String {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| known_error_re().is_match(line))
        .unwrap_or_else(|| output.trim());

    if line.is_empty() {
        "bluetooth operation failed".to_string()
    } else {
        line.to_string()
    }
}

/// Parses `Device <MAC> <name>` lines into a MAC → name map.
fn parse_device_lines(raw: &str) -> HashMap<String, String> {
    let mut devices = HashMap::new();

    for line in raw.lines() {
        let Some(captures) = device_line_re().captures(line) else {
            continue;
        };

        let mac = captures[1].to_uppercase();
        let name = captures[2].trim();
        let name = if name.is_empty() {
            mac.clone()
        } else {
            name.to_string()
        };
        devices.insert(mac, name);
    }

    devices
}

#[derive(Clone)]
pub struct BluetoothService {
    runner: Arc<dyn CommandRunner>,
}

impl BluetoothService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn read_command(&self, args: &str) -> String {
        let request = CommandRequest::new(format!("timeout 5s bluetoothctl {args} 2>&1 || true"))
            .timeout(Duration::from_secs(7))
            .allow_failure();

        match self.runner.run(request).await {
            Ok(raw) => scrub_output(&raw),
            Err(err) => {
                warn!("bluetoothctl {args} failed: {err}");
                String::new()
            }
        }
    }

    /// Reads controller and device state; degrades to the empty snapshot.
    pub async fn read(&self) -> BluetoothSnapshot {
        let (show_raw, devices_raw, paired_raw, connected_raw) = tokio::join!(
            self.read_command("show"),
            self.read_command("devices"),
            self.read_command("devices Paired"),
            self.read_command("devices Connected"),
        );

        let powered = show_raw
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case("Powered: yes"));
        let discovering = show_raw
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case("Discovering: yes"));
        let controller_name = show_raw
            .lines()
            .find_map(|line| line.strip_prefix("Alias:"))
            .map(|alias| alias.trim().to_string())
            .unwrap_or_default();

        let mut all = parse_device_lines(&devices_raw);
        let paired = parse_device_lines(&paired_raw);
        let connected = parse_device_lines(&connected_raw);

        // The plain listing can omit devices the filtered listings know.
        for (mac, name) in paired.iter().chain(connected.iter()) {
            all.entry(mac.clone()).or_insert_with(|| name.clone());
        }

        let mut devices: Vec<BluetoothDevice> = all
            .into_iter()
            .map(|(mac, name)| BluetoothDevice {
                paired: paired.contains_key(&mac),
                connected: connected.contains_key(&mac),
                mac,
                name,
            })
            .collect();

        devices.sort_by(|a, b| {
            b.connected
                .cmp(&a.connected)
                .then(b.paired.cmp(&a.paired))
                .then_with(|| a.name.cmp(&b.name))
        });

        BluetoothSnapshot {
            controller_name,
            powered,
            discovering,
            devices,
        }
    }

    async fn action(
        &self,
        args: String,
        timeout_secs: u64,
        allowed_errors: &[&str],
    ) -> AppResult<()> {
        let request = CommandRequest::new(format!(
            "timeout {timeout_secs}s bluetoothctl {args} 2>&1"
        ))
        .timeout(Duration::from_secs(timeout_secs + 2));

        let output = match self.runner.run(request).await {
            Ok(output) => scrub_output(&output),
            Err(err) => {
                return Err(AppError::internal(useful_error_line(&scrub_output(
                    &err.to_string(),
                ))));
            }
        };

        if !known_error_re().is_match(&output) {
            return Ok(());
        }

        let tolerated = allowed_errors.iter().any(|pattern| {
            Regex::new(&format!("(?i){pattern}"))
                .map(|re| re.is_match(&output))
                .unwrap_or(false)
        });

        if tolerated {
            Ok(())
        } else {
            Err(AppError::internal(useful_error_line(&output)))
        }
    }

    pub async fn set_power(&self, enabled: bool) -> AppResult<()> {
        let mode = if enabled { "on" } else { "off" };
        self.action(format!("power {mode}"), 8, &[]).await
    }

    pub async fn set_scan(&self, enabled: bool) -> AppResult<()> {
        let mode = if enabled { "on" } else { "off" };
        self.action(format!("scan {mode}"), 8, &[]).await
    }

    /// Pairs and then trusts a device; repeat pairing is tolerated.
    pub async fn pair_and_trust(&self, mac: &str) -> AppResult<()> {
        let mac = clean_mac(mac)?;
        self.action(
            format!("pair {}", shell_quote(&mac)),
            20,
            &["AlreadyExists", "already paired"],
        )
        .await?;
        self.action(format!("trust {}", shell_quote(&mac)), 8, &[])
            .await
    }

    pub async fn connect(&self, mac: &str) -> AppResult<()> {
        let mac = clean_mac(mac)?;
        self.action(
            format!("connect {}", shell_quote(&mac)),
            15,
            &["already connected"],
        )
        .await
    }

    pub async fn disconnect(&self, mac: &str) -> AppResult<()> {
        let mac = clean_mac(mac)?;
        self.action(
            format!("disconnect {}", shell_quote(&mac)),
            10,
            &["not connected"],
        )
        .await
    }

    pub async fn remove(&self, mac: &str) -> AppResult<()> {
        let mac = clean_mac(mac)?;
        self.action(format!("remove {}", shell_quote(&mac)), 8, &[])
            .await
    }
}

fn clean_mac(mac: &str) -> AppResult<String> {
    let mac = mac.trim().to_uppercase();
    if mac.is_empty() {
        return Err(AppError::internal("MAC address must not be blank"));
    }
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    use crate::test_utils::FakeRunner;

    const SHOW: &str = "\
Controller AA:BB:CC:DD:EE:FF (public)
\tName: host
\tAlias: workstation
\tPowered: yes
\tDiscovering: no
";

    #[test]
    fn scrubbing_removes_ansi_and_prompts() {
        let raw = "\x1B[0;94m[bluetooth]>\x1B[0m Device AA:BB:CC:DD:EE:11 Keyboard\r\n";
        assert_eq!(scrub_output(raw), "Device AA:BB:CC:DD:EE:11 Keyboard");
    }

    #[test]
    fn device_lines_parse_and_uppercase() {
        let devices = parse_device_lines(
            "Device aa:bb:cc:dd:ee:11 Keyboard\nDevice AA:BB:CC:DD:EE:22 Headphones\nnoise",
        );
        assert_eq!(devices.len(), 2);
        assert_eq!(devices.get("AA:BB:CC:DD:EE:11").map(String::as_str), Some("Keyboard"));
    }

    #[test]
    fn useful_error_line_prefers_matches() {
        let output = "Attempting to connect\nFailed to connect: org.bluez.Error.Failed\ndone";
        assert_eq!(
            useful_error_line(output),
            "Failed to connect: org.bluez.Error.Failed"
        );
        assert_eq!(useful_error_line(""), "bluetooth operation failed");
    }

    #[test]
    fn read_merges_and_sorts_devices() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("devices Paired", "Device AA:BB:CC:DD:EE:11 Keyboard\n");
        runner.respond(
            "devices Connected",
            "Device AA:BB:CC:DD:EE:22 Headphones\n",
        );
        runner.respond(
            "bluetoothctl devices 2>&1",
            "Device AA:BB:CC:DD:EE:33 Mouse\nDevice AA:BB:CC:DD:EE:11 Keyboard\n",
        );
        runner.respond("bluetoothctl show", SHOW);

        let service = BluetoothService::new(runner);
        let snapshot = runtime.block_on(service.read());

        assert_eq!(snapshot.controller_name, "workstation");
        assert!(snapshot.powered);
        assert!(!snapshot.discovering);

        let order: Vec<(&str, bool, bool)> = snapshot
            .devices
            .iter()
            .map(|d| (d.name.as_str(), d.connected, d.paired))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Headphones", true, false),
                ("Keyboard", false, true),
                ("Mouse", false, false),
            ]
        );
    }

    #[test]
    fn read_degrades_to_empty_snapshot() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        // No stubs: every command resolves empty via allow_failure.

        let service = BluetoothService::new(runner);
        let snapshot = runtime.block_on(service.read());
        assert_eq!(snapshot, BluetoothSnapshot::default());
    }

    #[test]
    fn allowed_errors_are_tolerated() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("connect", "Failed to connect: already connected\n");

        let service = BluetoothService::new(runner);
        let result = runtime.block_on(service.connect("aa:bb:cc:dd:ee:11"));
        assert!(result.is_ok());
    }

    #[test]
    fn unexpected_errors_surface() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("connect", "Failed to connect: org.bluez.Error.Failed\n");

        let service = BluetoothService::new(runner);
        let result = runtime.block_on(service.connect("aa:bb:cc:dd:ee:11"));
        assert!(result.is_err());
    }

    #[test]
    fn blank_mac_is_rejected() {
        let runtime = Runtime::new().expect("runtime");
        let service = BluetoothService::new(Arc::new(FakeRunner::new()));
        assert!(runtime.block_on(service.connect("   ")).is_err());
    }
}
