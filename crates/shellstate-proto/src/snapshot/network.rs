use serde::{Deserialize, Serialize};

/// A Wi-Fi capable interface as reported by `nmcli device status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiInterface {
    pub device: String,
    pub state: String,
    pub connection: String,
}

impl WifiInterface {
    /// Whether the interface state counts as connected.
    ///
    /// `nmcli` reports transitional states like `connecting` and negative
    /// states like `disconnected`; only a plain connected state qualifies.
    pub fn is_connected(&self) -> bool {
        let state = self.state.to_lowercase();
        state.contains("connected") && !state.contains("disconnected")
    }
}

/// A visible access point, deduplicated by SSID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    /// Raw SSID; empty for hidden networks.
    pub ssid: String,
    /// SSID or a placeholder for hidden networks.
    pub display_name: String,
    /// Signal strength, clamped to `0..=100`.
    pub signal: u8,
    /// Security descriptor; empty when the network is open.
    pub security: String,
    /// Textual bar gauge as printed by `nmcli`.
    pub bars: String,
    pub in_use: bool,
}

impl WifiNetwork {
    /// Whether connecting to this network requires a password prompt.
    pub fn needs_password(&self) -> bool {
        !self.security.trim().is_empty()
    }
}

/// Last-known Wi-Fi state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiSnapshot {
    pub radio_enabled: bool,
    pub interfaces: Vec<WifiInterface>,
    /// Device name of the connected (or first) Wi-Fi interface.
    pub primary_interface: String,
    /// Active connection name on the primary interface, if any.
    pub current_connection: String,
    pub networks: Vec<WifiNetwork>,
}

impl WifiSnapshot {
    /// The degraded shape: radio off, nothing known, but the previously
    /// scanned network list is preserved to avoid list flicker.
    pub fn empty_keeping(networks: Vec<WifiNetwork>) -> Self {
        Self {
            networks,
            ..Self::default()
        }
    }
}
