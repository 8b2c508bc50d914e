use serde::{Deserialize, Serialize};

/// A device known to `bluetoothctl`, merged from the plain, paired and
/// connected device listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    /// Upper-cased MAC address.
    pub mac: String,
    /// Advertised name; falls back to the MAC when empty.
    pub name: String,
    pub paired: bool,
    pub connected: bool,
}

/// Last-known controller and device state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BluetoothSnapshot {
    /// Controller alias from `bluetoothctl show`.
    pub controller_name: String,
    pub powered: bool,
    pub discovering: bool,
    /// Sorted: connected first, then paired, then by name.
    pub devices: Vec<BluetoothDevice>,
}
