//! Records exchanged with callers of the engine.
//!
//! All of them are snapshots: they are rebuilt from live host state on every
//! call and never cached. The serde names are the JSON wire format of the
//! HTTP surface.

use serde::{Deserialize, Serialize};

use crate::error::{NetConfigError, Result};

/// DNS list sentinel: the query ran but no resolver is configured.
pub const DNS_NONE: &str = "none";
/// DNS list sentinel: the query itself could not be executed.
pub const DNS_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    #[default]
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    #[default]
    Ethernet,
    Wireless,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub status: LinkStatus,
    /// Network the wireless adapter is currently associated with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_ssid: Option<String>,
    pub dhcp_enabled: bool,
    pub ipv4_config: Ipv4Config,
    pub ipv6_config: Ipv6Config,
    pub hardware: HardwareDescriptor,
    pub driver: DriverDescriptor,
}

impl InterfaceRecord {
    pub fn is_wireless(&self) -> bool {
        self.hardware.adapter_type == AdapterType::Wireless
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipv4Config {
    pub ip: String,
    pub mask: String,
    pub gateway: String,
    /// Resolvers in priority order, or a single [`DNS_NONE`] /
    /// [`DNS_UNAVAILABLE`] sentinel.
    pub dns: Vec<String>,
    pub dhcp: bool,
    #[serde(rename = "dnsAuto")]
    pub dns_auto: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipv6Config {
    pub ip: String,
    pub prefix_len: u8,
    pub gateway: String,
    pub dns: Vec<String>,
}

/// Requested interface change. An absent family is left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub ipv4_config: Option<Ipv4Config>,
    #[serde(default)]
    pub ipv6_config: Option<Ipv6Config>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareDescriptor {
    pub mac_address: String,
    pub manufacturer: String,
    pub product_name: String,
    pub adapter_type: AdapterType,
    pub physical_media: String,
    /// Free text, e.g. "1000 Mbps" or "Rx: 866 Mbps, Tx: 780 Mbps".
    pub speed: String,
    pub bus_type: String,
    pub pnp_device_id: String,
}

impl HardwareDescriptor {
    /// Descriptor carrying nothing but the OS-reported MAC address.
    pub fn minimal(mac_address: impl Into<String>) -> Self {
        HardwareDescriptor {
            mac_address: mac_address.into(),
            ..Default::default()
        }
    }

    /// Records without a MAC or a product name are not real adapters.
    pub fn is_usable(&self) -> bool {
        !self.mac_address.is_empty() && !self.product_name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverDescriptor {
    pub name: String,
    pub version: String,
    pub provider: String,
    /// ISO date (YYYY-MM-DD) or "Unknown".
    pub date_installed: String,
    pub status: String,
    pub path: String,
}

/// Light-weight listing entry used by the fast interface listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSummary {
    pub name: String,
    pub status: LinkStatus,
    #[serde(rename = "productName")]
    pub product_name: String,
}

/// One access point seen by a Wi-Fi scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiScanRecord {
    pub ssid: String,
    /// Signal quality as a percentage (0-100).
    pub signal_strength: u8,
    pub security: String,
    pub bssid: String,
    pub channel: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotStatus {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "SSID")]
    pub ssid: String,
    #[serde(rename = "Authentication")]
    pub authentication: String,
    #[serde(rename = "Encryption")]
    pub encryption: String,
    #[serde(rename = "MaxClientCount")]
    pub max_client_count: u32,
    #[serde(rename = "ClientsCount")]
    pub clients_count: u32,
}

pub const SSID_MAX_LEN: usize = 32;
pub const PASSPHRASE_MIN_LEN: usize = 8;
pub const PASSPHRASE_MAX_LEN: usize = 63;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotspotConfigRequest {
    pub ssid: String,
    #[serde(rename = "password")]
    pub passphrase: String,
    /// Enable the hotspot once the configuration has been applied.
    #[serde(default, rename = "enabled")]
    pub enable: bool,
}

impl HotspotConfigRequest {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>, enable: bool) -> Self {
        HotspotConfigRequest {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
            enable,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ssid_len = self.ssid.chars().count();
        if ssid_len == 0 || ssid_len > SSID_MAX_LEN {
            return Err(NetConfigError::Validation(format!(
                "SSID must be 1-{} characters, got {}",
                SSID_MAX_LEN, ssid_len
            )));
        }

        let pass_len = self.passphrase.chars().count();
        if !(PASSPHRASE_MIN_LEN..=PASSPHRASE_MAX_LEN).contains(&pass_len) {
            return Err(NetConfigError::Validation(format!(
                "passphrase must be {}-{} characters, got {}",
                PASSPHRASE_MIN_LEN, PASSPHRASE_MAX_LEN, pass_len
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityResult {
    pub target: String,
    pub success: bool,
    pub status_code: u16,
    pub duration_ms: u64,
    /// Empty on success.
    pub error: String,
}
