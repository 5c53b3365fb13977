//! Hardware and driver descriptors, and the currently associated SSID.

use std::fs;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{NetConfigError, Result};
use crate::links::format_mac;
use crate::models::{AdapterType, DriverDescriptor, HardwareDescriptor};
use crate::parse;
use crate::platform::Platform;
use crate::runner::{CommandRunner, ps_quote, run_powershell, run_text};

const WIRELESS_MARKERS: &[&str] = &["wireless", "wi-fi", "wlan", "802.11"];

/// Naming heuristic for wireless interfaces ("Wi-Fi", "WLAN 2", "wlp3s0").
pub fn looks_wireless(platform: Platform, name: &str) -> bool {
    let lower = name.to_lowercase();
    WIRELESS_MARKERS[..3].iter().any(|m| lower.contains(m))
        || (platform == Platform::Linux && lower.starts_with("wl"))
}

fn product_is_wireless(product: &str) -> bool {
    let lower = product.to_lowercase();
    WIRELESS_MARKERS.iter().any(|m| lower.contains(m))
}

fn media_for(adapter_type: AdapterType) -> String {
    match adapter_type {
        AdapterType::Wireless => "802.11 Wireless".to_string(),
        AdapterType::Ethernet => "Ethernet".to_string(),
    }
}

/// Hardware lookup that failed on every source.
#[derive(Debug, Clone)]
pub struct HardwareFailure {
    /// Descriptor holding only the OS-reported MAC address.
    pub minimal: HardwareDescriptor,
    pub detail: String,
}

/// Resolves the hardware descriptor of an interface.
///
/// The primary structured query is tried first. If it fails and the name
/// looks like a wireless adapter, the wireless status dump is consulted.
/// When both fail the caller gets a minimal descriptor and the reason.
pub fn resolve_hardware(
    runner: &dyn CommandRunner,
    platform: Platform,
    name: &str,
    os_mac: &str,
) -> std::result::Result<HardwareDescriptor, HardwareFailure> {
    let primary = match platform {
        Platform::Windows => windows_adapter(runner, name),
        Platform::Linux => udev_adapter(runner, name),
        Platform::Other => Err(NetConfigError::UnsupportedPlatform(
            "hardware lookup".to_string(),
        )),
    };

    let primary_err = match primary {
        Ok(hw) => return Ok(with_mac(hw, os_mac)),
        Err(e) => e,
    };
    debug!("Primary hardware query for {} failed: {}", name, primary_err);

    let mut detail = primary_err.to_string();
    if looks_wireless(platform, name) {
        let fallback = match platform {
            Platform::Windows => wlan_dump_adapter(runner, name),
            _ => nmcli_adapter(runner, name),
        };
        match fallback {
            Ok(hw) => return Ok(with_mac(hw, os_mac)),
            Err(e) => {
                debug!("Wireless hardware fallback for {} failed: {}", name, e);
                detail = format!("{}; wireless fallback: {}", detail, e);
            }
        }
    }

    warn!("Hardware details for {} unavailable: {}", name, detail);
    Err(HardwareFailure {
        minimal: HardwareDescriptor::minimal(os_mac),
        detail,
    })
}

fn with_mac(mut hw: HardwareDescriptor, os_mac: &str) -> HardwareDescriptor {
    hw.mac_address = format_mac(&hw.mac_address);
    if hw.mac_address.is_empty() {
        hw.mac_address = os_mac.to_string();
    }
    hw
}

/// PowerShell's ConvertTo-Json prints a bare object for one match and an
/// array for several.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn first_json<T: DeserializeOwned>(output: &str, what: &str) -> Result<T> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(NetConfigError::query(what, "no matching object"));
    }
    let parsed: OneOrMany<T> =
        serde_json::from_str(trimmed).map_err(|e| NetConfigError::query(what, e.to_string()))?;
    match parsed {
        OneOrMany::One(item) => Ok(item),
        OneOrMany::Many(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| NetConfigError::query(what, "no matching object")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Win32Adapter {
    #[serde(rename = "MACAddress")]
    mac_address: Option<String>,
    manufacturer: Option<String>,
    product_name: Option<String>,
    speed: Option<u64>,
    #[serde(rename = "PNPDeviceID")]
    pnp_device_id: Option<String>,
    caption: Option<String>,
}

fn adapter_filter(name: &str) -> String {
    let quoted = ps_quote(name);
    format!(
        "Where-Object {{ $_.NetConnectionID -eq {} -or $_.Name -eq {} }}",
        quoted, quoted
    )
}

fn windows_adapter(runner: &dyn CommandRunner, name: &str) -> Result<HardwareDescriptor> {
    let script = format!(
        "Get-CimInstance Win32_NetworkAdapter | {} | Select-Object MACAddress,Manufacturer,ProductName,Speed,PNPDeviceID,Caption | ConvertTo-Json -Depth 1",
        adapter_filter(name)
    );
    let output = run_powershell(runner, &script)?;
    let adapter: Win32Adapter = first_json(&output, "network adapter")?;

    let product_name = adapter.product_name.unwrap_or_default();
    let pnp_device_id = adapter.pnp_device_id.unwrap_or_default();
    let adapter_type = if product_is_wireless(&product_name) {
        AdapterType::Wireless
    } else {
        AdapterType::Ethernet
    };

    Ok(HardwareDescriptor {
        mac_address: adapter.mac_address.unwrap_or_default(),
        manufacturer: adapter.manufacturer.unwrap_or_default(),
        adapter_type,
        physical_media: media_for(adapter_type),
        speed: format_speed_bps(adapter.speed),
        bus_type: bus_type(adapter.caption.as_deref().unwrap_or_default(), &pnp_device_id),
        product_name,
        pnp_device_id,
    })
}

fn format_speed_bps(bps: Option<u64>) -> String {
    match bps {
        Some(bps) if bps > 0 => format!("{} Mbps", bps / 1_000_000),
        _ => "Unknown".to_string(),
    }
}

/// Bus from the adapter caption, else from the device-id enumerator prefix
/// (`PCI\VEN_8086...`, `USB\VID_0BDA...`).
fn bus_type(caption: &str, device_id: &str) -> String {
    for bus in ["PCI", "USB"] {
        if caption.contains(bus) {
            return bus.to_string();
        }
    }
    device_id
        .split(['\\', '/'])
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

fn wlan_dump_adapter(runner: &dyn CommandRunner, name: &str) -> Result<HardwareDescriptor> {
    let output = run_text(runner, "netsh", &["wlan", "show", "interfaces"])?;
    parse::parse_wlan_interfaces(&output)
        .into_iter()
        .find(|block| block.name == name)
        .map(|block| block.to_hardware())
        .ok_or_else(|| NetConfigError::query("wireless interface status", format!("{} not listed", name)))
}

fn udev_adapter(runner: &dyn CommandRunner, name: &str) -> Result<HardwareDescriptor> {
    let path = format!("--path=/sys/class/net/{}", name);
    let output = run_text(runner, "udevadm", &["info", "--query=property", &path])?;
    let props = parse::parse_properties(&output);
    let get = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| props.get(*k).filter(|v| !v.is_empty()).cloned())
            .unwrap_or_default()
    };

    let product_name = get(&["ID_MODEL_FROM_DATABASE", "ID_MODEL"]);
    if product_name.is_empty() {
        return Err(NetConfigError::query(
            "device properties",
            format!("{} has no device model", name),
        ));
    }

    let adapter_type = if get(&["DEVTYPE"]) == "wlan" || product_is_wireless(&product_name) {
        AdapterType::Wireless
    } else {
        AdapterType::Ethernet
    };
    let id_path = get(&["ID_PATH"]);
    let bus = match get(&["ID_BUS"]) {
        bus if !bus.is_empty() => bus.to_uppercase(),
        _ if id_path.starts_with("pci-") => "PCI".to_string(),
        _ => String::new(),
    };

    Ok(HardwareDescriptor {
        mac_address: String::new(),
        manufacturer: get(&["ID_VENDOR_FROM_DATABASE", "ID_VENDOR"]),
        product_name,
        adapter_type,
        physical_media: media_for(adapter_type),
        speed: sysfs_speed(name),
        bus_type: bus,
        pnp_device_id: if id_path.is_empty() { get(&["DEVPATH"]) } else { id_path },
    })
}

fn sysfs_speed(name: &str) -> String {
    fs::read_to_string(format!("/sys/class/net/{}/speed", name))
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|mbps| *mbps > 0)
        .map(|mbps| format!("{} Mbps", mbps))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn nmcli_adapter(runner: &dyn CommandRunner, name: &str) -> Result<HardwareDescriptor> {
    let output = run_text(runner, "nmcli", &["-t", "-f", "GENERAL", "device", "show", name])?;
    let fields = parse::parse_nmcli_fields(&output);
    let get = |key: &str| fields.get(key).cloned().unwrap_or_default();

    let product_name = match get("GENERAL.PRODUCT") {
        product if !product.is_empty() => product,
        _ => get("GENERAL.DRIVER"),
    };
    if product_name.is_empty() {
        return Err(NetConfigError::query(
            "device details",
            format!("{} has no product information", name),
        ));
    }

    Ok(HardwareDescriptor {
        mac_address: get("GENERAL.HWADDR"),
        manufacturer: get("GENERAL.VENDOR"),
        product_name,
        adapter_type: AdapterType::Wireless,
        physical_media: media_for(AdapterType::Wireless),
        speed: sysfs_speed(name),
        bus_type: String::new(),
        pnp_device_id: String::new(),
    })
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PnpSignedDriver {
    driver_version: Option<String>,
    driver_provider: Option<String>,
    driver_date: Option<String>,
    device_name: Option<String>,
    inf_name: Option<String>,
}

/// Driver details for an interface.
pub fn resolve_driver(
    runner: &dyn CommandRunner,
    platform: Platform,
    name: &str,
) -> Result<DriverDescriptor> {
    match platform {
        Platform::Windows => windows_driver(runner, name),
        Platform::Linux => linux_driver(runner, name),
        Platform::Other => Err(NetConfigError::UnsupportedPlatform(
            "driver lookup".to_string(),
        )),
    }
}

/// Descriptor used when no driver source answered.
pub fn unknown_driver(name: &str) -> DriverDescriptor {
    DriverDescriptor {
        name: name.to_string(),
        date_installed: "Unknown".to_string(),
        ..Default::default()
    }
}

fn windows_driver(runner: &dyn CommandRunner, name: &str) -> Result<DriverDescriptor> {
    let script = format!(
        "$adapter = Get-CimInstance Win32_NetworkAdapter | {} | Select-Object -First 1; \
         if (-not $adapter) {{ throw 'adapter not found' }}; \
         Get-CimInstance Win32_PnPSignedDriver | Where-Object {{ $_.DeviceID -eq $adapter.PNPDeviceID }} | \
         Select-Object DriverVersion,DriverProvider,DriverDate,DeviceName,InfName | ConvertTo-Json -Depth 1",
        adapter_filter(name)
    );
    let output = run_powershell(runner, &script)?;
    let driver: PnpSignedDriver = first_json(&output, "signed driver")?;

    Ok(DriverDescriptor {
        name: driver.device_name.unwrap_or_default(),
        version: driver.driver_version.unwrap_or_default(),
        provider: driver.driver_provider.unwrap_or_default(),
        date_installed: cim_date(driver.driver_date.as_deref().unwrap_or_default()),
        status: "OK".to_string(),
        path: driver.inf_name.unwrap_or_default(),
    })
}

/// Converts a CIM datetime (`20230415000000.******+000`) to `YYYY-MM-DD`.
pub fn cim_date(raw: &str) -> String {
    raw.get(..8)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y%m%d").ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn linux_driver(runner: &dyn CommandRunner, name: &str) -> Result<DriverDescriptor> {
    let output = run_text(runner, "ethtool", &["-i", name])?;
    let fields = parse::parse_colon_fields(&output);
    let get = |key: &str| fields.get(key).cloned().unwrap_or_default();

    let driver = get("driver");
    if driver.is_empty() {
        return Err(NetConfigError::query("driver", format!("no driver bound to {}", name)));
    }

    let path = fs::canonicalize(format!("/sys/class/net/{}/device/driver", name))
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    Ok(DriverDescriptor {
        name: driver,
        version: get("version"),
        provider: get("firmware-version"),
        date_installed: "Unknown".to_string(),
        status: "OK".to_string(),
        path,
    })
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

/// SSID the wireless interface is associated with, if any.
pub fn connected_ssid(
    runner: &dyn CommandRunner,
    platform: Platform,
    name: &str,
) -> Result<Option<String>> {
    match platform {
        Platform::Windows => {
            let output = run_text(runner, "netsh", &["wlan", "show", "interfaces"])?;
            Ok(parse::parse_wlan_interfaces(&output)
                .into_iter()
                .find(|block| block.name == name)
                .map(|block| block.ssid)
                .filter(|ssid| !ssid.is_empty()))
        }
        Platform::Linux => {
            let output = run_text(
                runner,
                "nmcli",
                &["-t", "-f", "ACTIVE,SSID", "device", "wifi", "list", "ifname", name],
            )?;
            Ok(parse::parse_active_ssid(&output))
        }
        Platform::Other => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use crate::runner::fake::ScriptedRunner;

    const ADAPTER_JSON: &str = r#"{
        "MACAddress": "8C:C6:81:AA:BB:CC",
        "Manufacturer": "Intel Corporation",
        "ProductName": "Intel(R) Wi-Fi 6 AX201 160MHz",
        "Speed": 866700000,
        "PNPDeviceID": "PCI\\VEN_8086&DEV_A0F0",
        "Caption": "[00000001] Intel(R) Wi-Fi 6 AX201 160MHz"
    }"#;

    #[test]
    fn windows_primary_query() {
        let runner = ScriptedRunner::new()
            .on_script("Win32_NetworkAdapter", CommandOutput::ok(ADAPTER_JSON));
        let hw = resolve_hardware(&runner, Platform::Windows, "Wi-Fi", "").unwrap();
        assert_eq!(hw.mac_address, "8C:C6:81:AA:BB:CC");
        assert_eq!(hw.adapter_type, AdapterType::Wireless);
        assert_eq!(hw.speed, "866 Mbps");
        assert_eq!(hw.bus_type, "PCI");
        assert_eq!(hw.physical_media, "802.11 Wireless");
    }

    #[test]
    fn windows_primary_query_array_and_nulls() {
        let json = r#"[{"MACAddress":"00:15:5D:01:02:03","ProductName":"Realtek PCIe GbE Family Controller","Speed":null,"PNPDeviceID":"USB\\VID_0BDA"},{"ProductName":"other"}]"#;
        let runner = ScriptedRunner::new().on_script("Win32_NetworkAdapter", CommandOutput::ok(json));
        let hw = resolve_hardware(&runner, Platform::Windows, "Ethernet", "").unwrap();
        assert_eq!(hw.adapter_type, AdapterType::Ethernet);
        assert_eq!(hw.speed, "Unknown");
        assert_eq!(hw.bus_type, "USB");
        assert_eq!(hw.manufacturer, "");
    }

    #[test]
    fn wireless_fallback_to_status_dump() {
        let dump = "\
    Name                   : Wi-Fi
    Description            : MediaTek Wi-Fi 6 MT7921 Wireless LAN Card
    Physical address       : 00:0a:f5:11:22:33
";
        let runner = ScriptedRunner::new()
            .on_script("Win32_NetworkAdapter", CommandOutput::failed("Access denied"))
            .on_ok("netsh wlan show interfaces", dump);
        let hw = resolve_hardware(&runner, Platform::Windows, "Wi-Fi", "").unwrap();
        assert_eq!(hw.manufacturer, "MediaTek Inc.");
        assert_eq!(hw.mac_address, "00:0A:F5:11:22:33");
    }

    #[test]
    fn wired_names_skip_the_wireless_fallback() {
        let runner = ScriptedRunner::new()
            .on_script("Win32_NetworkAdapter", CommandOutput::failed("Access denied"));
        let failure = resolve_hardware(&runner, Platform::Windows, "Ethernet", "00:11:22:33:44:55")
            .unwrap_err();
        assert_eq!(failure.minimal.mac_address, "00:11:22:33:44:55");
        assert!(failure.minimal.product_name.is_empty());
        assert!(failure.detail.contains("Access denied"));
        assert!(runner.calls_starting_with("netsh").is_empty());
    }

    #[test]
    fn linux_udev_properties() {
        let props = "\
DEVPATH=/devices/pci0000:00/0000:00:14.3/net/wlp0s20f3
DEVTYPE=wlan
ID_PATH=pci-0000:00:14.3
ID_VENDOR_FROM_DATABASE=Intel Corporation
ID_MODEL_FROM_DATABASE=Alder Lake-P PCH CNVi WiFi
";
        let runner = ScriptedRunner::new().on_ok(
            "udevadm info --query=property --path=/sys/class/net/wlp0s20f3",
            props,
        );
        let hw = resolve_hardware(&runner, Platform::Linux, "wlp0s20f3", "8C:C6:81:AA:BB:CC").unwrap();
        assert_eq!(hw.product_name, "Alder Lake-P PCH CNVi WiFi");
        assert_eq!(hw.adapter_type, AdapterType::Wireless);
        assert_eq!(hw.bus_type, "PCI");
        assert_eq!(hw.pnp_device_id, "pci-0000:00:14.3");
        assert_eq!(hw.mac_address, "8C:C6:81:AA:BB:CC");
    }

    #[test]
    fn linux_nmcli_fallback_for_wireless() {
        let runner = ScriptedRunner::new()
            .on_ok("udevadm info --query=property --path=/sys/class/net/wlan0", "DEVTYPE=wlan\n")
            .on_ok(
                "nmcli -t -f GENERAL device show wlan0",
                "GENERAL.DEVICE:wlan0\nGENERAL.HWADDR:00\\:0A\\:F5\\:11\\:22\\:33\nGENERAL.VENDOR:Realtek\nGENERAL.PRODUCT:RTL8821CE\n",
            );
        let hw = resolve_hardware(&runner, Platform::Linux, "wlan0", "").unwrap();
        assert_eq!(hw.product_name, "RTL8821CE");
        assert_eq!(hw.mac_address, "00:0A:F5:11:22:33");
    }

    #[test]
    fn cim_dates() {
        assert_eq!(cim_date("20230415000000.******+000"), "2023-04-15");
        assert_eq!(cim_date(""), "Unknown");
        assert_eq!(cim_date("2023-04"), "Unknown");
    }

    #[test]
    fn windows_driver_descriptor() {
        let json = r#"{"DriverVersion":"22.200.0.6","DriverProvider":"Intel","DriverDate":"20230415000000.******+000","DeviceName":"Intel(R) Wi-Fi 6 AX201 160MHz","InfName":"oem42.inf"}"#;
        let runner = ScriptedRunner::new().on_script("Win32_PnPSignedDriver", CommandOutput::ok(json));
        let driver = resolve_driver(&runner, Platform::Windows, "Wi-Fi").unwrap();
        assert_eq!(driver.version, "22.200.0.6");
        assert_eq!(driver.date_installed, "2023-04-15");
        assert_eq!(driver.path, "oem42.inf");
        assert_eq!(driver.status, "OK");
    }

    #[test]
    fn linux_driver_descriptor() {
        let runner = ScriptedRunner::new().on_ok(
            "ethtool -i eth0",
            "driver: e1000e\nversion: 6.8.0\nfirmware-version: 0.13-4\nbus-info: 0000:00:1f.6\n",
        );
        let driver = resolve_driver(&runner, Platform::Linux, "eth0").unwrap();
        assert_eq!(driver.name, "e1000e");
        assert_eq!(driver.version, "6.8.0");
        assert_eq!(driver.date_installed, "Unknown");
    }

    #[test]
    fn association_lookup() {
        let runner = ScriptedRunner::new().on_ok(
            "nmcli -t -f ACTIVE,SSID device wifi list ifname wlan0",
            "no:Neighbour\nyes:HomeNet\n",
        );
        assert_eq!(
            connected_ssid(&runner, Platform::Linux, "wlan0").unwrap().as_deref(),
            Some("HomeNet")
        );

        let disconnected = ScriptedRunner::new().on_ok(
            "netsh wlan show interfaces",
            "    Name                   : Wi-Fi\n    State                  : disconnected\n",
        );
        assert_eq!(connected_ssid(&disconnected, Platform::Windows, "Wi-Fi").unwrap(), None);
    }

    #[test]
    fn wireless_naming() {
        assert!(looks_wireless(Platform::Windows, "Wi-Fi 2"));
        assert!(looks_wireless(Platform::Windows, "WLAN"));
        assert!(!looks_wireless(Platform::Windows, "Ethernet"));
        assert!(looks_wireless(Platform::Linux, "wlp3s0"));
        assert!(!looks_wireless(Platform::Windows, "wlp3s0"));
    }
}
