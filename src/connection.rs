//! Joining Wi-Fi networks and probing internet reachability.
//!
//! # Joining
//!
//! - Linux: `nmcli device wifi connect <ssid> [password <pw>] ifname <iface>`
//! - Windows: the target must show up in `netsh wlan show networks`. With a
//!   password, a WPA2-PSK profile is written to a temporary file and added
//!   with `netsh wlan add profile`; then `netsh wlan connect name=<ssid>` is
//!   tried, and `ssid=<ssid>` if that fails.
//!
//! # Probing
//!
//! [`check_connectivity`] issues one HTTP GET with a short timeout. Any HTTP
//! response, error statuses included, means the target is reachable.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use netconfig::connection::check_connectivity;
//!
//! let result = check_connectivity("http://www.baidu.com", Duration::from_secs(3));
//! println!("reachable: {} in {} ms", result.success, result.duration_ms);
//! ```

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{NetConfigError, Result};
use crate::hardware;
use crate::interface::NetworkEngine;
use crate::models::{AdapterType, ConnectivityResult};
use crate::parse;
use crate::platform::Platform;
use crate::runner::{run_checked, run_text};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

impl NetworkEngine {
    /// Connects a wireless interface to `ssid`.
    ///
    /// An empty password joins an open network (or reuses a stored profile
    /// on Windows).
    ///
    /// # Errors
    /// - [`NetConfigError::InterfaceNotFound`] if the interface does not exist
    /// - [`NetConfigError::Validation`] for an empty SSID, a wired interface,
    ///   or an SSID that is not in range (Windows)
    /// - [`NetConfigError::CommandFailed`] if every connect attempt failed
    pub fn connect_wifi(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        if ssid.is_empty() {
            return Err(NetConfigError::Validation("SSID must not be empty".to_string()));
        }

        let link = self
            .links
            .link(interface)?
            .ok_or_else(|| NetConfigError::InterfaceNotFound(interface.to_string()))?;

        let wireless =
            match hardware::resolve_hardware(self.runner.as_ref(), self.platform, interface, &link.mac_address) {
                Ok(hw) => hw.adapter_type == AdapterType::Wireless,
                Err(_) => hardware::looks_wireless(self.platform, interface),
            };
        if !wireless {
            return Err(NetConfigError::Validation(format!(
                "'{}' is not a wireless interface",
                interface
            )));
        }

        info!("Connecting {} to '{}'", interface, ssid);
        match self.platform {
            Platform::Linux => self.connect_nmcli(interface, ssid, password),
            Platform::Windows => self.connect_netsh(interface, ssid, password),
            Platform::Other => Err(NetConfigError::UnsupportedPlatform("Wi-Fi connection".to_string())),
        }?;
        info!("Connected {} to '{}'", interface, ssid);
        Ok(())
    }

    fn connect_nmcli(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        let mut args = vec!["device", "wifi", "connect", ssid];
        if !password.is_empty() {
            args.extend(["password", password]);
        }
        args.extend(["ifname", interface]);
        run_checked(self.runner.as_ref(), "nmcli", &args)
    }

    fn connect_netsh(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        let runner = self.runner.as_ref();
        let iface_arg = format!("interface={}", interface);

        let listing = run_text(runner, "netsh", &["wlan", "show", "networks", &iface_arg])
            .map_err(|e| NetConfigError::query("available networks", e.to_string()))?;
        let visible = parse::parse_block_scan(&listing).records;
        if !visible.iter().any(|n| n.ssid == ssid) {
            let names: Vec<&str> = visible.iter().map(|n| n.ssid.as_str()).collect();
            debug!("Networks in range of {}: {:?}", interface, names);
            return Err(NetConfigError::Validation(format!(
                "network '{}' is not in range of {}",
                ssid, interface
            )));
        }

        if !password.is_empty() {
            self.install_profile(interface, ssid, password)?;
        }

        let name_arg = format!("name={}", ssid);
        match run_checked(runner, "netsh", &["wlan", "connect", &name_arg, &iface_arg]) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Connecting by profile name failed, retrying by SSID: {}", e);
                let ssid_arg = format!("ssid={}", ssid);
                run_checked(runner, "netsh", &["wlan", "connect", &ssid_arg, &iface_arg])
            }
        }
    }

    fn install_profile(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        let runner = self.runner.as_ref();
        let iface_arg = format!("interface={}", interface);

        let stale = runner.run(
            "netsh",
            &["wlan", "delete", "profile", &format!("name={}", ssid), &iface_arg],
        );
        if !stale.success {
            debug!("No previous profile for '{}': {}", ssid, stale.diagnostic());
        }

        let write_err = |e: std::io::Error| NetConfigError::CommandFailed {
            command: "write WLAN profile".to_string(),
            detail: e.to_string(),
        };
        let mut file = tempfile::Builder::new()
            .prefix("wifi_")
            .suffix(".xml")
            .tempfile()
            .map_err(write_err)?;
        file.write_all(UTF8_BOM).map_err(write_err)?;
        file.write_all(wlan_profile(ssid, password).as_bytes())
            .map_err(write_err)?;
        file.flush().map_err(write_err)?;

        let file_arg = format!("filename={}", file.path().display());
        if let Err(e) = run_checked(runner, "netsh", &["wlan", "add", "profile", &file_arg, &iface_arg]) {
            warn!("Adding profile for {} failed, retrying for all interfaces: {}", interface, e);
            run_checked(runner, "netsh", &["wlan", "add", "profile", &file_arg])?;
        }
        debug!("WLAN profile for '{}' installed", ssid);
        Ok(())
    }
}

/// WPA2-PSK profile document for `netsh wlan add profile`.
fn wlan_profile(ssid: &str, password: &str) -> String {
    let name = xml_escape(ssid);
    let hex: String = ssid.bytes().map(|b| format!("{:02X}", b)).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<WLANProfile xmlns="http://www.microsoft.com/networking/WLAN/profile/v1">
    <name>{name}</name>
    <SSIDConfig>
        <SSID>
            <hex>{hex}</hex>
            <name>{name}</name>
        </SSID>
        <nonBroadcast>false</nonBroadcast>
    </SSIDConfig>
    <connectionType>ESS</connectionType>
    <connectionMode>auto</connectionMode>
    <autoSwitch>false</autoSwitch>
    <MSM>
        <security>
            <authEncryption>
                <authentication>WPA2PSK</authentication>
                <encryption>AES</encryption>
                <useOneX>false</useOneX>
            </authEncryption>
            <sharedKey>
                <keyType>passPhrase</keyType>
                <protected>false</protected>
                <keyMaterial>{key}</keyMaterial>
            </sharedKey>
        </security>
    </MSM>
</WLANProfile>"#,
        name = name,
        hex = hex,
        key = xml_escape(password),
    )
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Probes `target` with a single GET.
///
/// Never fails: transport errors and timeouts are reported in the result.
pub fn check_connectivity(target: &str, timeout: Duration) -> ConnectivityResult {
    info!("Checking connectivity to {}", target);
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();

    let start = Instant::now();
    let response = agent.get(target).call();
    let duration_ms = start.elapsed().as_millis() as u64;

    let mut result = ConnectivityResult {
        target: target.to_string(),
        duration_ms,
        ..Default::default()
    };
    match response {
        Ok(resp) => {
            result.success = true;
            result.status_code = resp.status();
        }
        Err(ureq::Error::Status(code, _)) => {
            result.success = true;
            result.status_code = code;
        }
        Err(e) => {
            warn!("Connectivity check to {} failed: {}", target, e);
            result.error = e.to_string();
        }
    }

    if result.success {
        info!(
            "{} reachable, status {} in {} ms",
            target, result.status_code, result.duration_ms
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;

    use super::*;
    use crate::interface::InterfaceFilter;
    use crate::interface::fake::{StaticLinks, link};
    use crate::runner::CommandOutput;
    use crate::runner::fake::ScriptedRunner;

    const WLAN_UDEV: &str = "DEVTYPE=wlan\nID_BUS=pci\nID_MODEL_FROM_DATABASE=Wi-Fi 6 AX201\n";
    const ETH_UDEV: &str = "ID_BUS=pci\nID_MODEL_FROM_DATABASE=Ethernet Connection I219-V\n";

    fn engine(platform: Platform, runner: ScriptedRunner) -> (NetworkEngine, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let links = StaticLinks(vec![
            link("wlan0", "8C:C6:81:AA:BB:CC", &[]),
            link("eth0", "00:11:22:33:44:55", &[]),
            link("Wi-Fi", "8C:C6:81:AA:BB:CC", &[]),
        ]);
        let engine = NetworkEngine::new(runner.clone(), Arc::new(links), platform, InterfaceFilter::default());
        (engine, runner)
    }

    #[test]
    fn nmcli_connect() {
        let runner = ScriptedRunner::new()
            .on_ok("udevadm info --query=property --path=/sys/class/net/wlan0", WLAN_UDEV)
            .on_ok(
                "nmcli device wifi connect HomeNet password secret123 ifname wlan0",
                "Device 'wlan0' successfully activated.",
            );
        let (engine, runner) = engine(Platform::Linux, runner);

        engine.connect_wifi("wlan0", "HomeNet", "secret123").unwrap();
        assert_eq!(runner.calls_starting_with("nmcli device wifi connect").len(), 1);
    }

    #[test]
    fn open_network_has_no_password_argument() {
        let runner = ScriptedRunner::new()
            .on_ok("udevadm info --query=property --path=/sys/class/net/wlan0", WLAN_UDEV)
            .on_ok("nmcli device wifi connect Cafe ifname wlan0", "");
        let (engine, _) = engine(Platform::Linux, runner);
        engine.connect_wifi("wlan0", "Cafe", "").unwrap();
    }

    #[test]
    fn rejects_wired_and_missing_interfaces() {
        let runner = ScriptedRunner::new().on_ok("udevadm info --query=property --path=/sys/class/net/eth0", ETH_UDEV);
        let (engine, runner) = engine(Platform::Linux, runner);

        assert!(matches!(
            engine.connect_wifi("eth0", "HomeNet", "secret123"),
            Err(NetConfigError::Validation(_))
        ));
        assert!(matches!(
            engine.connect_wifi("wlan7", "HomeNet", "secret123"),
            Err(NetConfigError::InterfaceNotFound(_))
        ));
        assert!(runner.calls_starting_with("nmcli device wifi connect").is_empty());
    }

    #[test]
    fn netsh_requires_network_in_range() {
        let runner = ScriptedRunner::new().on_ok(
            "netsh wlan show networks interface=Wi-Fi",
            "SSID 1 : Neighbour\n    Authentication : WPA2-Personal\n",
        );
        let (engine, runner) = engine(Platform::Windows, runner);

        let err = engine.connect_wifi("Wi-Fi", "Office", "secret123").unwrap_err();
        assert!(matches!(err, NetConfigError::Validation(ref m) if m.contains("not in range")));
        assert!(runner.calls_starting_with("netsh wlan add profile").is_empty());
    }

    #[test]
    fn netsh_installs_profile_and_falls_back_to_ssid() {
        let runner = ScriptedRunner::new()
            .on_ok(
                "netsh wlan show networks interface=Wi-Fi",
                "SSID 1 : Office\n    Authentication : WPA2-Personal\n",
            )
            .on_prefix("netsh wlan add profile", CommandOutput::ok("Profile Office is added."))
            .on(
                "netsh wlan connect name=Office interface=Wi-Fi",
                CommandOutput::failed("There is no profile \"Office\" assigned"),
            )
            .on_ok(
                "netsh wlan connect ssid=Office interface=Wi-Fi",
                "Connection request was completed successfully.",
            );
        let (engine, runner) = engine(Platform::Windows, runner);

        engine.connect_wifi("Wi-Fi", "Office", "secret123").unwrap();
        let added = runner.calls_starting_with("netsh wlan add profile filename=");
        assert_eq!(added.len(), 1);
        assert!(added[0].ends_with("interface=Wi-Fi"));
        assert_eq!(runner.calls_starting_with("netsh wlan connect").len(), 2);
    }

    #[test]
    fn profile_escapes_and_hex_encodes() {
        let profile = wlan_profile("R&D <5G>", "p\"ss");
        assert!(profile.contains("<name>R&amp;D &lt;5G&gt;</name>"));
        assert!(profile.contains("<hex>522644203C35473E</hex>"));
        assert!(profile.contains("<keyMaterial>p&quot;ss</keyMaterial>"));
    }

    fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = write!(stream, "{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
            }
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn any_http_status_is_reachable() {
        let target = serve_once("HTTP/1.1 404 Not Found");
        let result = check_connectivity(&target, Duration::from_secs(3));
        assert!(result.success);
        assert_eq!(result.status_code, 404);
        assert!(result.error.is_empty());
    }

    #[test]
    fn transport_failure_is_reported_in_result() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let target = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let result = check_connectivity(&target, Duration::from_secs(1));
        assert!(!result.success);
        assert_eq!(result.status_code, 0);
        assert!(!result.error.is_empty());
    }
}
