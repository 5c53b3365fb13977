//! Wi-Fi scanning.
//!
//! Picks the scanning tool for the host and feeds its output to the matching
//! parser in [`crate::parse`]:
//!
//! - Windows: `netsh wlan show networks mode=bssid` (block format)
//! - Linux: `nmcli` terse listing (line format), falling back to
//!   `iwlist <iface> scan` (cell format) when nmcli is unavailable
//!
//! On Linux a rescan is requested first; if it is accepted the scan waits
//! briefly for the driver to refresh its results.
//!
//! # Example
//!
//! ```no_run
//! use netconfig::scan::display_networks;
//! # fn demo(engine: &netconfig::NetworkEngine) -> netconfig::Result<()> {
//! let networks = engine.scan_wifi("wlan0")?;
//! display_networks(&networks);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{NetConfigError, Result};
use crate::interface::NetworkEngine;
use crate::models::WifiScanRecord;
use crate::parse::{self, Parsed};
use crate::platform::Platform;
use crate::runner::run_text;

/// Time given to the driver to finish an on-demand rescan.
const RESCAN_SETTLE: Duration = Duration::from_millis(500);

impl NetworkEngine {
    /// Scans for access points visible to `interface`.
    ///
    /// Returns one record per access point (several per SSID when a network
    /// has multiple BSSIDs), strongest signal first. Lines the parser could
    /// not make sense of are logged and skipped.
    ///
    /// # Errors
    /// - [`NetConfigError::InterfaceNotFound`] if the interface does not exist
    /// - [`NetConfigError::Query`] if no scanning tool produced output
    /// - [`NetConfigError::UnsupportedPlatform`] on hosts without a scanner
    pub fn scan_wifi(&self, interface: &str) -> Result<Vec<WifiScanRecord>> {
        if !self.interface_exists(interface)? {
            return Err(NetConfigError::InterfaceNotFound(interface.to_string()));
        }

        info!("Scanning for Wi-Fi networks on {}", interface);
        let parsed = match self.platform {
            Platform::Windows => self.scan_block_format(interface),
            Platform::Linux => self.scan_linux(interface),
            Platform::Other => Err(NetConfigError::UnsupportedPlatform("Wi-Fi scanning".to_string())),
        }?;

        if parsed.anomalies > 0 {
            warn!(
                "Wi-Fi scan on {}: skipped {} malformed entries",
                interface, parsed.anomalies
            );
        }

        let mut networks = parsed.records;
        networks.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
        info!("Found {} access points on {}", networks.len(), interface);
        Ok(networks)
    }

    fn scan_block_format(&self, interface: &str) -> Result<Parsed<WifiScanRecord>> {
        let output = run_text(
            self.runner.as_ref(),
            "netsh",
            &["wlan", "show", "networks", "mode=bssid", &format!("interface={}", interface)],
        )
        .map_err(|e| NetConfigError::query("Wi-Fi scan", e.to_string()))?;
        Ok(parse::parse_block_scan(&output))
    }

    fn scan_linux(&self, interface: &str) -> Result<Parsed<WifiScanRecord>> {
        let runner = self.runner.as_ref();

        // A refused rescan still leaves the cached results to list.
        let rescan = runner.run("nmcli", &["device", "wifi", "rescan", "ifname", interface]);
        if rescan.success {
            std::thread::sleep(RESCAN_SETTLE);
        } else {
            debug!("Rescan on {} not accepted: {}", interface, rescan.diagnostic());
        }

        let listing = run_text(
            runner,
            "nmcli",
            &[
                "-t",
                "-f",
                "SSID,SIGNAL,SECURITY,BSSID,CHAN",
                "device",
                "wifi",
                "list",
                "ifname",
                interface,
            ],
        );
        match listing {
            Ok(output) => return Ok(parse::parse_line_scan(&output)),
            Err(e) => warn!("nmcli scan on {} failed, trying iwlist: {}", interface, e),
        }

        let output = run_text(runner, "iwlist", &[interface, "scan"])
            .map_err(|e| NetConfigError::query("Wi-Fi scan", e.to_string()))?;
        Ok(parse::parse_cell_scan(&output))
    }
}

/// Prints access points as a table with a signal bar.
///
/// ```text
/// SSID                             SIGNAL     CH SECURITY
/// ----------------------------------------------------------------------
/// MyHomeNetwork                      95% ████  36 WPA2-Personal
/// OpenCafe                           45% ██░░   6 Open
/// ```
pub fn display_networks(networks: &[WifiScanRecord]) {
    if networks.is_empty() {
        println!("No networks found.");
        return;
    }

    println!("{:<32} {:>6} {:>6} {}", "SSID", "SIGNAL", "CH", "SECURITY");
    println!("{}", "-".repeat(70));

    for network in networks {
        println!(
            "{:<32} {:>3}% {} {:>3} {}",
            truncate_ssid(&network.ssid, 32),
            network.signal_strength,
            signal_to_bar(network.signal_strength),
            network.channel,
            network.security
        );
    }
}

/// Shortens an SSID to `max_len` characters, ending in "..." when cut.
/// Counts characters, so multi-byte SSIDs are never split mid-character.
fn truncate_ssid(ssid: &str, max_len: usize) -> String {
    if ssid.chars().count() > max_len {
        let kept: String = ssid.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        ssid.to_string()
    }
}

/// Four-segment signal indicator.
fn signal_to_bar(signal: u8) -> &'static str {
    match signal {
        80..=100 => "████",
        60..=79 => "███░",
        40..=59 => "██░░",
        20..=39 => "█░░░",
        _ => "░░░░",
    }
}
