//! Pure parsers for the free-text output of host networking tools.
//!
//! Nothing in here performs I/O. Tool output is not a stable contract (it
//! changes with the OS release and the display language), so the scan parsers
//! never give up on a whole blob because of one bad line: they return every
//! record they could extract together with a count of the anomalies they
//! skipped over.
//!
//! Localized labels are kept in static lookup tables mapping a canonical field
//! to every literal prefix it may appear under.

use std::collections::HashMap;
use std::net::IpAddr;

use tracing::debug;

use crate::models::{AdapterType, HardwareDescriptor, HotspotStatus, WifiScanRecord};

/// Records extracted from a blob plus the number of anomalies skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub anomalies: usize,
}

impl<T> Parsed<T> {
    fn new(records: Vec<T>, anomalies: usize) -> Self {
        Parsed { records, anomalies }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn matches(self, addr: &IpAddr) -> bool {
        match self {
            IpFamily::V4 => addr.is_ipv4(),
            IpFamily::V6 => addr.is_ipv6(),
        }
    }
}

/// Parses an address token of the given family, dropping any `%zone` suffix.
/// Unspecified addresses (`0.0.0.0`, `::`) are rejected.
pub fn parse_ip(token: &str, family: IpFamily) -> Option<IpAddr> {
    let token = token.trim();
    let token = token.split('%').next().unwrap_or(token);
    let addr: IpAddr = token.parse().ok()?;
    (family.matches(&addr) && !addr.is_unspecified()).then_some(addr)
}

fn parse_any_ip(token: &str) -> Option<IpAddr> {
    parse_ip(token, IpFamily::V4).or_else(|| parse_ip(token, IpFamily::V6))
}

/// Returns the first field whose label list contains a prefix of `key`.
fn match_label<F: Copy>(table: &[(F, &[&str])], key: &str) -> Option<F> {
    table
        .iter()
        .find(|(_, labels)| labels.iter().any(|label| key.starts_with(label)))
        .map(|(field, _)| *field)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(':').map(|(k, v)| (k.trim(), v.trim()))
}

// ---------------------------------------------------------------------------
// Format A: netsh wlan show networks mode=bssid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanField {
    Ssid,
    Signal,
    Authentication,
    Bssid,
    Channel,
}

const SCAN_LABELS: &[(ScanField, &[&str])] = &[
    (ScanField::Ssid, &["SSID"]),
    (ScanField::Signal, &["Signal", "信号"]),
    (ScanField::Authentication, &["Authentication", "身份验证"]),
    (ScanField::Bssid, &["BSSID"]),
    (ScanField::Channel, &["Channel", "频道", "信道"]),
];

/// Parses block-oriented scan output with English or Chinese labels.
///
/// A record starts at every `SSID n : name` line. Records that end up
/// without an SSID (hidden networks, header blocks) are dropped.
pub fn parse_block_scan(output: &str) -> Parsed<WifiScanRecord> {
    let mut records = Vec::new();
    let mut current: Option<WifiScanRecord> = None;
    let mut anomalies = 0;

    for (idx, raw) in output.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = split_key_value(line) else {
            if match_label(SCAN_LABELS, line) == Some(ScanField::Ssid) {
                debug!("Unparseable SSID line {}: {:?}", idx + 1, line);
                records.extend(current.replace(WifiScanRecord::default()));
                anomalies += 1;
            }
            continue;
        };

        match match_label(SCAN_LABELS, key) {
            Some(ScanField::Ssid) => {
                records.extend(current.replace(WifiScanRecord {
                    ssid: value.to_string(),
                    ..Default::default()
                }));
            }
            Some(field) => {
                let Some(record) = current.as_mut() else {
                    continue;
                };
                match field {
                    ScanField::Signal => match parse_percent(value) {
                        Some(signal) => record.signal_strength = signal,
                        None => {
                            debug!("Invalid signal {:?} on line {}", value, idx + 1);
                            anomalies += 1;
                        }
                    },
                    ScanField::Authentication => record.security = value.to_string(),
                    ScanField::Bssid => record.bssid = value.to_string(),
                    ScanField::Channel => match value.parse() {
                        Ok(channel) => record.channel = channel,
                        Err(_) => {
                            debug!("Invalid channel {:?} on line {}", value, idx + 1);
                            anomalies += 1;
                        }
                    },
                    ScanField::Ssid => unreachable!(),
                }
            }
            None => {}
        }
    }
    records.extend(current);

    let total = records.len();
    records.retain(|r| !r.ssid.is_empty());
    debug!(
        "Block scan: {} records ({} without SSID skipped), {} anomalies",
        records.len(),
        total - records.len(),
        anomalies
    );
    Parsed::new(records, anomalies)
}

fn parse_percent(value: &str) -> Option<u8> {
    let number: u32 = value.trim_end_matches('%').trim().parse().ok()?;
    Some(number.min(100) as u8)
}

// ---------------------------------------------------------------------------
// Format B: nmcli -t -f SSID,SIGNAL,SECURITY,BSSID,CHAN device wifi list
// ---------------------------------------------------------------------------

/// Splits a terse nmcli line on unescaped colons, resolving `\:` and `\\`.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parses one-record-per-line scan output with five positional fields:
/// SSID, signal, security, BSSID, channel.
///
/// The BSSID is the only field that legitimately contains colons, so when a
/// line splits into more than five parts everything between the third and
/// the last part is joined back into the BSSID. This covers both escaped
/// (`AA\:BB\:...`) and raw BSSIDs.
pub fn parse_line_scan(output: &str) -> Parsed<WifiScanRecord> {
    let mut records = Vec::new();
    let mut anomalies = 0;

    for (idx, raw) in output.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let fields = split_terse(line);
        if fields.len() < 5 {
            debug!(
                "Line {} has {} fields, expected 5: {:?}",
                idx + 1,
                fields.len(),
                line
            );
            anomalies += 1;
            continue;
        }

        let last = fields.len() - 1;
        let mut record = WifiScanRecord {
            ssid: fields[0].clone(),
            security: fields[2].clone(),
            bssid: fields[3..last].join(":"),
            ..Default::default()
        };

        match parse_percent(&fields[1]) {
            Some(signal) => record.signal_strength = signal,
            None => {
                debug!("Invalid signal {:?} on line {}", fields[1], idx + 1);
                anomalies += 1;
            }
        }
        match fields[last].trim().parse() {
            Ok(channel) => record.channel = channel,
            Err(_) => {
                debug!("Invalid channel {:?} on line {}", fields[last], idx + 1);
                anomalies += 1;
            }
        }

        records.push(record);
    }

    Parsed::new(records, anomalies)
}

// ---------------------------------------------------------------------------
// Format C: iwlist <iface> scan
// ---------------------------------------------------------------------------

/// Maps a dBm reading onto 0-100: -90 dBm and below is 0, -30 dBm and above
/// is 100, linear in between.
pub fn dbm_to_percent(dbm: i32) -> u8 {
    ((i64::from(dbm) + 90) * 100 / 60).clamp(0, 100) as u8
}

/// Parses cell-oriented scan output. Signal levels given in dBm are rescaled
/// with [`dbm_to_percent`]; `n/d` quality readings are converted directly.
pub fn parse_cell_scan(output: &str) -> Parsed<WifiScanRecord> {
    let mut records = Vec::new();
    let mut current: Option<WifiScanRecord> = None;
    let mut anomalies = 0;

    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("Cell") {
            let mut record = WifiScanRecord::default();
            if let Some((_, address)) = line.split_once("Address:") {
                record.bssid = address.trim().to_string();
            }
            records.extend(current.replace(record));
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(essid) = line.strip_prefix("ESSID:") {
            record.ssid = essid.trim().trim_matches('"').to_string();
        } else if let Some(address) = line.strip_prefix("Address:") {
            record.bssid = address.trim().to_string();
        } else if let Some(channel) = line.strip_prefix("Channel:") {
            match channel.trim().parse() {
                Ok(channel) => record.channel = channel,
                Err(_) => anomalies += 1,
            }
        } else if let Some((_, key)) = line.split_once("Encryption key:") {
            record.security = if key.trim() == "on" { "WPA2" } else { "Open" }.to_string();
        } else if let Some((_, level)) = line.split_once("Signal level=") {
            match parse_signal_level(level) {
                Some(signal) => record.signal_strength = signal,
                None => {
                    debug!("Invalid signal level {:?}", level);
                    anomalies += 1;
                }
            }
        }
    }
    records.extend(current);

    Parsed::new(records, anomalies)
}

fn parse_signal_level(level: &str) -> Option<u8> {
    let token = level.split_whitespace().next()?;
    if let Some((num, den)) = token.split_once('/') {
        let num: u32 = num.parse().ok()?;
        let den: u32 = den.parse().ok()?;
        if den == 0 {
            return None;
        }
        return Some((u64::from(num) * 100 / u64::from(den)).min(100) as u8);
    }
    token.parse::<i32>().ok().map(dbm_to_percent)
}

// ---------------------------------------------------------------------------
// netsh wlan show interfaces
// ---------------------------------------------------------------------------

/// One adapter block from a wireless interface status dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WlanInterfaceBlock {
    pub name: String,
    pub description: String,
    pub mac_address: String,
    pub state: String,
    pub ssid: String,
    pub media_type: String,
    pub radio_type: String,
    pub receive_rate: String,
    pub transmit_rate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WlanField {
    Name,
    Description,
    PhysicalAddress,
    State,
    Ssid,
    MediaType,
    RadioType,
    ReceiveRate,
    TransmitRate,
}

// Matched against the whole key: "SSID" must not swallow "BSSID", and
// "Name" must not swallow unrelated keys that happen to start with it.
const WLAN_LABELS: &[(WlanField, &[&str])] = &[
    (WlanField::Name, &["Name", "名称"]),
    (WlanField::Description, &["Description", "描述"]),
    (WlanField::PhysicalAddress, &["Physical address", "物理地址"]),
    (WlanField::State, &["State", "状态"]),
    (WlanField::Ssid, &["SSID", "SSID 名称"]),
    (
        WlanField::MediaType,
        &["Media type", "媒体类型", "Connection type", "连接类型"],
    ),
    (WlanField::RadioType, &["Radio type", "无线电类型"]),
    (WlanField::ReceiveRate, &["Receive rate (Mbps)", "接收速率 (Mbps)"]),
    (WlanField::TransmitRate, &["Transmit rate (Mbps)", "传输速率 (Mbps)"]),
];

fn match_exact_label<F: Copy>(table: &[(F, &[&str])], key: &str) -> Option<F> {
    table
        .iter()
        .find(|(_, labels)| labels.contains(&key))
        .map(|(field, _)| *field)
}

/// Splits a wireless status dump into one block per adapter.
pub fn parse_wlan_interfaces(output: &str) -> Vec<WlanInterfaceBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<WlanInterfaceBlock> = None;

    for line in output.lines() {
        let Some((key, value)) = split_key_value(line.trim()) else {
            continue;
        };
        let Some(field) = match_exact_label(WLAN_LABELS, key) else {
            continue;
        };

        if field == WlanField::Name {
            blocks.extend(current.replace(WlanInterfaceBlock {
                name: value.to_string(),
                ..Default::default()
            }));
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        let slot = match field {
            WlanField::Description => &mut block.description,
            WlanField::PhysicalAddress => &mut block.mac_address,
            WlanField::State => &mut block.state,
            WlanField::Ssid => &mut block.ssid,
            WlanField::MediaType => &mut block.media_type,
            WlanField::RadioType => &mut block.radio_type,
            WlanField::ReceiveRate => &mut block.receive_rate,
            WlanField::TransmitRate => &mut block.transmit_rate,
            WlanField::Name => unreachable!(),
        };
        *slot = value.to_string();
    }
    blocks.extend(current);
    blocks
}

const VENDOR_FRAGMENTS: &[(&str, &str)] = &[
    ("Intel", "Intel Corporation"),
    ("Killer", "Intel Corporation"),
    ("Realtek", "Realtek Semiconductor Corp."),
    ("Broadcom", "Broadcom Inc."),
    ("MediaTek", "MediaTek Inc."),
    ("Qualcomm", "Qualcomm Technologies, Inc."),
    ("Atheros", "Qualcomm Atheros"),
];

/// Guesses the vendor from a free-text product description.
pub fn infer_manufacturer(description: &str) -> Option<&'static str> {
    VENDOR_FRAGMENTS
        .iter()
        .find(|(fragment, _)| description.contains(fragment))
        .map(|(_, vendor)| *vendor)
}

/// Joins separate receive/transmit rates into "Rx: a Mbps, Tx: b Mbps".
pub fn combine_rates(rx: &str, tx: &str) -> String {
    let mut parts = Vec::new();
    if !rx.is_empty() {
        parts.push(format!("Rx: {} Mbps", rx));
    }
    if !tx.is_empty() {
        parts.push(format!("Tx: {} Mbps", tx));
    }
    parts.join(", ")
}

impl WlanInterfaceBlock {
    pub fn to_hardware(&self) -> HardwareDescriptor {
        let product_name = if self.description.is_empty() {
            self.name.clone()
        } else {
            self.description.clone()
        };
        let physical_media = if !self.media_type.is_empty() {
            self.media_type.clone()
        } else if !self.radio_type.is_empty() {
            self.radio_type.clone()
        } else {
            "802.11 Wireless".to_string()
        };

        HardwareDescriptor {
            mac_address: self.mac_address.clone(),
            manufacturer: infer_manufacturer(&self.description)
                .unwrap_or_default()
                .to_string(),
            product_name,
            adapter_type: AdapterType::Wireless,
            physical_media,
            speed: combine_rates(&self.receive_rate, &self.transmit_rate),
            bus_type: "PCI".to_string(),
            pnp_device_id: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// netsh wlan show hostednetwork
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostedField {
    Status,
    SsidName,
    MaxClients,
    Authentication,
    Cipher,
    Clients,
}

const HOSTED_LABELS: &[(HostedField, &[&str])] = &[
    (HostedField::Status, &["Status", "状态"]),
    (HostedField::SsidName, &["SSID name", "SSID 名称"]),
    (HostedField::MaxClients, &["Max number of clients", "最大客户端数"]),
    (HostedField::Authentication, &["Authentication", "身份验证"]),
    (HostedField::Cipher, &["Cipher", "密码"]),
    (HostedField::Clients, &["Number of clients", "客户端数"]),
];

const STARTED: &[&str] = &["Started", "已启动"];

/// Parses hosted-network settings and status into a status record.
pub fn parse_hosted_network(output: &str) -> HotspotStatus {
    let mut status = HotspotStatus {
        success: true,
        ..Default::default()
    };

    for line in output.lines() {
        let Some((key, value)) = split_key_value(line.trim()) else {
            continue;
        };
        match match_label(HOSTED_LABELS, key) {
            Some(HostedField::Status) => status.enabled = STARTED.contains(&value),
            Some(HostedField::SsidName) => status.ssid = value.trim_matches('"').to_string(),
            Some(HostedField::MaxClients) => {
                status.max_client_count = value.parse().unwrap_or_default()
            }
            Some(HostedField::Authentication) => status.authentication = value.to_string(),
            Some(HostedField::Cipher) => status.encryption = value.to_string(),
            Some(HostedField::Clients) => status.clients_count = value.parse().unwrap_or_default(),
            None => {}
        }
    }
    status
}

// ---------------------------------------------------------------------------
// Gateways
// ---------------------------------------------------------------------------

/// Default route from `netsh interface ipvX show route` or `route print`.
///
/// Handles the prefix form (`... 0.0.0.0/0 ... <gateway>`, `::/0`) and the
/// classic Windows table form (`0.0.0.0 0.0.0.0 <gateway> <iface> <metric>`).
pub fn parse_default_route(output: &str, family: IpFamily) -> Option<IpAddr> {
    let default_prefix = match family {
        IpFamily::V4 => "0.0.0.0/0",
        IpFamily::V6 => "::/0",
    };

    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.contains(&default_prefix) {
            return fields.last().and_then(|gw| parse_ip(gw, family));
        }
        if family == IpFamily::V4
            && fields.len() >= 3
            && fields[0] == "0.0.0.0"
            && fields[1] == "0.0.0.0"
        {
            return parse_ip(fields[2], family);
        }
        None
    })
}

/// Gateway from `ip route show default`: the token after `via`.
pub fn parse_ip_route_default(output: &str, family: IpFamily) -> Option<IpAddr> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        tokens.find(|t| *t == "via")?;
        tokens.next().and_then(|gw| parse_ip(gw, family))
    })
}

/// Gateway for `iface` from the Linux kernel table (`route -n`,
/// `route -A inet6 -n`), where the gateway is the second column.
pub fn parse_kernel_route_table(output: &str, family: IpFamily, iface: &str) -> Option<IpAddr> {
    let default_dest = match family {
        IpFamily::V4 => "0.0.0.0",
        IpFamily::V6 => "::/0",
    };
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 3 && fields[0] == default_dest && fields.last() == Some(&iface) {
            parse_ip(fields[1], family)
        } else {
            None
        }
    })
}

fn is_ipconfig_header(line: &str) -> bool {
    !line.is_empty() && !line.starts_with(char::is_whitespace) && line.trim_end().ends_with(':')
}

fn ipconfig_header_matches(line: &str, iface: &str) -> bool {
    let title = line.trim().trim_end_matches(':');
    title == iface || title.ends_with(&format!(" {}", iface))
}

/// Collects addresses listed under `labels` in the `ipconfig` section of
/// `iface`, including continuation lines.
pub fn parse_ipconfig_values(output: &str, iface: &str, labels: &[&str]) -> Vec<IpAddr> {
    let mut values = Vec::new();
    let mut in_section = false;
    let mut collecting = false;

    for line in output.lines() {
        if is_ipconfig_header(line) {
            in_section = ipconfig_header_matches(line, iface);
            collecting = false;
            continue;
        }
        if !in_section {
            continue;
        }

        let trimmed = line.trim();
        if let Some(addr) = parse_any_ip(trimmed) {
            if collecting {
                values.push(addr);
            }
            continue;
        }

        collecting = false;
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim_end_matches(['.', ' ']);
            if labels.iter().any(|label| key.starts_with(label)) {
                collecting = true;
                if let Some(addr) = value.split_whitespace().next().and_then(parse_any_ip) {
                    values.push(addr);
                }
            }
        }
    }
    values
}

pub const IPCONFIG_GATEWAY_LABELS: &[&str] = &["Default Gateway", "默认网关"];
pub const IPCONFIG_DNS_LABELS: &[&str] = &["DNS Servers", "DNS 服务器"];

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

const NETSH_DNS_SECTION: &[&str] = &[
    "Statically Configured DNS Servers",
    "DNS servers configured through DHCP",
    "静态配置的 DNS 服务器",
    "通过 DHCP 配置的 DNS 服务器",
];

/// Resolver addresses from `netsh interface ipvX show dnsservers`.
pub fn parse_netsh_dns(output: &str, family: IpFamily) -> Vec<String> {
    let mut servers = Vec::new();
    let mut in_section = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(addr) = parse_ip(trimmed, family) {
            if in_section {
                servers.push(addr.to_string());
            }
            continue;
        }

        match trimmed.split_once(':') {
            Some((key, value)) if NETSH_DNS_SECTION.iter().any(|l| key.trim().starts_with(l)) => {
                in_section = true;
                servers.extend(
                    value
                        .split_whitespace()
                        .filter_map(|t| parse_ip(t, family))
                        .map(|a| a.to_string()),
                );
            }
            // any other label ("Register with which suffix", ...) ends the list
            Some(_) => in_section = false,
            None => {}
        }
    }
    servers
}

/// Addresses from a list of values such as nmcli's `a | b` multi-value form
/// or one-address-per-line PowerShell output.
pub fn parse_address_list(output: &str, family: IpFamily) -> Vec<String> {
    output
        .split(['|', '\n', ','])
        .map(unescape_terse)
        .filter_map(|t| parse_ip(&t, family))
        .map(|a| a.to_string())
        .collect()
}

/// Resolvers from `resolvectl dns <iface>` ("Link 2 (eth0): 1.1.1.1 ...").
pub fn parse_resolvectl_dns(output: &str, family: IpFamily) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once("): ").map(|(_, rest)| rest))
        .flat_map(str::split_whitespace)
        .filter_map(|t| parse_ip(t, family))
        .map(|a| a.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// DHCP and key/value helpers
// ---------------------------------------------------------------------------

/// DHCP flag from `netsh interface ipv4 show config`.
pub fn parse_netsh_dhcp(output: &str) -> Option<bool> {
    output.lines().find_map(|line| {
        let (key, value) = split_key_value(line.trim())?;
        (key.starts_with("DHCP enabled") || key.starts_with("DHCP 已启用"))
            .then(|| value == "Yes" || value == "是")
    })
}

pub fn unescape_terse(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.trim().chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Single value printed by `nmcli -g`; `--` and blanks mean unset.
pub fn parse_nmcli_value(output: &str) -> Option<String> {
    let value = unescape_terse(output.lines().next().unwrap_or_default());
    (!value.is_empty() && value != "--").then_some(value)
}

/// `KEY:VALUE` lines from `nmcli -t ... show`.
pub fn parse_nmcli_fields(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), unescape_terse(value)))
        })
        .collect()
}

/// `KEY=VALUE` lines, as printed by `udevadm info --query=property`.
pub fn parse_properties(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `key: value` lines, as printed by `ethtool -i`.
pub fn parse_colon_fields(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| split_key_value(line))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// SSID of the active row of `nmcli -t -f ACTIVE,SSID device wifi list`.
pub fn parse_active_ssid(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let fields = split_terse(line.trim());
        match fields.as_slice() {
            [active, ssid, ..] if active == "yes" && !ssid.is_empty() => Some(ssid.clone()),
            _ => None,
        }
    })
}
