//! Gateway, DNS and DHCP lookups for a single interface.
//!
//! Gateways and resolvers are resolved through ordered strategy lists: each
//! strategy is one independent query, and the first one that produces a
//! usable value wins. The lists are plain data so each strategy can be tested
//! on its own.

use std::net::IpAddr;

use tracing::debug;

use crate::error::{NetConfigError, Result};
use crate::models::{DNS_NONE, DNS_UNAVAILABLE};
use crate::parse::{self, IpFamily};
use crate::platform::Platform;
use crate::runner::{CommandRunner, ps_quote, run_powershell, run_text};

pub type GatewayQuery = fn(&dyn CommandRunner, &str, IpFamily) -> Option<IpAddr>;

pub struct GatewayStrategy {
    pub name: &'static str,
    pub query: GatewayQuery,
}

const WINDOWS_GATEWAY: &[GatewayStrategy] = &[
    GatewayStrategy {
        name: "Get-NetRoute",
        query: gateway_from_net_route,
    },
    GatewayStrategy {
        name: "ipconfig",
        query: gateway_from_ipconfig,
    },
    GatewayStrategy {
        name: "route print",
        query: gateway_from_route_print,
    },
];

const LINUX_GATEWAY: &[GatewayStrategy] = &[
    GatewayStrategy {
        name: "ip route",
        query: gateway_from_ip_route,
    },
    GatewayStrategy {
        name: "nmcli",
        query: gateway_from_nmcli,
    },
    GatewayStrategy {
        name: "route -n",
        query: gateway_from_kernel_table,
    },
];

pub fn gateway_strategies(platform: Platform) -> &'static [GatewayStrategy] {
    match platform {
        Platform::Windows => WINDOWS_GATEWAY,
        Platform::Linux => LINUX_GATEWAY,
        Platform::Other => &[],
    }
}

/// Tries every gateway strategy in order and keeps the first answer.
pub fn resolve_gateway(
    runner: &dyn CommandRunner,
    strategies: &[GatewayStrategy],
    name: &str,
    family: IpFamily,
) -> Option<IpAddr> {
    strategies.iter().find_map(|strategy| {
        let gateway = (strategy.query)(runner, name, family);
        match gateway {
            Some(gw) => debug!("{:?} gateway of {} via {}: {}", family, name, strategy.name, gw),
            None => debug!("{:?} gateway of {}: {} found nothing", family, name, strategy.name),
        }
        gateway
    })
}

fn family_arg(family: IpFamily) -> &'static str {
    match family {
        IpFamily::V4 => "IPv4",
        IpFamily::V6 => "IPv6",
    }
}

fn gateway_from_net_route(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Option<IpAddr> {
    let prefix = match family {
        IpFamily::V4 => "0.0.0.0/0",
        IpFamily::V6 => "::/0",
    };
    let script = format!(
        "Get-NetRoute -InterfaceAlias {} -DestinationPrefix '{}' -ErrorAction Stop | Select-Object -ExpandProperty NextHop",
        ps_quote(name),
        prefix
    );
    let output = run_powershell(runner, &script).ok()?;
    output.lines().find_map(|line| parse::parse_ip(line, family))
}

fn gateway_from_ipconfig(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Option<IpAddr> {
    let output = run_text(runner, "ipconfig", &["/all"]).ok()?;
    parse::parse_ipconfig_values(&output, name, parse::IPCONFIG_GATEWAY_LABELS)
        .into_iter()
        .find(|addr| family.matches(addr) && !addr.is_unspecified())
}

fn gateway_from_route_print(runner: &dyn CommandRunner, _name: &str, family: IpFamily) -> Option<IpAddr> {
    let flag = match family {
        IpFamily::V4 => "-4",
        IpFamily::V6 => "-6",
    };
    let output = run_text(runner, "route", &["print", flag]).ok()?;
    parse::parse_default_route(&output, family)
}

fn gateway_from_ip_route(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Option<IpAddr> {
    let flag = match family {
        IpFamily::V4 => "-4",
        IpFamily::V6 => "-6",
    };
    let output = run_text(runner, "ip", &[flag, "route", "show", "default", "dev", name]).ok()?;
    parse::parse_ip_route_default(&output, family)
}

fn gateway_from_nmcli(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Option<IpAddr> {
    let field = match family {
        IpFamily::V4 => "IP4.GATEWAY",
        IpFamily::V6 => "IP6.GATEWAY",
    };
    let output = run_text(runner, "nmcli", &["-g", field, "device", "show", name]).ok()?;
    parse::parse_nmcli_value(&output).and_then(|gw| parse::parse_ip(&gw, family))
}

fn gateway_from_kernel_table(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Option<IpAddr> {
    let output = match family {
        IpFamily::V4 => run_text(runner, "route", &["-n"]),
        IpFamily::V6 => run_text(runner, "route", &["-A", "inet6", "-n"]),
    }
    .ok()?;
    parse::parse_kernel_route_table(&output, family, name)
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

/// Outcome of a resolver lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsLookup {
    Servers(Vec<String>),
    /// At least one query ran, none reported a resolver.
    NotConfigured,
    /// No query could be executed.
    Unavailable,
}

impl DnsLookup {
    /// List form used in records, with the sentinels spelled out.
    pub fn into_list(self) -> Vec<String> {
        match self {
            DnsLookup::Servers(servers) => servers,
            DnsLookup::NotConfigured => vec![DNS_NONE.to_string()],
            DnsLookup::Unavailable => vec![DNS_UNAVAILABLE.to_string()],
        }
    }
}

pub type DnsQuery = fn(&dyn CommandRunner, &str, IpFamily) -> Result<Vec<String>>;

pub struct DnsStrategy {
    pub name: &'static str,
    pub query: DnsQuery,
}

const WINDOWS_DNS: &[DnsStrategy] = &[
    DnsStrategy {
        name: "netsh",
        query: dns_from_netsh,
    },
    DnsStrategy {
        name: "ipconfig",
        query: dns_from_ipconfig,
    },
    DnsStrategy {
        name: "Get-DnsClientServerAddress",
        query: dns_from_powershell,
    },
];

const LINUX_DNS: &[DnsStrategy] = &[
    DnsStrategy {
        name: "nmcli",
        query: dns_from_nmcli,
    },
    DnsStrategy {
        name: "resolvectl",
        query: dns_from_resolvectl,
    },
];

pub fn dns_strategies(platform: Platform) -> &'static [DnsStrategy] {
    match platform {
        Platform::Windows => WINDOWS_DNS,
        Platform::Linux => LINUX_DNS,
        Platform::Other => &[],
    }
}

/// Runs the primary resolver query and then the fallbacks until one reports
/// servers. A query that runs but finds nothing still counts as executed, so
/// the result is [`DnsLookup::NotConfigured`] rather than `Unavailable`.
pub fn resolve_dns(
    runner: &dyn CommandRunner,
    strategies: &[DnsStrategy],
    name: &str,
    family: IpFamily,
) -> DnsLookup {
    let mut executed = false;

    for strategy in strategies {
        match (strategy.query)(runner, name, family) {
            Ok(servers) if !servers.is_empty() => {
                debug!("{:?} DNS of {} via {}: {:?}", family, name, strategy.name, servers);
                return DnsLookup::Servers(servers);
            }
            Ok(_) => executed = true,
            Err(e) => debug!("{:?} DNS of {} via {} failed: {}", family, name, strategy.name, e),
        }
    }

    if executed {
        DnsLookup::NotConfigured
    } else {
        DnsLookup::Unavailable
    }
}

fn dns_from_netsh(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Result<Vec<String>> {
    let version = match family {
        IpFamily::V4 => "ipv4",
        IpFamily::V6 => "ipv6",
    };
    let output = run_text(
        runner,
        "netsh",
        &["interface", version, "show", "dnsservers", &format!("name={}", name)],
    )?;
    Ok(parse::parse_netsh_dns(&output, family))
}

fn dns_from_ipconfig(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Result<Vec<String>> {
    let output = run_text(runner, "ipconfig", &["/all"])?;
    Ok(parse::parse_ipconfig_values(&output, name, parse::IPCONFIG_DNS_LABELS)
        .into_iter()
        .filter(|addr| family.matches(addr))
        .map(|addr| addr.to_string())
        .collect())
}

fn dns_from_powershell(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Result<Vec<String>> {
    let script = format!(
        "(Get-DnsClientServerAddress -InterfaceAlias {} -AddressFamily {} -ErrorAction Stop).ServerAddresses",
        ps_quote(name),
        family_arg(family)
    );
    let output = run_powershell(runner, &script)?;
    Ok(parse::parse_address_list(&output, family))
}

fn dns_from_nmcli(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Result<Vec<String>> {
    let field = match family {
        IpFamily::V4 => "IP4.DNS",
        IpFamily::V6 => "IP6.DNS",
    };
    let output = run_text(runner, "nmcli", &["-g", field, "device", "show", name])?;
    Ok(parse::parse_address_list(&output, family))
}

fn dns_from_resolvectl(runner: &dyn CommandRunner, name: &str, family: IpFamily) -> Result<Vec<String>> {
    let output = run_text(runner, "resolvectl", &["dns", name])?;
    Ok(parse::parse_resolvectl_dns(&output, family))
}

// ---------------------------------------------------------------------------
// DHCP
// ---------------------------------------------------------------------------

/// Name of the NetworkManager connection active on a device.
pub fn active_connection(runner: &dyn CommandRunner, name: &str) -> Result<String> {
    let output = run_text(runner, "nmcli", &["-g", "GENERAL.CONNECTION", "device", "show", name])?;
    parse::parse_nmcli_value(&output)
        .ok_or_else(|| NetConfigError::query("active connection", format!("{} has no active connection", name)))
}

/// Whether IPv4 on the interface is currently obtained through DHCP.
pub fn query_dhcp(runner: &dyn CommandRunner, platform: Platform, name: &str) -> Result<bool> {
    match platform {
        Platform::Windows => {
            let output = run_text(
                runner,
                "netsh",
                &["interface", "ipv4", "show", "config", &format!("name={}", name)],
            )?;
            parse::parse_netsh_dhcp(&output).ok_or_else(|| {
                NetConfigError::query("DHCP state", format!("no DHCP line for {}", name))
            })
        }
        Platform::Linux => {
            let connection = active_connection(runner, name)?;
            let output = run_text(
                runner,
                "nmcli",
                &["-g", "ipv4.method", "connection", "show", &connection],
            )?;
            Ok(parse::parse_nmcli_value(&output).as_deref() == Some("auto"))
        }
        Platform::Other => Err(NetConfigError::UnsupportedPlatform(platform.name().to_string())),
    }
}
