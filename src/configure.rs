//! Address, gateway and resolver changes on a single interface.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::info;

use crate::addressing;
use crate::error::{ConfigStep, NetConfigError, Result};
use crate::interface::NetworkEngine;
use crate::links::{mask_to_prefix, prefix_to_mask};
use crate::models::{DNS_NONE, DNS_UNAVAILABLE, InterfaceConfig, Ipv4Config, Ipv6Config};
use crate::parse::IpFamily;
use crate::platform::Platform;
use crate::runner::{CommandRunner, run_checked};

/// Default IPv6 prefix when a request leaves it unset.
const DEFAULT_V6_PREFIX: u8 = 64;

/// Write commands of one host tool family.
///
/// `target` is whatever the tool addresses: the interface name for netsh,
/// the active connection profile for nmcli.
trait AddressWriter {
    fn target(&self, runner: &dyn CommandRunner, name: &str) -> Result<String>;
    fn enable_dhcp(&self, runner: &dyn CommandRunner, target: &str) -> Result<()>;
    fn enable_auto_dns(&self, runner: &dyn CommandRunner, target: &str) -> Result<()>;
    fn set_static_ipv4(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        ip: Ipv4Addr,
        prefix: u8,
        gateway: Option<Ipv4Addr>,
    ) -> Result<()>;
    fn set_static_ipv6(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        ip: Ipv6Addr,
        prefix: u8,
        gateway: Option<Ipv6Addr>,
    ) -> Result<()>;
    /// Index 0 replaces the resolver list, later indices append in order.
    fn write_dns(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        family: IpFamily,
        index: usize,
        server: IpAddr,
    ) -> Result<()>;
    /// Activates staged changes.
    fn commit(&self, _runner: &dyn CommandRunner, _target: &str) -> Result<()> {
        Ok(())
    }
}

struct NetshWriter;

fn netsh_family(family: IpFamily) -> &'static str {
    match family {
        IpFamily::V4 => "ipv4",
        IpFamily::V6 => "ipv6",
    }
}

impl AddressWriter for NetshWriter {
    fn target(&self, _runner: &dyn CommandRunner, name: &str) -> Result<String> {
        Ok(name.to_string())
    }

    fn enable_dhcp(&self, runner: &dyn CommandRunner, target: &str) -> Result<()> {
        run_checked(
            runner,
            "netsh",
            &["interface", "ipv4", "set", "address", &format!("name={}", target), "source=dhcp"],
        )
    }

    fn enable_auto_dns(&self, runner: &dyn CommandRunner, target: &str) -> Result<()> {
        run_checked(
            runner,
            "netsh",
            &["interface", "ipv4", "set", "dnsservers", &format!("name={}", target), "source=dhcp"],
        )
    }

    fn set_static_ipv4(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        ip: Ipv4Addr,
        prefix: u8,
        gateway: Option<Ipv4Addr>,
    ) -> Result<()> {
        let name = format!("name={}", target);
        let ip = ip.to_string();
        let mask = prefix_to_mask(prefix);
        let gateway = gateway.map(|gw| gw.to_string());

        let mut args = vec![
            "interface",
            "ipv4",
            "set",
            "address",
            name.as_str(),
            "static",
            ip.as_str(),
            mask.as_str(),
        ];
        if let Some(ref gw) = gateway {
            args.push(gw.as_str());
        }
        run_checked(runner, "netsh", &args)
    }

    fn set_static_ipv6(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        ip: Ipv6Addr,
        _prefix: u8,
        gateway: Option<Ipv6Addr>,
    ) -> Result<()> {
        run_checked(
            runner,
            "netsh",
            &[
                "interface",
                "ipv6",
                "set",
                "address",
                &format!("interface={}", target),
                &format!("address={}", ip),
                "store=persistent",
            ],
        )?;
        if let Some(gw) = gateway {
            run_checked(
                runner,
                "netsh",
                &[
                    "interface",
                    "ipv6",
                    "add",
                    "route",
                    "::/0",
                    &format!("interface={}", target),
                    &gw.to_string(),
                ],
            )?;
        }
        Ok(())
    }

    fn write_dns(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        family: IpFamily,
        index: usize,
        server: IpAddr,
    ) -> Result<()> {
        let name = format!("name={}", target);
        let server = server.to_string();
        if index == 0 {
            run_checked(
                runner,
                "netsh",
                &["interface", netsh_family(family), "set", "dns", &name, "static", &server],
            )
        } else {
            run_checked(
                runner,
                "netsh",
                &[
                    "interface",
                    netsh_family(family),
                    "add",
                    "dns",
                    &name,
                    &server,
                    &format!("index={}", index + 1),
                ],
            )
        }
    }
}

struct NmcliWriter;

fn nmcli_modify(runner: &dyn CommandRunner, connection: &str, settings: &[&str]) -> Result<()> {
    let mut args = vec!["connection", "modify", connection];
    args.extend_from_slice(settings);
    run_checked(runner, "nmcli", &args)
}

impl AddressWriter for NmcliWriter {
    fn target(&self, runner: &dyn CommandRunner, name: &str) -> Result<String> {
        addressing::active_connection(runner, name)
    }

    fn enable_dhcp(&self, runner: &dyn CommandRunner, target: &str) -> Result<()> {
        nmcli_modify(
            runner,
            target,
            &["ipv4.method", "auto", "ipv4.addresses", "", "ipv4.gateway", ""],
        )
    }

    fn enable_auto_dns(&self, runner: &dyn CommandRunner, target: &str) -> Result<()> {
        nmcli_modify(runner, target, &["ipv4.ignore-auto-dns", "no", "ipv4.dns", ""])
    }

    fn set_static_ipv4(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        ip: Ipv4Addr,
        prefix: u8,
        gateway: Option<Ipv4Addr>,
    ) -> Result<()> {
        let address = format!("{}/{}", ip, prefix);
        let gateway = gateway.map(|gw| gw.to_string()).unwrap_or_default();
        nmcli_modify(
            runner,
            target,
            &["ipv4.method", "manual", "ipv4.addresses", &address, "ipv4.gateway", &gateway],
        )
    }

    fn set_static_ipv6(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        ip: Ipv6Addr,
        prefix: u8,
        gateway: Option<Ipv6Addr>,
    ) -> Result<()> {
        let address = format!("{}/{}", ip, prefix);
        let gateway = gateway.map(|gw| gw.to_string()).unwrap_or_default();
        nmcli_modify(
            runner,
            target,
            &["ipv6.method", "manual", "ipv6.addresses", &address, "ipv6.gateway", &gateway],
        )
    }

    fn write_dns(
        &self,
        runner: &dyn CommandRunner,
        target: &str,
        family: IpFamily,
        index: usize,
        server: IpAddr,
    ) -> Result<()> {
        let (set_key, add_key, ignore_key) = match family {
            IpFamily::V4 => ("ipv4.dns", "+ipv4.dns", "ipv4.ignore-auto-dns"),
            IpFamily::V6 => ("ipv6.dns", "+ipv6.dns", "ipv6.ignore-auto-dns"),
        };
        let server = server.to_string();
        if index == 0 {
            nmcli_modify(runner, target, &[ignore_key, "yes", set_key, &server])
        } else {
            nmcli_modify(runner, target, &[add_key, &server])
        }
    }

    fn commit(&self, runner: &dyn CommandRunner, target: &str) -> Result<()> {
        run_checked(runner, "nmcli", &["connection", "up", target])
    }
}

fn invalid(message: String) -> NetConfigError {
    NetConfigError::Validation(message)
}

/// Parses resolver entries, skipping the read-side sentinels so a record
/// fetched earlier can be sent back unchanged.
fn parse_dns(entries: &[String], family: IpFamily) -> Result<Vec<IpAddr>> {
    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty() && *entry != DNS_NONE && *entry != DNS_UNAVAILABLE)
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .ok()
                .filter(|addr| family.matches(addr))
                .ok_or_else(|| invalid(format!("invalid {:?} DNS server '{}'", family, entry)))
        })
        .collect()
}

fn write_dns_list(
    writer: &dyn AddressWriter,
    runner: &dyn CommandRunner,
    target: &str,
    family: IpFamily,
    servers: &[IpAddr],
) -> Result<()> {
    for (index, server) in servers.iter().enumerate() {
        writer.write_dns(runner, target, family, index, *server)?;
    }
    Ok(())
}

impl NetworkEngine {
    fn writer(&self) -> Result<Box<dyn AddressWriter>> {
        match self.platform {
            Platform::Windows => Ok(Box::new(NetshWriter)),
            Platform::Linux => Ok(Box::new(NmcliWriter)),
            Platform::Other => Err(NetConfigError::UnsupportedPlatform(
                "interface configuration".to_string(),
            )),
        }
    }

    /// Applies the IPv4 part, then the IPv6 part; absent parts are left
    /// alone. A failure names the family it happened in.
    pub fn configure_interface(&self, name: &str, config: &InterfaceConfig) -> Result<()> {
        let writer = self.writer()?;

        if let Some(ref v4) = config.ipv4_config {
            info!("Configuring IPv4 on {}: {:?}", name, v4);
            self.configure_ipv4(writer.as_ref(), name, v4)
                .map_err(|e| NetConfigError::configuration(ConfigStep::Ipv4, e))?;
        }
        if let Some(ref v6) = config.ipv6_config {
            info!("Configuring IPv6 on {}: {:?}", name, v6);
            self.configure_ipv6(writer.as_ref(), name, v6)
                .map_err(|e| NetConfigError::configuration(ConfigStep::Ipv6, e))?;
        }
        Ok(())
    }

    fn configure_ipv4(&self, writer: &dyn AddressWriter, name: &str, config: &Ipv4Config) -> Result<()> {
        let runner = self.runner.as_ref();

        if config.dhcp {
            let servers = parse_dns(&config.dns, IpFamily::V4)?;
            if !self.interface_exists(name)? {
                return Err(NetConfigError::InterfaceNotFound(name.to_string()));
            }
            let target = writer.target(runner, name)?;
            let mut changed = false;

            if addressing::query_dhcp(runner, self.platform, name)? {
                info!("{} already uses DHCP", name);
            } else {
                writer.enable_dhcp(runner, &target)?;
                changed = true;
            }

            if config.dns_auto {
                writer.enable_auto_dns(runner, &target)?;
                changed = true;
            } else if !servers.is_empty() {
                write_dns_list(writer, runner, &target, IpFamily::V4, &servers)?;
                changed = true;
            }

            if changed {
                writer.commit(runner, &target)?;
            }
            return Ok(());
        }

        let ip: Ipv4Addr = config
            .ip
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid IPv4 address '{}'", config.ip)))?;
        let prefix = mask_to_prefix(&config.mask)
            .ok_or_else(|| invalid(format!("invalid subnet mask '{}'", config.mask)))?;
        let gateway = match config.gateway.trim() {
            "" => None,
            gw => Some(
                gw.parse::<Ipv4Addr>()
                    .map_err(|_| invalid(format!("invalid IPv4 gateway '{}'", gw)))?,
            ),
        };
        let servers = parse_dns(&config.dns, IpFamily::V4)?;

        if !self.interface_exists(name)? {
            return Err(NetConfigError::InterfaceNotFound(name.to_string()));
        }

        let target = writer.target(runner, name)?;
        writer.set_static_ipv4(runner, &target, ip, prefix, gateway)?;
        write_dns_list(writer, runner, &target, IpFamily::V4, &servers)?;
        writer.commit(runner, &target)?;
        info!("Static IPv4 {}/{} applied to {}", ip, prefix, name);
        Ok(())
    }

    fn configure_ipv6(&self, writer: &dyn AddressWriter, name: &str, config: &Ipv6Config) -> Result<()> {
        let runner = self.runner.as_ref();

        let ip: Ipv6Addr = config
            .ip
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid IPv6 address '{}'", config.ip)))?;
        if config.prefix_len > 128 {
            return Err(invalid(format!("invalid IPv6 prefix length {}", config.prefix_len)));
        }
        let prefix = if config.prefix_len == 0 { DEFAULT_V6_PREFIX } else { config.prefix_len };
        let gateway = match config.gateway.trim() {
            "" => None,
            gw => Some(
                gw.split('%')
                    .next()
                    .unwrap_or(gw)
                    .parse::<Ipv6Addr>()
                    .map_err(|_| invalid(format!("invalid IPv6 gateway '{}'", gw)))?,
            ),
        };
        let servers = parse_dns(&config.dns, IpFamily::V6)?;

        if !self.interface_exists(name)? {
            return Err(NetConfigError::InterfaceNotFound(name.to_string()));
        }

        let target = writer.target(runner, name)?;
        writer.set_static_ipv6(runner, &target, ip, prefix, gateway)?;
        write_dns_list(writer, runner, &target, IpFamily::V6, &servers)?;
        writer.commit(runner, &target)?;
        info!("Static IPv6 {}/{} applied to {}", ip, prefix, name);
        Ok(())
    }
}
