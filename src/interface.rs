use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::addressing::{self, DnsLookup};
use crate::error::{NetConfigError, Result};
use crate::hardware;
use crate::links::{Link, LinkSource, prefix_to_mask};
use crate::models::{InterfaceRecord, InterfaceSummary, Ipv4Config, Ipv6Config, LinkStatus};
use crate::parse::IpFamily;
use crate::platform::Platform;
use crate::runner::CommandRunner;

/// Signatures of adapters that are not physical network cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceFilter {
    /// Case-insensitive name fragments (Hyper-V, VPN clients, hypervisors).
    pub name_contains: Vec<String>,
    /// Name prefixes (containers, bridges, tunnels).
    pub name_prefixes: Vec<String>,
    /// Product-name fragments of adapters to hide.
    pub excluded_products: Vec<String>,
}

impl Default for InterfaceFilter {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        InterfaceFilter {
            name_contains: owned(&["virtual", "vethernet", "wireguard", "virtualbox", "vmware", "vpn"]),
            name_prefixes: owned(&["docker", "veth", "br-", "virbr", "tun"]),
            excluded_products: owned(&["KM-TEST"]),
        }
    }
}

impl InterfaceFilter {
    pub fn is_virtual(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.name_contains
            .iter()
            .any(|fragment| lower.contains(&fragment.to_lowercase()))
            || self.name_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn is_excluded_product(&self, product: &str) -> bool {
        self.excluded_products
            .iter()
            .any(|fragment| !fragment.is_empty() && product.contains(fragment.as_str()))
    }
}

/// Interface discovery, classification and reconfiguration over the host's
/// tooling.
pub struct NetworkEngine {
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) links: Arc<dyn LinkSource>,
    pub(crate) platform: Platform,
    filter: InterfaceFilter,
    bypass_filter: bool,
}

impl NetworkEngine {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        links: Arc<dyn LinkSource>,
        platform: Platform,
        filter: InterfaceFilter,
    ) -> Self {
        NetworkEngine {
            runner,
            links,
            platform,
            filter,
            bypass_filter: false,
        }
    }

    /// Lists every interface unfiltered, for diagnostics.
    pub fn with_filter_bypass(mut self, bypass: bool) -> Self {
        self.bypass_filter = bypass;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn interface_exists(&self, name: &str) -> Result<bool> {
        Ok(self.links.link(name)?.is_some())
    }

    fn skip_link(&self, link: &Link) -> bool {
        if self.bypass_filter {
            return false;
        }
        if link.is_loopback {
            debug!("Skipping loopback interface {}", link.name);
            return true;
        }
        if self.filter.is_virtual(&link.name) {
            debug!("Skipping virtual interface {}", link.name);
            return true;
        }
        false
    }

    /// Full records for every physical interface.
    ///
    /// Interfaces whose hardware cannot be identified are dropped, not
    /// reported: a record without MAC and product name is not a usable
    /// adapter.
    pub fn list_interfaces(&self) -> Result<Vec<InterfaceRecord>> {
        let links = self.links.links()?;
        info!("Found {} network interfaces", links.len());

        let mut records = Vec::new();
        for link in links.iter().filter(|l| !self.skip_link(l)) {
            let record = match self.build_record(link) {
                Ok(record) => record,
                Err(NetConfigError::HardwareUnavailable { partial, .. }) if self.bypass_filter => *partial,
                Err(e) => {
                    debug!("Dropping {}: {}", link.name, e);
                    continue;
                }
            };

            if !self.bypass_filter {
                if !record.hardware.is_usable() {
                    debug!("Dropping {}: no MAC address or product name", record.name);
                    continue;
                }
                if self.filter.is_excluded_product(&record.hardware.product_name) {
                    debug!("Dropping {}: excluded product {}", record.name, record.hardware.product_name);
                    continue;
                }
            }
            records.push(record);
        }

        if records.is_empty() {
            warn!("No usable network interfaces found");
        }
        Ok(records)
    }

    /// Name, state and product name only, wireless adapters first.
    pub fn list_interfaces_fast(&self) -> Result<Vec<InterfaceSummary>> {
        let links = self.links.links()?;

        let mut summaries = Vec::new();
        for link in links.iter().filter(|l| !self.skip_link(l)) {
            if link.mac_address.is_empty() && !self.bypass_filter {
                debug!("Skipping {}: no MAC address", link.name);
                continue;
            }

            let product_name =
                match hardware::resolve_hardware(self.runner.as_ref(), self.platform, &link.name, &link.mac_address) {
                    Ok(hw) => {
                        if !self.bypass_filter
                            && (hw.product_name.is_empty() || self.filter.is_excluded_product(&hw.product_name))
                        {
                            debug!("Skipping {}: product {:?}", link.name, hw.product_name);
                            continue;
                        }
                        hw.product_name
                    }
                    Err(_) => String::new(),
                };

            summaries.push(InterfaceSummary {
                name: link.name.clone(),
                status: link_status(link),
                product_name,
            });
        }

        if summaries.is_empty() {
            warn!("No usable network interfaces found");
        }
        summaries.sort_by_key(|s| !hardware::looks_wireless(self.platform, &s.name));
        Ok(summaries)
    }

    /// Full record for one interface.
    ///
    /// When the hardware descriptor cannot be resolved the error carries the
    /// otherwise complete record.
    pub fn get_interface(&self, name: &str) -> Result<InterfaceRecord> {
        let link = self
            .links
            .link(name)?
            .ok_or_else(|| NetConfigError::InterfaceNotFound(name.to_string()))?;
        self.build_record(&link)
    }

    fn build_record(&self, link: &Link) -> Result<InterfaceRecord> {
        let runner = self.runner.as_ref();
        let name = link.name.as_str();

        let (hardware, hardware_error) =
            match hardware::resolve_hardware(runner, self.platform, name, &link.mac_address) {
                Ok(hw) => (hw, None),
                Err(failure) => (failure.minimal, Some(failure.detail)),
            };

        let dhcp_enabled = addressing::query_dhcp(runner, self.platform, name).unwrap_or_else(|e| {
            debug!("DHCP state of {} unknown: {}", name, e);
            false
        });

        let v4 = link.addresses.iter().find(|a| a.addr.is_ipv4());
        let v6 = link
            .addresses
            .iter()
            .filter(|a| a.addr.is_ipv6())
            .min_by_key(|a| is_link_local(&a.addr));

        let ipv4_config = Ipv4Config {
            ip: v4.map(|a| a.addr.to_string()).unwrap_or_default(),
            mask: v4.map(|a| prefix_to_mask(a.prefix)).unwrap_or_default(),
            gateway: if v4.is_some() { self.gateway(name, IpFamily::V4) } else { String::new() },
            dns: self.dns(name, IpFamily::V4),
            dhcp: dhcp_enabled,
            dns_auto: dhcp_enabled,
        };
        let ipv6_config = Ipv6Config {
            ip: v6.map(|a| a.addr.to_string()).unwrap_or_default(),
            prefix_len: v6.map(|a| a.prefix).unwrap_or_default(),
            gateway: if v6.is_some() { self.gateway(name, IpFamily::V6) } else { String::new() },
            dns: self.dns(name, IpFamily::V6),
        };

        let driver = hardware::resolve_driver(runner, self.platform, name).unwrap_or_else(|e| {
            debug!("Driver details of {} unavailable: {}", name, e);
            hardware::unknown_driver(name)
        });

        let mut record = InterfaceRecord {
            name: name.to_string(),
            status: link_status(link),
            connected_ssid: None,
            dhcp_enabled,
            ipv4_config,
            ipv6_config,
            hardware,
            driver,
        };

        if record.is_wireless() {
            match hardware::connected_ssid(runner, self.platform, name) {
                Ok(ssid) => record.connected_ssid = ssid,
                Err(e) => warn!("Could not determine the network {} is connected to: {}", name, e),
            }
        }

        match hardware_error {
            None => Ok(record),
            Some(detail) => Err(NetConfigError::HardwareUnavailable {
                name: name.to_string(),
                detail,
                partial: Box::new(record),
            }),
        }
    }

    fn gateway(&self, name: &str, family: IpFamily) -> String {
        addressing::resolve_gateway(
            self.runner.as_ref(),
            addressing::gateway_strategies(self.platform),
            name,
            family,
        )
        .map(|gw| gw.to_string())
        .unwrap_or_default()
    }

    fn dns(&self, name: &str, family: IpFamily) -> Vec<String> {
        let lookup = addressing::resolve_dns(
            self.runner.as_ref(),
            addressing::dns_strategies(self.platform),
            name,
            family,
        );
        if lookup == DnsLookup::Unavailable {
            warn!("{:?} DNS servers of {} could not be queried", family, name);
        }
        lookup.into_list()
    }
}

fn link_status(link: &Link) -> LinkStatus {
    if link.is_up { LinkStatus::Up } else { LinkStatus::Down }
}

fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        IpAddr::V4(v4) => v4.is_link_local(),
    }
}
