//! OS-level link enumeration: names, MAC addresses, addresses and state.

use std::fs;
use std::net::IpAddr;

use sysinfo::Networks;

use crate::error::Result;

/// One address assigned to a link, with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAddress {
    pub addr: IpAddr,
    pub prefix: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub mac_address: String,
    pub addresses: Vec<LinkAddress>,
    pub is_up: bool,
    pub is_loopback: bool,
}

pub trait LinkSource: Send + Sync {
    fn links(&self) -> Result<Vec<Link>>;

    fn link(&self, name: &str) -> Result<Option<Link>> {
        Ok(self.links()?.into_iter().find(|l| l.name == name))
    }
}

/// Reads links from the running host via sysinfo, with link state taken
/// from sysfs where it exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLinks;

impl LinkSource for SystemLinks {
    fn links(&self) -> Result<Vec<Link>> {
        let networks = Networks::new_with_refreshed_list();

        let mut links: Vec<Link> = networks
            .iter()
            .map(|(name, data)| {
                let addresses: Vec<LinkAddress> = data
                    .ip_networks()
                    .iter()
                    .map(|net| LinkAddress {
                        addr: net.addr,
                        prefix: net.prefix,
                    })
                    .collect();
                let is_loopback = name == "lo"
                    || (!addresses.is_empty() && addresses.iter().all(|a| a.addr.is_loopback()));
                let is_up = read_operstate(name).unwrap_or(!addresses.is_empty());

                Link {
                    name: name.clone(),
                    mac_address: format_mac(&data.mac_address().to_string()),
                    addresses,
                    is_up,
                    is_loopback,
                }
            })
            .collect();

        links.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(links)
    }
}

/// `Some(up)` when the kernel exposes the link state, `None` elsewhere.
fn read_operstate(name: &str) -> Option<bool> {
    let state = fs::read_to_string(format!("/sys/class/net/{}/operstate", name)).ok()?;
    Some(state.trim() == "up")
}

/// Uppercase, colon separated; the all-zero address becomes empty.
pub fn format_mac(raw: &str) -> String {
    let mac = raw.trim().replace('-', ":").to_uppercase();
    if mac.is_empty() || mac.chars().all(|c| c == '0' || c == ':') {
        String::new()
    } else {
        mac
    }
}

/// Dotted IPv4 netmask for a prefix length.
pub fn prefix_to_mask(prefix: u8) -> String {
    let bits = match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p),
    };
    std::net::Ipv4Addr::from(bits).to_string()
}

/// Prefix length of a dotted IPv4 netmask. Non-contiguous masks are rejected.
pub fn mask_to_prefix(mask: &str) -> Option<u8> {
    let mask: std::net::Ipv4Addr = mask.trim().parse().ok()?;
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    (bits.checked_shl(prefix).unwrap_or(0) == 0).then_some(prefix as u8)
}
