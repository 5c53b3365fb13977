//! Network interface and Wi-Fi hotspot management.
//!
//! This library inspects and reconfigures the host's network adapters by
//! driving the platform tooling (`netsh`, `ipconfig` and PowerShell on
//! Windows; `ip`, `nmcli`, `udevadm` and `iwlist` on Linux) and parsing what
//! it prints, in English or Chinese locales, UTF-8 or GBK.
//!
//! # Modules
//!
//! - [`interface`] - Enumeration and classification of physical adapters
//! - [`configure`] - IPv4/IPv6 address, gateway and DNS changes
//! - [`scan`] - Wi-Fi scanning
//! - [`connection`] - Joining Wi-Fi networks and connectivity probing
//! - [`hotspot`] - Hotspot control over the tethering and hosted-network backends
//! - [`monitor`] - Background hotspot health supervision
//! - [`parse`] - Parsers for the tooling output
//! - [`service`] - Facade used by the CLI and the HTTP API
//! - [`server`] - HTTP API
//! - [`config`] - Configuration file and environment overrides
//!
//! # Example Usage
//!
//! ```no_run
//! use netconfig::{config::Config, NetworkService};
//!
//! let config = Config::load().expect("Failed to load config");
//! let service = NetworkService::from_config(&config);
//!
//! for iface in service.list_interfaces_fast().expect("Listing failed") {
//!     println!("{} ({})", iface.name, iface.product_name);
//! }
//! ```

pub mod addressing;
pub mod config;
pub mod configure;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod hardware;
pub mod hotspot;
pub mod interface;
pub mod links;
pub mod models;
pub mod monitor;
pub mod parse;
pub mod platform;
pub mod runner;
pub mod scan;
pub mod server;
pub mod service;

pub use error::{ConfigStep, NetConfigError, Result};
pub use hotspot::{BackendKind, HotspotBackend, HotspotController};
pub use interface::{InterfaceFilter, NetworkEngine};
pub use links::{Link, LinkAddress, LinkSource, SystemLinks};
pub use models::*;
pub use monitor::{HotspotControl, HotspotMonitor, MonitorSettings, TickOutcome};
pub use platform::Platform;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use service::NetworkService;
