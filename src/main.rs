use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use netconfig::{
    config::{self, Config},
    models::{HotspotConfigRequest, InterfaceConfig, Ipv4Config, Ipv6Config, InterfaceRecord, LinkStatus},
    scan, server, NetConfigError, NetworkService,
};

#[derive(Parser)]
#[command(name = "netconfig")]
#[command(about = "Inspect and configure network interfaces and the Wi-Fi hotspot")]
#[command(version)]
struct Cli {
    /// List every interface unfiltered and enable hotspot diagnostics
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List physical network interfaces
    ListInterfaces {
        /// Resolve full details (addresses, DNS, driver) for every interface
        #[arg(short, long)]
        all: bool,
    },

    /// Show full details of one interface
    Show {
        name: String,
    },

    /// Scan for Wi-Fi networks
    Scan {
        /// Wireless interface to scan with
        #[arg(short, long)]
        interface: String,
    },

    /// Switch an interface to DHCP with automatic DNS
    SetDhcp {
        name: String,
    },

    /// Assign a static IPv4 address
    SetStatic {
        name: String,

        #[arg(long)]
        ip: String,

        #[arg(long, default_value = "255.255.255.0")]
        mask: String,

        #[arg(long)]
        gateway: Option<String>,

        /// DNS servers in priority order
        #[arg(long, value_delimiter = ',')]
        dns: Vec<String>,
    },

    /// Assign a static IPv6 address
    SetIpv6 {
        name: String,

        #[arg(long)]
        ip: String,

        #[arg(long, default_value = "64")]
        prefix_len: u8,

        #[arg(long)]
        gateway: Option<String>,

        #[arg(long, value_delimiter = ',')]
        dns: Vec<String>,
    },

    /// Connect a wireless interface to a network
    Connect {
        ssid: String,

        #[arg(short, long)]
        interface: String,

        /// Password (omit for open networks)
        #[arg(short, long, default_value = "")]
        password: String,
    },

    /// Check internet connectivity
    Check {
        /// URL to probe (defaults to the configured target)
        target: Option<String>,
    },

    /// Control the Wi-Fi hotspot
    Hotspot {
        #[command(subcommand)]
        action: HotspotAction,
    },

    /// Start the HTTP API and the hotspot monitor
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[derive(Subcommand)]
enum HotspotAction {
    /// Show hotspot state
    Status,
    /// Switch the hotspot on
    Enable,
    /// Switch the hotspot off
    Disable,
    /// Set SSID and passphrase
    Configure {
        ssid: String,

        #[arg(short, long)]
        password: String,

        /// Switch the hotspot on afterwards
        #[arg(short, long)]
        enable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load()?;
    cfg.debug |= cli.debug;
    init_tracing(cfg.debug);

    let service = || NetworkService::from_config(&cfg);
    match cli.command {
        Commands::ListInterfaces { all } => cmd_list_interfaces(&service(), all),
        Commands::Show { name } => cmd_show(&service(), &name),
        Commands::Scan { interface } => cmd_scan(&service(), &interface),
        Commands::SetDhcp { name } => cmd_set_dhcp(&service(), &name),
        Commands::SetStatic {
            name,
            ip,
            mask,
            gateway,
            dns,
        } => {
            let ipv4 = Ipv4Config {
                ip,
                mask,
                gateway: gateway.unwrap_or_default(),
                dns,
                dhcp: false,
                dns_auto: false,
            };
            cmd_configure(&service(), &name, Some(ipv4), None)
        }
        Commands::SetIpv6 {
            name,
            ip,
            prefix_len,
            gateway,
            dns,
        } => {
            let ipv6 = Ipv6Config {
                ip,
                prefix_len,
                gateway: gateway.unwrap_or_default(),
                dns,
            };
            cmd_configure(&service(), &name, None, Some(ipv6))
        }
        Commands::Connect {
            ssid,
            interface,
            password,
        } => cmd_connect(&service(), &interface, &ssid, &password),
        Commands::Check { target } => cmd_check(&service(), target.as_deref()),
        Commands::Hotspot { action } => cmd_hotspot(&service(), action),
        Commands::Serve { port } => cmd_serve(service(), cfg.server.port, port).await,
        Commands::ShowConfig => cmd_show_config(&cfg),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_list_interfaces(service: &NetworkService, all: bool) -> Result<()> {
    if all {
        let records = service.list_interfaces()?;
        if records.is_empty() {
            println!("No network interfaces found.");
            return Ok(());
        }
        println!("{:<24} {:<6} {:<18} {:<16} {}", "INTERFACE", "STATE", "MAC", "IPV4", "PRODUCT");
        println!("{}", "-".repeat(90));
        for r in records {
            println!(
                "{:<24} {:<6} {:<18} {:<16} {}",
                r.name,
                status_label(r.status),
                r.hardware.mac_address,
                r.ipv4_config.ip,
                r.hardware.product_name
            );
        }
        return Ok(());
    }

    let interfaces = service.list_interfaces_fast()?;
    if interfaces.is_empty() {
        println!("No network interfaces found.");
        return Ok(());
    }

    println!("{:<24} {:<6} {}", "INTERFACE", "STATE", "PRODUCT");
    println!("{}", "-".repeat(60));
    for iface in interfaces {
        println!("{:<24} {:<6} {}", iface.name, status_label(iface.status), iface.product_name);
    }

    Ok(())
}

fn status_label(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Up => "up",
        LinkStatus::Down => "down",
    }
}

fn cmd_show(service: &NetworkService, name: &str) -> Result<()> {
    let record = match service.get_interface(name) {
        Ok(record) => record,
        Err(NetConfigError::HardwareUnavailable { detail, partial, .. }) => {
            eprintln!("warning: hardware details unavailable: {}", detail);
            *partial
        }
        Err(e) => return Err(e.into()),
    };
    display_record(&record);
    Ok(())
}

fn display_record(r: &InterfaceRecord) {
    println!("Interface: {}", r.name);
    println!("State:     {}", status_label(r.status));
    if let Some(ref ssid) = r.connected_ssid {
        println!("Network:   {}", ssid);
    }
    println!("DHCP:      {}", if r.dhcp_enabled { "yes" } else { "no" });
    println!();
    println!("IPv4:      {} / {}", r.ipv4_config.ip, r.ipv4_config.mask);
    println!("Gateway:   {}", r.ipv4_config.gateway);
    println!("DNS:       {}", r.ipv4_config.dns.join(", "));
    println!("IPv6:      {}/{}", r.ipv6_config.ip, r.ipv6_config.prefix_len);
    println!("Gateway6:  {}", r.ipv6_config.gateway);
    println!("DNS6:      {}", r.ipv6_config.dns.join(", "));
    println!();
    println!("MAC:       {}", r.hardware.mac_address);
    println!("Product:   {}", r.hardware.product_name);
    println!("Vendor:    {}", r.hardware.manufacturer);
    println!("Media:     {}", r.hardware.physical_media);
    println!("Speed:     {}", r.hardware.speed);
    println!("Bus:       {}", r.hardware.bus_type);
    println!("Driver:    {} {} ({})", r.driver.name, r.driver.version, r.driver.date_installed);
}

fn cmd_scan(service: &NetworkService, interface: &str) -> Result<()> {
    println!("Scanning on interface: {}", interface);
    println!();

    let networks = service.scan_wifi(interface)?;
    scan::display_networks(&networks);

    Ok(())
}

fn cmd_set_dhcp(service: &NetworkService, name: &str) -> Result<()> {
    let ipv4 = Ipv4Config {
        dhcp: true,
        dns_auto: true,
        ..Default::default()
    };
    cmd_configure(service, name, Some(ipv4), None)
}

fn cmd_configure(
    service: &NetworkService,
    name: &str,
    ipv4: Option<Ipv4Config>,
    ipv6: Option<Ipv6Config>,
) -> Result<()> {
    let config = InterfaceConfig {
        ipv4_config: ipv4,
        ipv6_config: ipv6,
    };
    service
        .configure_interface(name, &config)
        .with_context(|| format!("Failed to configure {}", name))?;
    println!("Configured {}.", name);
    Ok(())
}

fn cmd_connect(service: &NetworkService, interface: &str, ssid: &str, password: &str) -> Result<()> {
    println!("Connecting to '{}' on interface {}...", ssid, interface);
    service.connect_wifi(interface, ssid, password)?;
    println!("Connected successfully!");
    Ok(())
}

fn cmd_check(service: &NetworkService, target: Option<&str>) -> Result<()> {
    let result = service.check_connectivity(target);
    if result.success {
        println!(
            "{} reachable (HTTP {}, {} ms)",
            result.target, result.status_code, result.duration_ms
        );
    } else {
        println!("{} unreachable after {} ms: {}", result.target, result.duration_ms, result.error);
    }
    Ok(())
}

fn cmd_hotspot(service: &NetworkService, action: HotspotAction) -> Result<()> {
    match action {
        HotspotAction::Status => {
            let status = service.get_hotspot_status()?;
            println!("Enabled:  {}", status.enabled);
            println!("SSID:     {}", status.ssid);
            println!("Auth:     {}", status.authentication);
            println!("Cipher:   {}", status.encryption);
            println!("Clients:  {}/{}", status.clients_count, status.max_client_count);
        }
        HotspotAction::Enable => {
            service.set_hotspot_enabled(true)?;
            println!("Hotspot enabled.");
        }
        HotspotAction::Disable => {
            service.set_hotspot_enabled(false)?;
            println!("Hotspot disabled.");
        }
        HotspotAction::Configure { ssid, password, enable } => {
            service.configure_hotspot(&HotspotConfigRequest::new(ssid, password, enable))?;
            println!("Hotspot configured.");
        }
    }
    Ok(())
}

async fn cmd_serve(service: NetworkService, default_port: u16, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(default_port);
    let service = Arc::new(service);

    service.start_hotspot_monitor();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Shutting down");
    };
    let served = server::run_server(service.clone(), port, shutdown).await;
    service.stop_hotspot_monitor().await;

    served
}

fn cmd_show_config(cfg: &Config) -> Result<()> {
    let path = config::config_path()?;
    println!("Config file: {}", path.display());
    println!();
    let text = toml::to_string_pretty(cfg).context("Failed to serialize config")?;
    println!("{}", text);
    Ok(())
}
