//! Single entry point used by the CLI and the HTTP layer.

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, ConnectivityConfig};
use crate::connection;
use crate::error::Result;
use crate::hotspot::HotspotController;
use crate::interface::NetworkEngine;
use crate::links::SystemLinks;
use crate::models::{
    ConnectivityResult, HotspotConfigRequest, HotspotStatus, InterfaceConfig, InterfaceRecord,
    InterfaceSummary, WifiScanRecord,
};
use crate::monitor::{HotspotMonitor, MonitorSettings};
use crate::platform::Platform;
use crate::runner::SystemRunner;

pub struct NetworkService {
    engine: NetworkEngine,
    hotspot: Arc<HotspotController>,
    monitor: HotspotMonitor,
    connectivity: ConnectivityConfig,
}

impl NetworkService {
    pub fn new(
        engine: NetworkEngine,
        hotspot: Arc<HotspotController>,
        monitor: MonitorSettings,
        connectivity: ConnectivityConfig,
    ) -> Self {
        let monitor = HotspotMonitor::new(hotspot.clone(), monitor);
        NetworkService {
            engine,
            hotspot,
            monitor,
            connectivity,
        }
    }

    /// Wires the real host tooling.
    pub fn from_config(config: &Config) -> Self {
        let platform = Platform::current();
        let runner = Arc::new(SystemRunner);
        info!("Platform: {}, debug mode: {}", platform.name(), config.debug);

        let engine = NetworkEngine::new(
            runner.clone(),
            Arc::new(SystemLinks),
            platform,
            config.filter.clone(),
        )
        .with_filter_bypass(config.debug);
        let hotspot = Arc::new(HotspotController::for_platform(runner, platform, config.debug));

        NetworkService::new(
            engine,
            hotspot,
            config.monitor.settings(),
            config.connectivity.clone(),
        )
    }

    pub fn engine(&self) -> &NetworkEngine {
        &self.engine
    }

    pub fn list_interfaces(&self) -> Result<Vec<InterfaceRecord>> {
        self.engine.list_interfaces()
    }

    pub fn list_interfaces_fast(&self) -> Result<Vec<InterfaceSummary>> {
        self.engine.list_interfaces_fast()
    }

    pub fn get_interface(&self, name: &str) -> Result<InterfaceRecord> {
        self.engine.get_interface(name)
    }

    pub fn configure_interface(&self, name: &str, config: &InterfaceConfig) -> Result<()> {
        self.engine.configure_interface(name, config)
    }

    pub fn scan_wifi(&self, interface: &str) -> Result<Vec<WifiScanRecord>> {
        self.engine.scan_wifi(interface)
    }

    pub fn connect_wifi(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        self.engine.connect_wifi(interface, ssid, password)
    }

    /// Probes `target`, or the configured default target when none is given.
    pub fn check_connectivity(&self, target: Option<&str>) -> ConnectivityResult {
        let target = target
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.connectivity.default_target);
        connection::check_connectivity(target, self.connectivity.timeout())
    }

    pub fn get_hotspot_status(&self) -> Result<HotspotStatus> {
        self.hotspot.status()
    }

    pub fn configure_hotspot(&self, request: &HotspotConfigRequest) -> Result<()> {
        self.hotspot.configure(request)
    }

    pub fn set_hotspot_enabled(&self, enabled: bool) -> Result<()> {
        self.hotspot.set_enabled(enabled)
    }

    /// Starts background hotspot supervision. Needs a tokio runtime.
    pub fn start_hotspot_monitor(&self) -> bool {
        self.monitor.start()
    }

    /// Stops supervision and waits for the loop to exit.
    pub async fn stop_hotspot_monitor(&self) {
        self.monitor.stop().await
    }

    pub fn hotspot_monitor(&self) -> &HotspotMonitor {
        &self.monitor
    }
}
