//! Background hotspot supervision.
//!
//! The monitor polls the hotspot status on a fixed interval. A failed query
//! is only logged. A hotspot reported as down or unhealthy is cycled off and
//! on again when auto-recovery is enabled, at most once per tick. Errors
//! never leave the monitor; they end in the log.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{NetConfigError, Result};
use crate::hotspot::HotspotController;
use crate::models::HotspotStatus;

/// The hotspot operations the monitor needs.
pub trait HotspotControl: Send + Sync + 'static {
    fn status(&self) -> Result<HotspotStatus>;
    fn set_enabled(&self, enabled: bool) -> Result<()>;
}

impl HotspotControl for HotspotController {
    fn status(&self) -> Result<HotspotStatus> {
        HotspotController::status(self)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        HotspotController::set_enabled(self, enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub auto_recovery: bool,
    /// Pause between switching the hotspot off and on again.
    pub settle_delay: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            enabled: true,
            interval: Duration::from_secs(30),
            auto_recovery: true,
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// What a single check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    QueryFailed,
    /// Anomaly seen, auto-recovery disabled.
    AnomalyIgnored,
    Recovered,
    RecoveryFailed,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct HotspotMonitor {
    control: Arc<dyn HotspotControl>,
    settings: MonitorSettings,
    running: Mutex<Option<Running>>,
}

impl HotspotMonitor {
    pub fn new(control: Arc<dyn HotspotControl>, settings: MonitorSettings) -> Self {
        HotspotMonitor {
            control,
            settings,
            running: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    /// Spawns the supervision loop on the current tokio runtime and returns
    /// at once. Returns false when the monitor is disabled, already running
    /// or there is no runtime to spawn on.
    pub fn start(&self) -> bool {
        if !self.settings.enabled {
            info!("Hotspot monitor disabled");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Cannot start hotspot monitor: {}", e);
                return false;
            }
        };

        let mut slot = self.slot();
        if slot.is_some() {
            debug!("Hotspot monitor already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_loop(
            self.control.clone(),
            self.settings.clone(),
            cancel.clone(),
        ));
        *slot = Some(Running { cancel, handle });

        info!(
            "Hotspot monitor started (interval {:?}, auto-recovery {})",
            self.settings.interval, self.settings.auto_recovery
        );
        true
    }

    /// Cancels the loop and waits until it has exited. A check already in
    /// progress runs to completion first.
    pub async fn stop(&self) {
        let running = self.slot().take();
        let Some(Running { cancel, handle }) = running else {
            return;
        };

        cancel.cancel();
        if let Err(e) = handle.await {
            error!("Hotspot monitor task ended abnormally: {}", e);
        }
        info!("Hotspot monitor stopped");
    }

    /// Runs one check outside the loop.
    pub async fn check_once(&self) -> TickOutcome {
        check_hotspot(&self.control, &self.settings, &CancellationToken::new()).await
    }

    fn slot(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run_loop(control: Arc<dyn HotspotControl>, settings: MonitorSettings, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                check_hotspot(&control, &settings, &cancel).await;
            }
        }
    }
    debug!("Hotspot monitor loop exited");
}

async fn check_hotspot(
    control: &Arc<dyn HotspotControl>,
    settings: &MonitorSettings,
    cancel: &CancellationToken,
) -> TickOutcome {
    debug!("Checking hotspot status");
    match blocking(control, |c| c.status()).await {
        Err(e) => {
            warn!("Hotspot status check failed: {}", e);
            return TickOutcome::QueryFailed;
        }
        Ok(status) if status.success && status.enabled => {
            debug!("Hotspot healthy");
            return TickOutcome::Healthy;
        }
        Ok(status) => warn!(
            "Hotspot anomaly: success={}, enabled={}",
            status.success, status.enabled
        ),
    }

    if !settings.auto_recovery {
        info!("Auto-recovery disabled, leaving the hotspot as it is");
        return TickOutcome::AnomalyIgnored;
    }
    recover(control, settings.settle_delay, cancel).await
}

/// Off, settle, on. Shutdown during the settle delay cuts the delay short
/// but still switches the hotspot back on.
async fn recover(control: &Arc<dyn HotspotControl>, settle: Duration, cancel: &CancellationToken) -> TickOutcome {
    info!("Recovering hotspot");

    if let Err(e) = blocking(control, |c| c.set_enabled(false)).await {
        error!("Hotspot recovery aborted, could not stop the hotspot: {}", e);
        return TickOutcome::RecoveryFailed;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => debug!("Shutdown requested during settle delay"),
        _ = tokio::time::sleep(settle) => {}
    }

    if let Err(e) = blocking(control, |c| c.set_enabled(true)).await {
        error!("Hotspot recovery failed, could not restart the hotspot: {}", e);
        return TickOutcome::RecoveryFailed;
    }

    info!("Hotspot recovered");
    TickOutcome::Recovered
}

async fn blocking<T, F>(control: &Arc<dyn HotspotControl>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn HotspotControl) -> Result<T> + Send + 'static,
{
    let control = control.clone();
    tokio::task::spawn_blocking(move || op(control.as_ref()))
        .await
        .unwrap_or_else(|e| Err(NetConfigError::query("hotspot", e.to_string())))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Stub {
        status: fn() -> Result<HotspotStatus>,
        fail_disable: bool,
        queries: AtomicUsize,
        toggles: Mutex<Vec<bool>>,
    }

    impl Stub {
        fn new(status: fn() -> Result<HotspotStatus>) -> Arc<Self> {
            Arc::new(Stub {
                status,
                fail_disable: false,
                queries: AtomicUsize::new(0),
                toggles: Mutex::new(Vec::new()),
            })
        }
    }

    impl HotspotControl for Stub {
        fn status(&self) -> Result<HotspotStatus> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            (self.status)()
        }

        fn set_enabled(&self, enabled: bool) -> Result<()> {
            self.toggles.lock().unwrap().push(enabled);
            if !enabled && self.fail_disable {
                return Err(NetConfigError::query("hotspot", "radio busy"));
            }
            Ok(())
        }
    }

    fn healthy() -> Result<HotspotStatus> {
        Ok(HotspotStatus {
            success: true,
            enabled: true,
            ..Default::default()
        })
    }

    fn down() -> Result<HotspotStatus> {
        Ok(HotspotStatus {
            success: true,
            enabled: false,
            ..Default::default()
        })
    }

    fn unreachable_status() -> Result<HotspotStatus> {
        Err(NetConfigError::query("hotspot status", "service not running"))
    }

    fn settings(interval_ms: u64, auto_recovery: bool) -> MonitorSettings {
        MonitorSettings {
            enabled: true,
            interval: Duration::from_millis(interval_ms),
            auto_recovery,
            settle_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn anomaly_triggers_one_off_on_cycle() {
        let stub = Stub::new(down);
        let monitor = HotspotMonitor::new(stub.clone(), settings(10, true));

        assert_eq!(monitor.check_once().await, TickOutcome::Recovered);
        assert_eq!(*stub.toggles.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn query_failure_does_not_recover() {
        let stub = Stub::new(unreachable_status);
        let monitor = HotspotMonitor::new(stub.clone(), settings(10, true));

        assert_eq!(monitor.check_once().await, TickOutcome::QueryFailed);
        assert!(stub.toggles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn healthy_and_ignored() {
        let monitor = HotspotMonitor::new(Stub::new(healthy), settings(10, true));
        assert_eq!(monitor.check_once().await, TickOutcome::Healthy);

        let stub = Stub::new(down);
        let monitor = HotspotMonitor::new(stub.clone(), settings(10, false));
        assert_eq!(monitor.check_once().await, TickOutcome::AnomalyIgnored);
        assert!(stub.toggles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_disable_aborts_recovery() {
        let stub = Arc::new(Stub {
            status: down,
            fail_disable: true,
            queries: AtomicUsize::new(0),
            toggles: Mutex::new(Vec::new()),
        });
        let monitor = HotspotMonitor::new(stub.clone(), settings(10, true));

        assert_eq!(monitor.check_once().await, TickOutcome::RecoveryFailed);
        assert_eq!(*stub.toggles.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn disabled_monitor_does_not_start() {
        let stub = Stub::new(healthy);
        let monitor = HotspotMonitor::new(
            stub.clone(),
            MonitorSettings {
                enabled: false,
                ..settings(10, true)
            },
        );
        assert!(!monitor.start());
        assert!(!monitor.is_running());
        monitor.stop().await;
        assert_eq!(stub.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_joins_the_loop() {
        let stub = Stub::new(healthy);
        let monitor = HotspotMonitor::new(stub.clone(), settings(10, true));

        assert!(monitor.start());
        assert!(!monitor.start());
        tokio::time::sleep(Duration::from_millis(35)).await;
        monitor.stop().await;
        assert!(!monitor.is_running());

        let seen = stub.queries.load(Ordering::SeqCst);
        assert!(seen >= 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(stub.queries.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn cancellation_during_settle_still_reenables() {
        let stub = Stub::new(down);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let control: Arc<dyn HotspotControl> = stub.clone();

        let outcome = recover(&control, Duration::from_secs(60), &cancel).await;
        assert_eq!(outcome, TickOutcome::Recovered);
        assert_eq!(*stub.toggles.lock().unwrap(), vec![false, true]);
    }
}
