//! Hotspot control.
//!
//! Two backends drive the host's access-point feature:
//!
//! - [`ModernBackend`]: the tethering API reached through PowerShell
//!   (Windows 11 and later)
//! - [`LegacyBackend`]: the `netsh wlan hostednetwork` commands
//!
//! [`HotspotController`] probes the host once, prefers one backend and, only
//! in diagnostics mode, collects environment diagnostics and retries a failed
//! operation on the other one. Nothing is retried otherwise; recovering a
//! hotspot that went down is the monitor's job.

mod legacy;
mod modern;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ConfigStep, NetConfigError, Result};
use crate::models::{HotspotConfigRequest, HotspotStatus};
use crate::platform::Platform;
use crate::runner::{CommandRunner, run_powershell};

pub use legacy::LegacyBackend;
pub use modern::ModernBackend;

/// First Windows build that ships the tethering API used by [`ModernBackend`].
const MODERN_MIN_BUILD: u32 = 22000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Modern,
    Legacy,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Modern => f.write_str("tethering"),
            BackendKind::Legacy => f.write_str("hosted network"),
        }
    }
}

/// One way of driving the host's access point.
pub trait HotspotBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn status(&self) -> Result<HotspotStatus>;

    /// Applies SSID and passphrase. Does not change the on/off state.
    fn configure(&self, request: &HotspotConfigRequest) -> Result<()>;

    fn set_enabled(&self, enabled: bool) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OsVersion {
    major: u32,
    #[serde(default)]
    build: u32,
}

/// Decides which backend the host should prefer.
///
/// Returns `None` where no backend exists. A failed probe on Windows falls
/// back to [`BackendKind::Legacy`].
pub fn probe_capability(runner: &dyn CommandRunner, platform: Platform) -> Option<BackendKind> {
    if platform != Platform::Windows {
        return None;
    }

    let version = run_powershell(runner, "[System.Environment]::OSVersion.Version | ConvertTo-Json")
        .ok()
        .and_then(|json| serde_json::from_str::<OsVersion>(json.trim()).ok());

    let kind = match version {
        Some(v) if v.major > 10 || (v.major == 10 && v.build >= MODERN_MIN_BUILD) => BackendKind::Modern,
        Some(_) => BackendKind::Legacy,
        None => {
            warn!("Could not determine the Windows version, using the hosted network backend");
            BackendKind::Legacy
        }
    };
    info!("Hotspot backend: {}", kind);
    Some(kind)
}

/// Environment facts that explain why a hotspot operation failed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HotspotDiagnostics {
    pub execution_policy: Option<String>,
    pub active_adapters: Option<String>,
    pub shared_access_service: Option<String>,
}

/// Collects and logs [`HotspotDiagnostics`]. Each probe is independent; a
/// failing one leaves its field empty.
pub fn collect_diagnostics(runner: &dyn CommandRunner) -> HotspotDiagnostics {
    let probe = |script: &str| {
        run_powershell(runner, script)
            .map(|out| out.trim().to_string())
            .map_err(|e| debug!("Diagnostic probe failed: {}", e))
            .ok()
    };

    let diagnostics = HotspotDiagnostics {
        execution_policy: probe("Get-ExecutionPolicy"),
        active_adapters: probe(
            "Get-NetAdapter | Where-Object { $_.Status -eq 'Up' } | Select-Object Name, InterfaceDescription | ConvertTo-Json",
        ),
        shared_access_service: probe("Get-Service -Name SharedAccess | Select-Object Name, Status | ConvertTo-Json"),
    };

    if let Some(ref policy) = diagnostics.execution_policy {
        info!("PowerShell execution policy: {}", policy);
        if policy.eq_ignore_ascii_case("Restricted") {
            warn!("Execution policy is Restricted, tethering scripts may be blocked");
        }
    }
    if let Some(ref adapters) = diagnostics.active_adapters {
        info!("Active network adapters: {}", adapters);
    }
    if let Some(ref service) = diagnostics.shared_access_service {
        info!("Internet Connection Sharing service: {}", service);
    }
    diagnostics
}

/// Hotspot operations over a preferred backend with an optional fallback.
pub struct HotspotController {
    runner: Arc<dyn CommandRunner>,
    preferred: Option<Arc<dyn HotspotBackend>>,
    fallback: Option<Arc<dyn HotspotBackend>>,
    diagnostics: bool,
}

impl HotspotController {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        preferred: Option<Arc<dyn HotspotBackend>>,
        fallback: Option<Arc<dyn HotspotBackend>>,
        diagnostics: bool,
    ) -> Self {
        HotspotController {
            runner,
            preferred,
            fallback,
            diagnostics,
        }
    }

    /// Probes the host once and wires the matching backends.
    pub fn for_platform(runner: Arc<dyn CommandRunner>, platform: Platform, diagnostics: bool) -> Self {
        let modern: Arc<dyn HotspotBackend> = Arc::new(ModernBackend::new(runner.clone()));
        let legacy: Arc<dyn HotspotBackend> = Arc::new(LegacyBackend::new(runner.clone()));

        let (preferred, fallback) = match probe_capability(runner.as_ref(), platform) {
            Some(BackendKind::Modern) => (Some(modern), Some(legacy)),
            Some(BackendKind::Legacy) => (Some(legacy), Some(modern)),
            None => (None, None),
        };
        HotspotController::new(runner, preferred, fallback, diagnostics)
    }

    pub fn preferred_kind(&self) -> Option<BackendKind> {
        self.preferred.as_ref().map(|b| b.kind())
    }

    pub fn status(&self) -> Result<HotspotStatus> {
        self.attempt("status query", |backend| backend.status())
            .map_err(|e| match e {
                NetConfigError::UnsupportedPlatform(_) => e,
                other => NetConfigError::query("hotspot status", other.to_string()),
            })
    }

    /// Validates, applies and optionally enables the hotspot configuration.
    ///
    /// A failed enable after a successful configuration is reported as
    /// [`ConfigStep::HotspotEnable`].
    pub fn configure(&self, request: &HotspotConfigRequest) -> Result<()> {
        request.validate()?;
        info!("Configuring hotspot '{}'", request.ssid);

        self.attempt("configuration", |backend| {
            backend
                .configure(request)
                .map_err(|e| NetConfigError::configuration(ConfigStep::HotspotConfigure, e))?;
            if request.enable {
                backend
                    .set_enabled(true)
                    .map_err(|e| NetConfigError::configuration(ConfigStep::HotspotEnable, e))?;
            }
            Ok(())
        })
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        info!("{} hotspot", if enabled { "Enabling" } else { "Disabling" });
        self.attempt("state change", |backend| {
            backend
                .set_enabled(enabled)
                .map_err(|e| NetConfigError::configuration(ConfigStep::HotspotState, e))
        })
    }

    fn attempt<T>(&self, action: &str, op: impl Fn(&dyn HotspotBackend) -> Result<T>) -> Result<T> {
        let preferred = self
            .preferred
            .as_deref()
            .ok_or_else(|| NetConfigError::UnsupportedPlatform("Hotspot control".to_string()))?;

        let primary_error = match op(preferred) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let fallback = match self.fallback.as_deref() {
            Some(fallback) if self.diagnostics => fallback,
            _ => return Err(primary_error),
        };

        warn!(
            "Hotspot {} via {} backend failed: {}",
            action,
            preferred.kind(),
            primary_error
        );
        collect_diagnostics(self.runner.as_ref());
        info!("Retrying hotspot {} via {} backend", action, fallback.kind());

        op(fallback).map_err(|e| {
            warn!("Hotspot {} via {} backend failed too: {}", action, fallback.kind(), e);
            // An enable failure after a successful configure outranks the fallback.
            if is_enable_failure(&primary_error) { primary_error } else { e }
        })
    }
}

fn is_enable_failure(err: &NetConfigError) -> bool {
    matches!(
        err,
        NetConfigError::Configuration {
            step: ConfigStep::HotspotEnable,
            ..
        }
    )
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::fake::CountingBackend;
    use super::*;
    use crate::runner::CommandOutput;
    use crate::runner::fake::ScriptedRunner;

    fn controller(
        preferred: &Arc<CountingBackend>,
        fallback: &Arc<CountingBackend>,
        diagnostics: bool,
    ) -> (HotspotController, Arc<ScriptedRunner>) {
        let runner = Arc::new(ScriptedRunner::new());
        let controller = HotspotController::new(
            runner.clone(),
            Some(preferred.clone() as Arc<dyn HotspotBackend>),
            Some(fallback.clone() as Arc<dyn HotspotBackend>),
            diagnostics,
        );
        (controller, runner)
    }

    #[test]
    fn invalid_requests_never_reach_a_backend() {
        let modern = Arc::new(CountingBackend::new(BackendKind::Modern));
        let legacy = Arc::new(CountingBackend::new(BackendKind::Legacy));
        let (controller, _) = controller(&modern, &legacy, true);

        let long_ssid = HotspotConfigRequest::new("a".repeat(33), "password1", true);
        let short_pass = HotspotConfigRequest::new("Hotspot", "1234567", true);
        assert!(matches!(controller.configure(&long_ssid), Err(NetConfigError::Validation(_))));
        assert!(matches!(controller.configure(&short_pass), Err(NetConfigError::Validation(_))));
        assert_eq!(modern.total_calls() + legacy.total_calls(), 0);
    }

    #[test]
    fn configure_then_enable() {
        let modern = Arc::new(CountingBackend::new(BackendKind::Modern));
        let legacy = Arc::new(CountingBackend::new(BackendKind::Legacy));
        let (controller, _) = controller(&modern, &legacy, false);

        controller
            .configure(&HotspotConfigRequest::new("Hotspot", "password1", true))
            .unwrap();
        assert_eq!(modern.configure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*modern.enable_calls.lock().unwrap(), vec![true]);

        controller
            .configure(&HotspotConfigRequest::new("Hotspot", "password1", false))
            .unwrap();
        assert_eq!(modern.enable_calls.lock().unwrap().len(), 1);
        assert_eq!(legacy.total_calls(), 0);
    }

    #[test]
    fn enable_failure_after_configure_is_distinct() {
        let modern = Arc::new(CountingBackend {
            fail_enable: true,
            ..CountingBackend::new(BackendKind::Modern)
        });
        let legacy = Arc::new(CountingBackend::new(BackendKind::Legacy));
        let (controller, _) = controller(&modern, &legacy, false);

        let err = controller
            .configure(&HotspotConfigRequest::new("Hotspot", "password1", true))
            .unwrap_err();
        assert!(matches!(
            err,
            NetConfigError::Configuration { step: ConfigStep::HotspotEnable, .. }
        ));
    }

    #[test]
    fn enable_failure_survives_a_failed_fallback() {
        let modern = Arc::new(CountingBackend {
            fail_enable: true,
            ..CountingBackend::new(BackendKind::Modern)
        });
        let legacy = Arc::new(CountingBackend {
            fail_configure: true,
            ..CountingBackend::new(BackendKind::Legacy)
        });
        let (controller, _) = controller(&modern, &legacy, true);

        let err = controller
            .configure(&HotspotConfigRequest::new("Hotspot", "password1", true))
            .unwrap_err();
        assert!(matches!(
            err,
            NetConfigError::Configuration { step: ConfigStep::HotspotEnable, .. }
        ));
        assert_eq!(modern.configure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(legacy.configure_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_fallback_outside_diagnostics_mode() {
        let modern = Arc::new(CountingBackend::failing(BackendKind::Modern));
        let legacy = Arc::new(CountingBackend::new(BackendKind::Legacy));
        let (controller, runner) = controller(&modern, &legacy, false);

        let err = controller.status().unwrap_err();
        assert!(matches!(err, NetConfigError::Query { .. }));
        assert_eq!(legacy.total_calls(), 0);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn diagnostics_mode_falls_back_after_collecting_diagnostics() {
        let modern = Arc::new(CountingBackend::failing(BackendKind::Modern));
        let legacy = Arc::new(CountingBackend::new(BackendKind::Legacy));
        let (controller, runner) = controller(&modern, &legacy, true);

        assert!(controller.status().unwrap().enabled);
        assert_eq!(legacy.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.calls_starting_with("powershell").len(), 3);

        controller.set_enabled(false).unwrap();
        assert_eq!(*legacy.enable_calls.lock().unwrap(), vec![false]);
    }

    #[test]
    fn fallback_is_symmetric() {
        let legacy = Arc::new(CountingBackend::failing(BackendKind::Legacy));
        let modern = Arc::new(CountingBackend::new(BackendKind::Modern));
        let (controller, _) = controller(&legacy, &modern, true);

        controller
            .configure(&HotspotConfigRequest::new("Hotspot", "password1", false))
            .unwrap();
        assert_eq!(modern.configure_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn both_backends_failing_is_a_query_error() {
        let modern = Arc::new(CountingBackend::failing(BackendKind::Modern));
        let legacy = Arc::new(CountingBackend::failing(BackendKind::Legacy));
        let (controller, _) = controller(&modern, &legacy, true);

        assert!(matches!(controller.status(), Err(NetConfigError::Query { .. })));
        assert!(matches!(
            controller.set_enabled(true),
            Err(NetConfigError::Configuration { step: ConfigStep::HotspotState, .. })
        ));
    }

    #[test]
    fn no_backend_is_unsupported() {
        let controller = HotspotController::new(Arc::new(ScriptedRunner::new()), None, None, true);
        assert!(matches!(controller.status(), Err(NetConfigError::UnsupportedPlatform(_))));
        assert!(matches!(
            controller.configure(&HotspotConfigRequest::new("Hotspot", "password1", false)),
            Err(NetConfigError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn capability_probe() {
        let win11 = ScriptedRunner::new().on_script(
            "OSVersion",
            CommandOutput::ok(r#"{"Major": 10, "Minor": 0, "Build": 22631, "Revision": 0}"#),
        );
        let win10 = ScriptedRunner::new().on_script(
            "OSVersion",
            CommandOutput::ok(r#"{"Major": 10, "Minor": 0, "Build": 19045, "Revision": 0}"#),
        );
        assert_eq!(probe_capability(&win11, Platform::Windows), Some(BackendKind::Modern));
        assert_eq!(probe_capability(&win10, Platform::Windows), Some(BackendKind::Legacy));
        let next_major = ScriptedRunner::new().on_script(
            "OSVersion",
            CommandOutput::ok(r#"{"Major": 11, "Minor": 0, "Build": 100, "Revision": 0}"#),
        );
        assert_eq!(probe_capability(&next_major, Platform::Windows), Some(BackendKind::Modern));
        assert_eq!(
            probe_capability(&ScriptedRunner::new(), Platform::Windows),
            Some(BackendKind::Legacy)
        );
        assert_eq!(probe_capability(&win11, Platform::Linux), None);
    }

    #[test]
    fn controller_for_linux_has_no_backend() {
        let runner = Arc::new(ScriptedRunner::new());
        let controller = HotspotController::for_platform(runner.clone(), Platform::Linux, false);
        assert_eq!(controller.preferred_kind(), None);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn diagnostics_tolerate_missing_probes() {
        let runner = ScriptedRunner::new().on_script("Get-ExecutionPolicy", CommandOutput::ok("Restricted\r\n"));
        let diagnostics = collect_diagnostics(&runner);
        assert_eq!(diagnostics.execution_policy.as_deref(), Some("Restricted"));
        assert_eq!(diagnostics.active_adapters, None);
        assert_eq!(diagnostics.shared_access_service, None);
    }
}
