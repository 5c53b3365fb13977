use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::{BackendKind, HotspotBackend};
use crate::error::{NetConfigError, Result};
use crate::models::{HotspotConfigRequest, HotspotStatus};
use crate::runner::{CommandRunner, ps_quote, run_powershell};

/// Loads the WinRT tethering types and binds `$manager` to the tethering
/// manager of the current internet connection profile.
const TETHERING_PRELUDE: &str = r#"
$ErrorActionPreference = 'Stop'
Add-Type -AssemblyName System.Runtime.WindowsRuntime
$asTaskGeneric = ([System.WindowsRuntimeSystemExtensions].GetMethods() | Where-Object {
    $_.Name -eq 'AsTask' -and $_.GetParameters().Count -eq 1 -and $_.GetParameters()[0].ParameterType.Name -eq 'IAsyncOperation`1'
})[0]
$asTaskAction = ([System.WindowsRuntimeSystemExtensions].GetMethods() | Where-Object {
    $_.Name -eq 'AsTask' -and $_.GetParameters().Count -eq 1 -and $_.GetParameters()[0].ParameterType.Name -eq 'IAsyncAction'
})[0]
function Await($op, [Type]$type) {
    $task = $asTaskGeneric.MakeGenericMethod($type).Invoke($null, @($op))
    $task.Wait(-1) | Out-Null
    $task.Result
}
function AwaitAction($op) {
    $task = $asTaskAction.Invoke($null, @($op))
    $task.Wait(-1) | Out-Null
}
$profile = [Windows.Networking.Connectivity.NetworkInformation, Windows.Networking.Connectivity, ContentType=WindowsRuntime]::GetInternetConnectionProfile()
$manager = [Windows.Networking.NetworkOperators.NetworkOperatorTetheringManager, Windows.Networking.NetworkOperators, ContentType=WindowsRuntime]::CreateFromConnectionProfile($profile)
"#;

const STATUS_BODY: &str = r#"
$ap = $manager.GetCurrentAccessPointConfiguration()
@{
    Enabled = [string]$manager.TetheringOperationalState -eq 'On'
    SSID = [string]$ap.Ssid
    MaxClients = [int]$manager.MaxClientCount
    Authentication = [string]$ap.Authentication
    Encryption = [string]$ap.Encryption
    ClientsCount = [int]$manager.ClientCount
} | ConvertTo-Json
"#;

/// Marker printed by mutating scripts once every step went through.
const DONE: &str = "Success";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TetheringState {
    enabled: bool,
    #[serde(rename = "SSID", default)]
    ssid: Option<String>,
    #[serde(default)]
    max_clients: u32,
    #[serde(default)]
    authentication: Option<String>,
    #[serde(default)]
    encryption: Option<String>,
    #[serde(default)]
    clients_count: u32,
}

impl From<TetheringState> for HotspotStatus {
    fn from(state: TetheringState) -> Self {
        HotspotStatus {
            success: true,
            error: String::new(),
            enabled: state.enabled,
            ssid: state.ssid.unwrap_or_default(),
            authentication: state.authentication.unwrap_or_default(),
            encryption: state.encryption.unwrap_or_default(),
            max_client_count: state.max_clients,
            clients_count: state.clients_count,
        }
    }
}

/// Mobile hotspot through the WinRT tethering manager.
pub struct ModernBackend {
    runner: Arc<dyn CommandRunner>,
}

impl ModernBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        ModernBackend { runner }
    }

    fn run(&self, body: &str) -> Result<String> {
        run_powershell(self.runner.as_ref(), &format!("{}{}", TETHERING_PRELUDE, body))
    }

    fn run_mutation(&self, body: &str) -> Result<()> {
        let output = self.run(&format!("{}\nWrite-Output '{}'", body, DONE))?;
        if output.contains(DONE) {
            Ok(())
        } else {
            Err(NetConfigError::CommandFailed {
                command: "tethering script".to_string(),
                detail: output.trim().to_string(),
            })
        }
    }
}

impl HotspotBackend for ModernBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Modern
    }

    fn status(&self) -> Result<HotspotStatus> {
        let output = self.run(STATUS_BODY)?;
        let state: TetheringState = serde_json::from_str(output.trim())
            .map_err(|e| NetConfigError::query("tethering state", e.to_string()))?;
        debug!("Tethering state: {:?}", state);
        Ok(state.into())
    }

    fn configure(&self, request: &HotspotConfigRequest) -> Result<()> {
        let body = format!(
            r#"
$config = $manager.GetCurrentAccessPointConfiguration()
$config.Ssid = {}
$config.Passphrase = {}
AwaitAction ($manager.ConfigureAccessPointAsync($config))"#,
            ps_quote(&request.ssid),
            ps_quote(&request.passphrase)
        );
        self.run_mutation(&body)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        let call = if enabled { "StartTetheringAsync" } else { "StopTetheringAsync" };
        let body = format!(
            r#"
$result = Await ($manager.{}()) ([Windows.Networking.NetworkOperators.NetworkOperatorTetheringOperationResult])
if ([string]$result.Status -ne 'Success') {{ throw $result.AdditionalErrorMessage }}"#,
            call
        );
        self.run_mutation(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use crate::runner::fake::ScriptedRunner;

    fn backend(runner: ScriptedRunner) -> (ModernBackend, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        (ModernBackend::new(runner.clone()), runner)
    }

    #[test]
    fn status_from_tethering_json() {
        let (backend, _) = backend(ScriptedRunner::new().on_script(
            "GetCurrentAccessPointConfiguration",
            CommandOutput::ok(
                r#"{
    "Enabled": true,
    "SSID": "DESKTOP-7Q 4821",
    "MaxClients": 8,
    "Authentication": "Wpa2",
    "Encryption": "Auto",
    "ClientsCount": 2
}"#,
            ),
        ));
        let status = backend.status().unwrap();
        assert!(status.success);
        assert!(status.enabled);
        assert_eq!(status.ssid, "DESKTOP-7Q 4821");
        assert_eq!(status.max_client_count, 8);
        assert_eq!(status.clients_count, 2);
    }

    #[test]
    fn unparseable_status_is_a_query_error() {
        let (backend, _) = backend(
            ScriptedRunner::new().on_script("TetheringOperationalState", CommandOutput::ok("not json")),
        );
        assert!(matches!(backend.status(), Err(NetConfigError::Query { .. })));
    }

    #[test]
    fn configure_quotes_credentials() {
        let (backend, runner) = backend(
            ScriptedRunner::new().on_script("ConfigureAccessPointAsync", CommandOutput::ok("Success\r\n")),
        );
        backend
            .configure(&HotspotConfigRequest::new("Bob's AP", "pass'word", false))
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("$config.Ssid = 'Bob''s AP'"));
        assert!(calls[0].contains("$config.Passphrase = 'pass''word'"));
    }

    #[test]
    fn mutation_without_marker_fails() {
        let (backend, _) = backend(ScriptedRunner::new().on_script("StopTetheringAsync", CommandOutput::ok("")));
        assert!(matches!(backend.set_enabled(false), Err(NetConfigError::CommandFailed { .. })));
    }

    #[test]
    fn script_failure_propagates() {
        let (backend, _) = backend(ScriptedRunner::new().on_script(
            "StartTetheringAsync",
            CommandOutput::failed("Exception calling \"Wait\": WiFi adapter not found"),
        ));
        let err = backend.set_enabled(true).unwrap_err();
        assert!(err.to_string().contains("WiFi adapter not found"));
    }
}
