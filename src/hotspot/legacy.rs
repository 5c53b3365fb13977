use std::sync::Arc;

use super::{BackendKind, HotspotBackend};
use crate::error::Result;
use crate::models::{HotspotConfigRequest, HotspotStatus};
use crate::parse;
use crate::runner::{CommandRunner, run_checked, run_text};

/// Hosted network driven through `netsh wlan`.
pub struct LegacyBackend {
    runner: Arc<dyn CommandRunner>,
}

impl LegacyBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        LegacyBackend { runner }
    }
}

impl HotspotBackend for LegacyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Legacy
    }

    fn status(&self) -> Result<HotspotStatus> {
        let output = run_text(self.runner.as_ref(), "netsh", &["wlan", "show", "hostednetwork"])?;
        Ok(parse::parse_hosted_network(&output))
    }

    fn configure(&self, request: &HotspotConfigRequest) -> Result<()> {
        run_checked(
            self.runner.as_ref(),
            "netsh",
            &[
                "wlan",
                "set",
                "hostednetwork",
                "mode=allow",
                &format!("ssid={}", request.ssid),
                &format!("key={}", request.passphrase),
            ],
        )
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        let verb = if enabled { "start" } else { "stop" };
        run_checked(self.runner.as_ref(), "netsh", &["wlan", verb, "hostednetwork"])
    }
}
