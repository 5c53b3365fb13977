/// Host tool family, resolved once at startup and injected wherever the
/// engine has to pick between Windows and Linux tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// netsh, ipconfig, route print and PowerShell.
    Windows,
    /// ip, nmcli, resolvectl, udevadm, iwlist.
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Other => std::env::consts::OS,
        }
    }
}
