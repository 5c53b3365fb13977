use std::fmt;

use thiserror::Error;

use crate::models::InterfaceRecord;

pub type Result<T> = std::result::Result<T, NetConfigError>;

/// The write step that failed inside a configuration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    Ipv4,
    Ipv6,
    HotspotConfigure,
    HotspotEnable,
    HotspotState,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfigStep::Ipv4 => "IPv4 configuration",
            ConfigStep::Ipv6 => "IPv6 configuration",
            ConfigStep::HotspotConfigure => "hotspot configuration",
            ConfigStep::HotspotEnable => "enabling the hotspot after configuration",
            ConfigStep::HotspotState => "hotspot state change",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum NetConfigError {
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to query {what}: {detail}")]
    Query { what: String, detail: String },

    #[error("{step} failed: {source}")]
    Configuration {
        step: ConfigStep,
        #[source]
        source: Box<NetConfigError>,
    },

    #[error("Command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("Hardware details unavailable for '{name}': {detail}")]
    HardwareUnavailable {
        name: String,
        detail: String,
        partial: Box<InterfaceRecord>,
    },

    #[error("Failed to decode command output: {0}")]
    Decode(String),

    #[error("{0} is not supported on this platform")]
    UnsupportedPlatform(String),
}

impl NetConfigError {
    pub fn query(what: impl Into<String>, detail: impl Into<String>) -> Self {
        NetConfigError::Query {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn configuration(step: ConfigStep, source: NetConfigError) -> Self {
        NetConfigError::Configuration {
            step,
            source: Box::new(source),
        }
    }

    /// True when the named interface does not exist, including when the
    /// lookup failed inside a configuration step.
    pub fn is_not_found(&self) -> bool {
        match self {
            NetConfigError::InterfaceNotFound(_) => true,
            NetConfigError::Configuration { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
