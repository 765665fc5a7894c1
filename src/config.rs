//! Run configuration for the sniffer pipeline
//!
//! Built once (by the CLI or a test) and handed to
//! [`Pipeline`](crate::pipeline::Pipeline) by value.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::support::SupportedSet;

/// Dump path variables, checked in order
pub const DUMP_FILE_ENV: [&str; 2] = ["IOCTL_DUMP_FILE", "GVISOR_IOCTL_DUMP_FILE"];
/// Enforce mode variables, checked in order
pub const ENFORCE_ENV: [&str; 2] = [
    "IOCTL_SNIFFER_ENFORCE_COMPATIBILITY",
    "GVISOR_IOCTL_SNIFFER_ENFORCE_COMPATIBILITY",
];

/// First non-empty value among `names`
fn first_set<F>(names: &[&str], lookup: F) -> Option<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        lookup(name)
            .filter(|value| !value.is_empty())
            .map(|value| (name.to_string(), value))
    })
}

/// Dump path from the command line, else from the environment
pub fn resolve_dump_path<F>(flag: Option<PathBuf>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    flag.or_else(|| first_set(&DUMP_FILE_ENV, lookup).map(|(_, value)| PathBuf::from(value)))
}

/// How strictly unsupported calls are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforceMode {
    /// Report unsupported calls, exit successfully
    #[default]
    Off,
    /// Report unsupported calls, exit non-zero if there were any
    Report,
    /// Stop at the first unsupported call
    Instant,
}

impl EnforceMode {
    pub fn aborts_immediately(&self) -> bool {
        matches!(self, EnforceMode::Instant)
    }

    /// Whether a finished run with unsupported calls should fail
    pub fn fails_on_unsupported(&self) -> bool {
        !matches!(self, EnforceMode::Off)
    }

    /// Mode from the command line, else from the environment, else `Off`.
    ///
    /// Environment values are case-insensitive; anything unrecognised
    /// (`1`, `true`, ...) is logged and treated as `Off`.
    pub fn resolve<F>(flag: Option<EnforceMode>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = flag {
            return mode;
        }
        let Some((name, value)) = first_set(&ENFORCE_ENV, lookup) else {
            return EnforceMode::Off;
        };
        match EnforceMode::from_str(value.trim(), true) {
            Ok(mode) => mode,
            Err(_) => {
                warn!("Ignoring {}={:?}; enforce mode stays off", name, value);
                EnforceMode::Off
            }
        }
    }
}

/// Everything the pipeline needs to know up front
#[derive(Debug, Clone, Default)]
pub struct SnifferConfig {
    /// Calls the compatibility layer accepts
    pub supported: SupportedSet,
    /// Append pre-call control/alloc payloads here when set
    pub dump_path: Option<PathBuf>,
    /// Stop processing at the first unsupported call
    pub abort_on_unsupported: bool,
}

impl SnifferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supported(mut self, supported: SupportedSet) -> Self {
        self.supported = supported;
        self
    }

    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    pub fn with_enforce_mode(mut self, mode: EnforceMode) -> Self {
        self.abort_on_unsupported = mode.aborts_immediately();
        self
    }
}
