//! Configuration for the speed check
//!
//! Settings come from an optional `appsettings.json`; a missing file means
//! defaults, a malformed one is an error. Command-line flags override the
//! engine choice afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::ScilabOptions;
use crate::error::{ProbeError, ProbeResult};
use crate::utils::helpers::is_valid_identifier;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Which session implementation the probe drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
pub enum BridgeEngine {
    Scilab,
    Mock,
}

/// What happens to the session when a trial fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TeardownPolicy {
    /// Close the session on every exit path.
    Always,
    /// Close only after the whole schedule succeeded; a failing run leaves
    /// the session open.
    SuccessOnly,
}

/// One step of the transfer schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleEntry {
    /// Side length of the square payload; `side * side` elements are moved
    #[serde(deserialize_with = "validate_positive_usize")]
    pub side: usize,
    #[serde(deserialize_with = "validate_positive_usize")]
    pub repeats: usize,
}

impl ScheduleEntry {
    pub const fn new(side: usize, repeats: usize) -> Self {
        Self { side, repeats }
    }
}

/// Sides 1, 10, 100, 1000 with 10, 10, 10 and 5 repeats.
pub fn default_schedule() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry::new(1, 10),
        ScheduleEntry::new(10, 10),
        ScheduleEntry::new(100, 10),
        ScheduleEntry::new(1000, 5),
    ]
}

/// Contents of `appsettings.json`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppSettings {
    pub bridge_engine: BridgeEngine,
    pub executable: PathBuf,
    pub args: Vec<String>,
    #[serde(deserialize_with = "validate_positive_u64")]
    pub startup_timeout_secs: u64,
    #[serde(deserialize_with = "validate_positive_u64")]
    pub shutdown_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub raw_command: String,
    pub variable: String,
    #[serde(deserialize_with = "validate_positive_usize")]
    pub raw_call_repeats: usize,
    pub schedule: Vec<ScheduleEntry>,
    pub teardown: TeardownPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = ScilabOptions::default();
        Self {
            bridge_engine: BridgeEngine::Scilab,
            executable: engine.executable,
            args: engine.args,
            startup_timeout_secs: engine.startup_timeout.as_secs(),
            shutdown_timeout_secs: engine.shutdown_timeout.as_secs(),
            settle_delay_ms: 1000,
            raw_command: "x = 1".to_string(),
            variable: "x".to_string(),
            raw_call_repeats: 10,
            schedule: default_schedule(),
            teardown: TeardownPolicy::Always,
        }
    }
}

fn validate_positive_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = usize::deserialize(deserializer)?;
    if value > 0 {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("Value must be positive"))
    }
}

fn validate_positive_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    if value > 0 {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("Value must be positive"))
    }
}

impl AppSettings {
    /// Load settings from `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> ProbeResult<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content).map_err(|e| match e {
                ProbeError::Config(msg) => ProbeError::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json(content: &str) -> ProbeResult<Self> {
        let settings: Self = serde_json::from_str(content)
            .map_err(|e| ProbeError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that cannot be expressed per field.
    pub fn validate(&self) -> ProbeResult<()> {
        if self.schedule.is_empty() {
            return Err(ProbeError::Config("Schedule must not be empty".to_string()));
        }
        if !is_valid_identifier(&self.variable) {
            return Err(ProbeError::Config(format!(
                "Variable '{}' is not a valid identifier",
                self.variable
            )));
        }
        if self.raw_command.trim().is_empty() || self.raw_command.contains('\n') {
            return Err(ProbeError::Config(
                "RawCommand must be a single non-empty line".to_string(),
            ));
        }
        if self.schedule.iter().any(|entry| entry.side == 0 || entry.repeats == 0) {
            return Err(ProbeError::Config("Schedule sides and repeats must be positive".to_string()));
        }
        if self.raw_call_repeats == 0 {
            return Err(ProbeError::Config("RawCallRepeats must be positive".to_string()));
        }
        Ok(())
    }

    pub fn scilab_options(&self) -> ScilabOptions {
        ScilabOptions {
            executable: self.executable.clone(),
            args: self.args.clone(),
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            schedule: self.schedule.clone(),
            raw_call_repeats: self.raw_call_repeats,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            raw_command: self.raw_command.clone(),
            variable: self.variable.clone(),
            teardown: self.teardown,
        }
    }
}

/// Everything the probe needs once the session is open
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub schedule: Vec<ScheduleEntry>,
    pub raw_call_repeats: usize,
    /// Pause between the banner and the first measurement
    pub settle_delay: Duration,
    pub raw_command: String,
    pub variable: String,
    pub teardown: TeardownPolicy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        AppSettings::default().probe_settings()
    }
}
