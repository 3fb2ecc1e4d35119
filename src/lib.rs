//! Scilab Bridge Speed Check Library
//!
//! This library times command evaluation and array transfers through a
//! process-boundary bridge to a Scilab engine.

pub mod bridge;
pub mod core;
pub mod error;
pub mod logging;
pub mod report;
pub mod stats;
pub mod utils;

pub use crate::core::{run_speed_check, CheckOptions, SpeedProbe};
pub use error::{ProbeError, ProbeResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
