//! One timed trial: a batch of identical bridge calls
//!
//! This module keeps the raw per-call samples alongside their statistics.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::stats::timing_statistics::TimingStatistics;

/// Bridge operation timed by a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Raw,
    Put,
    Get,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Raw => "raw",
            Operation::Put => "put",
            Operation::Get => "get",
        };
        f.write_str(name)
    }
}

/// Trial measurement with all statistical data
#[derive(Debug, Clone, Serialize)]
pub struct TrialMeasurement {
    pub operation: Operation,
    /// Side length of the square payload; `None` for raw calls
    pub side: Option<usize>,
    /// Number of array elements moved per call
    pub elements: usize,
    pub repeats: usize,
    #[serde(rename = "samples_ms", serialize_with = "serialize_millis")]
    pub samples: Vec<Duration>,
    pub statistics: Option<TimingStatistics>,
}

impl TrialMeasurement {
    pub fn new(operation: Operation, side: Option<usize>, samples: Vec<Duration>) -> Self {
        let elements = side.map_or(0, |s| s * s);
        let statistics = TimingStatistics::from_durations(&samples);
        Self {
            operation,
            side,
            elements,
            repeats: samples.len(),
            samples,
            statistics,
        }
    }

    /// Total elapsed time divided by the number of calls.
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.total() / self.samples.len() as u32
    }

    pub fn total(&self) -> Duration {
        self.samples.iter().sum()
    }
}

fn serialize_millis<S>(samples: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(samples.iter().map(|d| d.as_nanos() as f64 / 1e6))
}
