pub mod timing_statistics;
pub mod trial_measurement;

pub use timing_statistics::TimingStatistics;
pub use trial_measurement::{Operation, TrialMeasurement};
