//! Summary statistics over the per-call samples of one trial
//!
//! The console report only shows the average; the exports carry the rest.

use serde::Serialize;
use std::time::Duration;

/// Statistics of a set of timing samples, all in seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingStatistics {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub stdev: f64,            // population standard deviation
    pub p95: f64,              // 95th percentile
}

impl TimingStatistics {
    /// Compute statistics from per-call durations. Returns `None` for an empty trial.
    pub fn from_durations(samples: &[Duration]) -> Option<Self> {
        let seconds: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
        Self::from_seconds(&seconds)
    }

    /// Compute statistics from samples expressed in seconds.
    pub fn from_seconds(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / count;
        let variance = sorted.iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>() / count;

        Some(Self {
            mean,
            median: Self::median(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            stdev: variance.sqrt(),
            p95: Self::percentile(&sorted, 95.0),
        })
    }

    fn median(sorted: &[f64]) -> f64 {
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Nearest-rank percentile of sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_empty_samples() {
        assert!(TimingStatistics::from_seconds(&[]).is_none());
        assert!(TimingStatistics::from_durations(&[]).is_none());
    }

    #[test]
    fn test_known_samples() {
        let stats = TimingStatistics::from_seconds(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!(approx(stats.mean, 2.5));
        assert!(approx(stats.median, 2.5));
        assert!(approx(stats.min, 1.0));
        assert!(approx(stats.max, 4.0));
        assert!(approx(stats.stdev, 1.25f64.sqrt()));
        assert!(approx(stats.p95, 4.0));
    }

    #[test]
    fn test_single_sample() {
        let stats = TimingStatistics::from_durations(&[Duration::from_millis(5)]).unwrap();
        assert!(approx(stats.mean, 0.005));
        assert!(approx(stats.median, 0.005));
        assert!(approx(stats.stdev, 0.0));
        assert!(approx(stats.p95, 0.005));
    }

    #[test]
    fn test_p95_nearest_rank() {
        let samples: Vec<f64> = (1..=20).map(f64::from).collect();
        let stats = TimingStatistics::from_seconds(&samples).unwrap();
        assert!(approx(stats.p95, 19.0));
        assert!(approx(stats.median, 10.5));
    }
}
