//! Descriptive statistics over event durations.

use kitsu_core::Event;
use serde::{Deserialize, Serialize};

/// Summary of a duration sample, in seconds.
///
/// Standard deviation and variance are population statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl DurationStats {
    /// Returns `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let mean = mean(samples)?;
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        Some(Self {
            count,
            mean,
            median,
            std_dev: variance.sqrt(),
            variance,
            min: sorted[0],
            max: sorted[count - 1],
        })
    }

    /// Coefficient of variation; 0 when the mean is not positive.
    pub fn cv(&self) -> f64 {
        if self.mean > 0.0 {
            self.std_dev / self.mean
        } else {
            0.0
        }
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Effective durations of a sample, skipping absent and zero values.
pub fn positive_durations<'a, I>(events: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .filter_map(Event::effective_duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .collect()
}

/// Rounds to a fixed number of decimal places for reporting.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Process stability derived from the coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    /// cv below 0.25
    Stable,
    /// cv from 0.25 up to 0.50
    Moderate,
    /// cv of 0.50 or more
    Unstable,
}

impl Stability {
    pub fn from_cv(cv: f64) -> Self {
        if cv < 0.25 {
            Stability::Stable
        } else if cv < 0.50 {
            Stability::Moderate
        } else {
            Stability::Unstable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Stable => "stable",
            Stability::Moderate => "moderate",
            Stability::Unstable => "unstable",
        }
    }
}

impl std::fmt::Display for Stability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
