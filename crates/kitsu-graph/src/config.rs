//! Analysis defaults.

use serde::{Deserialize, Serialize};

/// Tunables for the analysis engine.
///
/// Every field has a default, so a partial JSON block is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trailing sample window in hours.
    pub window_hours: f64,

    /// How many bottleneck candidates to report.
    pub top_n: usize,

    /// Composite score above which the top machine is called out as
    /// the primary bottleneck.
    pub bottleneck_threshold: f64,

    /// Whether defect/rework events count toward the statistics.
    pub include_flagged_events: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_hours: 24.0,
            top_n: 5,
            bottleneck_threshold: 30.0,
            include_flagged_events: true,
        }
    }
}
