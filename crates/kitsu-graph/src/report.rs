//! Single-entity detail views.

use crate::metrics::BottleneckScore;
use crate::stats::Stability;
use serde::{Deserialize, Serialize};

/// Detailed metrics for one machine over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_id: String,
    pub machine_name: String,
    pub window_hours: f64,
    pub event_count: usize,
    /// Events per hour.
    pub throughput: f64,
    pub theoretical_capacity: Option<f64>,
    /// Percent of theoretical capacity; absent when capacity is unknown.
    pub utilization: Option<f64>,
    pub mean_duration: f64,
    pub median_duration: f64,
    pub std_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub cv: f64,
    pub stability: Stability,
    pub in_degree: usize,
    pub out_degree: usize,
    pub betweenness: f64,
    pub score: BottleneckScore,
}

/// Detailed metrics for one process step over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetrics {
    pub edge_id: String,
    pub process_name: String,
    pub source: String,
    pub target: String,
    pub window_hours: f64,
    pub event_count: usize,
    /// Events per hour.
    pub flow_rate: f64,
    pub mean_duration: f64,
    pub median_duration: f64,
    pub std_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub expected_duration: Option<f64>,
    pub variance: f64,
    pub cv: f64,
    pub stability: Stability,
    /// Mean over expected duration; absent without a positive baseline.
    pub performance_ratio: Option<f64>,
}
