//! Bottleneck ranking.

use crate::metrics::BottleneckScore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One machine's entry in a bottleneck report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckRecord {
    pub node_id: String,
    pub machine_name: String,
    #[serde(flatten)]
    pub score: BottleneckScore,
}

/// Orders records by descending composite score and keeps the first
/// `top_n`.
///
/// The sort is stable: machines with equal scores keep the order they
/// were given in, which is the store's node order.
pub fn rank_bottlenecks(mut records: Vec<BottleneckRecord>, top_n: usize) -> Vec<BottleneckRecord> {
    records.sort_by(|a, b| {
        b.score
            .total_score
            .partial_cmp(&a.score.total_score)
            .unwrap_or(Ordering::Equal)
    });
    records.truncate(top_n);
    records
}
