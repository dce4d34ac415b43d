//! Bottleneck sub-score calculators.
//!
//! Each calculator is a pure function over an event sample and returns
//! a ratio in `[0, 1]`, which the score functions scale by the factor's
//! weight. The five weights sum to 100:
//!
//! | Factor            | Weight | Saturates at                |
//! |-------------------|--------|-----------------------------|
//! | Utilization       | 30     | 95% of theoretical capacity |
//! | Queue time        | 25     | avg wait == avg duration    |
//! | Variance          | 20     | cv of 0.5                   |
//! | Centrality        | 15     | betweenness of 1            |
//! | Downstream impact | 10     | 100% average delay          |
//!
//! Samples that are too small for a factor score 0 for that factor.

use crate::stats::{mean, positive_durations, round_to, DurationStats};
use chrono::{DateTime, TimeDelta, Utc};
use kitsu_core::Event;
use serde::{Deserialize, Serialize};

pub const UTILIZATION_WEIGHT: f64 = 30.0;
pub const QUEUE_WEIGHT: f64 = 25.0;
pub const VARIANCE_WEIGHT: f64 = 20.0;
pub const CENTRALITY_WEIGHT: f64 = 15.0;
pub const DOWNSTREAM_WEIGHT: f64 = 10.0;

/// Utilization treated as practically full.
pub const FULL_UTILIZATION: f64 = 0.95;

/// Coefficient of variation treated as maximally unstable.
pub const UNSTABLE_CV: f64 = 0.5;

// ─────────────────────────────────────────────────────────────────────────────
// Sample window
// ─────────────────────────────────────────────────────────────────────────────

/// The trailing horizon `[now - hours, now]` events are sampled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow {
    now: DateTime<Utc>,
    hours: f64,
}

impl SampleWindow {
    /// Negative or non-finite hours collapse to an empty window.
    pub fn new(now: DateTime<Utc>, hours: f64) -> Self {
        let hours = if hours.is_finite() && hours > 0.0 {
            hours
        } else {
            0.0
        };
        Self { now, hours }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn hours(&self) -> f64 {
        self.hours
    }

    /// Start of the window. Spans reaching past the representable range
    /// start at the earliest instant chrono can hold.
    pub fn since(&self) -> DateTime<Utc> {
        TimeDelta::try_milliseconds((self.hours * 3_600_000.0) as i64)
            .and_then(|span| self.now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.since() && instant <= self.now
    }

    /// Events per hour for a count observed over this window.
    pub fn rate(&self, count: usize) -> f64 {
        if self.hours > 0.0 {
            count as f64 / self.hours
        } else {
            0.0
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calculators
// ─────────────────────────────────────────────────────────────────────────────

/// Throughput divided by capacity; 0 when capacity is unknown.
pub fn utilization(throughput: f64, capacity: Option<f64>) -> f64 {
    match capacity {
        Some(c) if c.is_finite() && c > 0.0 => throughput / c,
        _ => 0.0,
    }
}

pub fn utilization_score(utilization: f64) -> f64 {
    (utilization / FULL_UTILIZATION).clamp(0.0, 1.0) * UTILIZATION_WEIGHT
}

/// Average idle gap between consecutive events relative to the average
/// event duration, capped at 1.
///
/// Only positive gaps count; overlapping events and events without an
/// end timestamp contribute no gap.
pub fn queue_ratio(events: &[Event]) -> f64 {
    if events.len() < 2 {
        return 0.0;
    }

    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|e| e.start);

    let gaps: Vec<f64> = ordered
        .windows(2)
        .filter_map(|pair| {
            let previous_end = pair[0].end?;
            let gap = (pair[1].start - previous_end).num_milliseconds() as f64 / 1000.0;
            (gap > 0.0).then_some(gap)
        })
        .collect();

    let (Some(avg_gap), Some(avg_duration)) = (mean(&gaps), mean(&positive_durations(events)))
    else {
        return 0.0;
    };

    if avg_duration > 0.0 {
        (avg_gap / avg_duration).min(1.0)
    } else {
        0.0
    }
}

pub fn queue_score(events: &[Event]) -> f64 {
    queue_ratio(events) * QUEUE_WEIGHT
}

/// Coefficient of variation; needs at least two durations.
pub fn coefficient_of_variation(durations: &[f64]) -> Option<f64> {
    if durations.len() < 2 {
        return None;
    }
    let stats = DurationStats::from_samples(durations)?;
    (stats.mean > 0.0).then(|| stats.cv())
}

pub fn variance_score(durations: &[f64]) -> f64 {
    coefficient_of_variation(durations)
        .map(|cv| (cv / UNSTABLE_CV).min(1.0) * VARIANCE_WEIGHT)
        .unwrap_or(0.0)
}

pub fn centrality_score(betweenness: f64) -> f64 {
    if betweenness.is_finite() {
        betweenness.clamp(0.0, 1.0) * CENTRALITY_WEIGHT
    } else {
        0.0
    }
}

/// Events observed on one outgoing step together with its baseline.
#[derive(Debug, Clone, Copy)]
pub struct StepSample<'a> {
    pub expected_duration: Option<f64>,
    pub events: &'a [Event],
}

/// Relative delay of a step, only when it actually runs late.
///
/// Steps without a positive baseline or without durations give `None`.
pub fn delay_ratio(sample: &StepSample<'_>) -> Option<f64> {
    let expected = sample.expected_duration.filter(|e| *e > 0.0)?;
    let actual = mean(&positive_durations(sample.events))?;
    let ratio = (actual - expected) / expected;
    (ratio > 0.0).then_some(ratio)
}

/// Average delay over the late steps only, capped at 1.
pub fn downstream_ratio(samples: &[StepSample<'_>]) -> f64 {
    let delays: Vec<f64> = samples.iter().filter_map(delay_ratio).collect();
    mean(&delays).map(|d| d.min(1.0)).unwrap_or(0.0)
}

pub fn downstream_score(samples: &[StepSample<'_>]) -> f64 {
    downstream_ratio(samples) * DOWNSTREAM_WEIGHT
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite score
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to score one machine.
#[derive(Debug, Clone)]
pub struct NodeSample<'a> {
    pub capacity: Option<f64>,
    /// Events of steps that end at the machine.
    pub events: &'a [Event],
    /// Outgoing steps with their own samples.
    pub outgoing: Vec<StepSample<'a>>,
    pub betweenness: f64,
    pub window: SampleWindow,
}

/// Composite bottleneck score with its five parts.
///
/// Scores are rounded to 2 decimals, utilization percent to 1 and cv to 3.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BottleneckScore {
    pub total_score: f64,
    pub utilization_score: f64,
    pub queue_score: f64,
    pub variance_score: f64,
    pub centrality_score: f64,
    pub downstream_score: f64,
    pub event_count: usize,
    pub actual_throughput: f64,
    pub utilization_percent: f64,
    pub cv: f64,
}

impl BottleneckScore {
    /// Scores a machine. A machine with no sampled events scores 0 on
    /// every factor, centrality included.
    pub fn compute(sample: &NodeSample<'_>) -> Self {
        if sample.events.is_empty() {
            return Self::default();
        }

        let durations = positive_durations(sample.events);
        let throughput = sample.window.rate(sample.events.len());
        let utilization = utilization(throughput, sample.capacity);

        let utilization_score = utilization_score(utilization);
        let queue_score = queue_score(sample.events);
        let variance_score = variance_score(&durations);
        let centrality_score = centrality_score(sample.betweenness);
        let downstream_score = downstream_score(&sample.outgoing);

        let total = utilization_score + queue_score + variance_score + centrality_score + downstream_score;

        Self {
            total_score: round_to(total, 2),
            utilization_score: round_to(utilization_score, 2),
            queue_score: round_to(queue_score, 2),
            variance_score: round_to(variance_score, 2),
            centrality_score: round_to(centrality_score, 2),
            downstream_score: round_to(downstream_score, 2),
            event_count: sample.events.len(),
            actual_throughput: round_to(throughput, 2),
            utilization_percent: round_to(utilization * 100.0, 1),
            cv: round_to(coefficient_of_variation(&durations).unwrap_or(0.0), 3),
        }
    }
}
