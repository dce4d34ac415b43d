//! Kitsu Graph - Process flow analysis
//!
//! This crate turns stored process topology and the recorded event log
//! into answers: which machine is the bottleneck, what is the longest
//! chain of expected work, and what the flow looks like overall.
//!
//! # Architecture
//!
//! Every analysis is a pure read-and-compute pass:
//! - The topology is materialized into a petgraph [`ProcessGraph`]
//! - Events in the trailing window are sampled per machine and step
//! - Calculators in [`metrics`] turn samples into sub-scores
//! - The ranker, critical path finder and summary reporter build reports
//!
//! Nothing is cached between calls.
//!
//! # Example
//!
//! ```no_run
//! use kitsu_graph::{FlowStore, ProcessAnalyzer};
//!
//! let store = FlowStore::open(".kitsu/store").unwrap();
//! let analyzer = ProcessAnalyzer::new(&store);
//!
//! for record in analyzer.analyze_bottlenecks("line-1", 24.0, 5).unwrap() {
//!     println!("{} {:.2}", record.machine_name, record.score.total_score);
//! }
//! ```

mod analyzer;
mod builder;
mod centrality;
mod config;
mod critical_path;
mod error;
mod graph;
mod memory;
pub mod metrics;
mod ranking;
mod report;
pub mod stats;
mod store;
mod summary;

pub use analyzer::ProcessAnalyzer;
pub use builder::{materialize, GraphBuilder};
pub use centrality::{compute_betweenness, CentralityScores};
pub use config::AnalysisConfig;
pub use critical_path::{find_critical_path, CriticalPath};
pub use error::AnalysisError;
pub use graph::{Machine, NodeId, ProcessGraph, ProcessStep};
pub use memory::MemoryStore;
pub use metrics::{BottleneckScore, SampleWindow};
pub use ranking::{rank_bottlenecks, BottleneckRecord};
pub use report::{EdgeMetrics, NodeMetrics};
pub use stats::{DurationStats, Stability};
pub use store::{FlowStore, ImportStats, StoreError};
pub use summary::{summarize, GraphSummary};
