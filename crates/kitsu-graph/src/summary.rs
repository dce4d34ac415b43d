//! Topology-level statistics.

use crate::graph::ProcessGraph;
use crate::stats::round_to;
use serde::{Deserialize, Serialize};

/// High-level shape of a process graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub graph_id: String,
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub is_acyclic: bool,
    pub has_cycles: bool,
    /// `|E| / (|V| * (|V| - 1))`, 3 decimals. Parallel steps all count.
    pub density: f64,
    pub scc_count: usize,
    /// `2 * |E| / |V|`, 2 decimals.
    pub avg_out_degree: f64,
}

/// Summarizes a materialized graph.
pub fn summarize(graph: &ProcessGraph) -> GraphSummary {
    let nodes = graph.node_count();
    let edges = graph.edge_count();
    let is_acyclic = graph.is_acyclic();

    let density = if nodes > 1 {
        edges as f64 / (nodes * (nodes - 1)) as f64
    } else {
        0.0
    };

    let avg_out_degree = if nodes > 0 {
        2.0 * edges as f64 / nodes as f64
    } else {
        0.0
    };

    GraphSummary {
        graph_id: graph.graph_id().to_string(),
        name: graph.name().to_string(),
        node_count: nodes,
        edge_count: edges,
        is_acyclic,
        has_cycles: !is_acyclic,
        density: round_to(density, 3),
        scc_count: petgraph::algo::tarjan_scc(&graph.graph).len(),
        avg_out_degree: round_to(avg_out_degree, 2),
    }
}
