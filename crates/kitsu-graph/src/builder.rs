//! Graph builder for materializing stored topology.
//!
//! The builder takes Node and Edge records and resolves the edge
//! endpoints into graph indexes.

use crate::error::AnalysisError;
use crate::graph::{Machine, ProcessGraph, ProcessStep};
use kitsu_core::{Edge, Node, Topology, TopologyProvider};
use tracing::{debug, warn};

/// Builds a ProcessGraph from topology records.
///
/// Two passes, like the records themselves:
/// 1. Add all machines
/// 2. Resolve process steps into arcs between them
pub struct GraphBuilder {
    graph: ProcessGraph,
    pending: Vec<Edge>,
}

impl GraphBuilder {
    /// Creates a builder for an empty graph.
    pub fn new(graph_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            graph: ProcessGraph::new(graph_id, name),
            pending: Vec::new(),
        }
    }

    /// Creates a builder pre-loaded with a whole topology.
    pub fn from_topology(topology: &Topology) -> Self {
        let mut builder = Self::new(topology.graph.id.clone(), topology.graph.name.clone());
        builder.add_nodes(&topology.nodes);
        builder.add_edges(&topology.edges);
        builder
    }

    pub fn add_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.graph.add_node(Machine::from(node));
        }
    }

    /// Queues edges; they are resolved in `build`.
    pub fn add_edges(&mut self, edges: &[Edge]) {
        self.pending.extend(edges.iter().cloned());
    }

    /// Resolves pending edges and returns the graph.
    ///
    /// An edge whose endpoints are not in the graph is skipped with a
    /// warning rather than failing the whole build.
    pub fn build(mut self) -> ProcessGraph {
        for edge in std::mem::take(&mut self.pending) {
            let endpoints = (
                self.graph.get_index(&edge.source_id),
                self.graph.get_index(&edge.target_id),
            );
            match endpoints {
                (Some(from), Some(to)) => {
                    self.graph.add_edge(from, to, ProcessStep::from(&edge));
                }
                _ => warn!(
                    "Skipping edge {}: endpoint {} -> {} not in graph {}",
                    edge.id,
                    edge.source_id,
                    edge.target_id,
                    self.graph.graph_id()
                ),
            }
        }

        debug!(
            "Materialized graph {} ({} nodes, {} edges)",
            self.graph.graph_id(),
            self.graph.node_count(),
            self.graph.edge_count()
        );

        self.graph
    }
}

/// Loads a graph's topology and materializes it.
///
/// Returns the raw topology too, since callers need the store's node
/// order and edge records alongside the graph.
pub fn materialize<P>(provider: &P, graph_id: &str) -> Result<(Topology, ProcessGraph), AnalysisError>
where
    P: TopologyProvider + ?Sized,
{
    let topology = provider.topology(graph_id)?;
    let graph = GraphBuilder::from_topology(&topology).build();
    Ok((topology, graph))
}
