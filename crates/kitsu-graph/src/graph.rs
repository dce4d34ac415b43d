//! In-memory process graph.
//!
//! The ProcessGraph wraps a petgraph multigraph and adds id indexes so
//! store identifiers can be mapped to graph indexes and back. It is
//! rebuilt for every analysis call.

use kitsu_core::{Edge, Node};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a machine inside the graph.
pub type NodeId = NodeIndex;

/// Vertex payload: a machine and its capacity planning figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub capacity: Option<f64>,
    pub cycle_time: Option<f64>,
}

impl From<&Node> for Machine {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            capacity: node.capacity,
            cycle_time: node.cycle_time,
        }
    }
}

/// Arc payload: one process step between two machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub edge_id: String,
    pub process_name: String,
    pub expected_duration: Option<f64>,
}

impl ProcessStep {
    /// Expected duration, 0 when unknown.
    pub fn expected_or_zero(&self) -> f64 {
        self.expected_duration.unwrap_or(0.0)
    }

    /// Weight used by the critical path; unknown durations count as 1.
    pub fn path_weight(&self) -> f64 {
        self.expected_duration.unwrap_or(1.0)
    }
}

impl From<&Edge> for ProcessStep {
    fn from(edge: &Edge) -> Self {
        Self {
            edge_id: edge.id.clone(),
            process_name: edge.process_name.clone(),
            expected_duration: edge.expected_duration,
        }
    }
}

/// The materialized process graph.
#[derive(Debug)]
pub struct ProcessGraph {
    /// The underlying petgraph graph. Parallel arcs are kept.
    pub(crate) graph: DiGraph<Machine, ProcessStep>,

    graph_id: String,
    name: String,

    /// Maps node ids to graph indexes.
    id_index: HashMap<String, NodeId>,

    /// Maps edge ids to arc indexes.
    edge_index: HashMap<String, EdgeIndex>,
}

impl ProcessGraph {
    /// Creates an empty graph.
    pub fn new(graph_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            graph: DiGraph::new(),
            graph_id: graph_id.into(),
            name: name.into(),
            id_index: HashMap::new(),
            edge_index: HashMap::new(),
        }
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a machine. Returns its index for adding arcs later.
    pub fn add_node(&mut self, machine: Machine) -> NodeId {
        let id = machine.id.clone();
        let index = self.graph.add_node(machine);
        self.id_index.insert(id, index);
        index
    }

    /// Adds a process step between two machines.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, step: ProcessStep) -> EdgeIndex {
        let id = step.edge_id.clone();
        let index = self.graph.add_edge(from, to, step);
        self.edge_index.insert(id, index);
        index
    }

    /// Gets a machine by its graph index.
    pub fn get(&self, index: NodeId) -> Option<&Machine> {
        self.graph.node_weight(index)
    }

    /// Gets the graph index for a store id.
    pub fn get_index(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    /// Looks up a process step with its endpoints.
    pub fn step(&self, edge_id: &str) -> Option<(&Machine, &Machine, &ProcessStep)> {
        let index = *self.edge_index.get(edge_id)?;
        let (from, to) = self.graph.edge_endpoints(index)?;
        Some((
            self.graph.node_weight(from)?,
            self.graph.node_weight(to)?,
            self.graph.edge_weight(index)?,
        ))
    }

    /// Number of incoming arcs, parallel arcs included.
    pub fn in_degree(&self, index: NodeId) -> usize {
        self.graph.edges_directed(index, Direction::Incoming).count()
    }

    /// Number of outgoing arcs, parallel arcs included.
    pub fn out_degree(&self, index: NodeId) -> usize {
        self.graph.edges_directed(index, Direction::Outgoing).count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the graph has no directed cycle (no rework loop).
    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.graph)
    }
}
