//! Process graph records.
//!
//! These mirror what the external management layer stores: a graph owns
//! machines and process steps, and the timing workflow appends events
//! against process steps. Records are plain data; the analysis engine
//! never mutates them.

use crate::error::ProviderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named container of machines and process steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl GraphRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A machine or workstation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub graph_id: String,

    /// Display name shown in reports.
    pub name: String,

    /// Free-form machine category ("CNC", "Assembly", ...).
    #[serde(default)]
    pub machine_type: Option<String>,

    /// Theoretical capacity in units per hour.
    #[serde(default)]
    pub capacity: Option<f64>,

    /// Theoretical cycle time in seconds per unit.
    #[serde(default)]
    pub cycle_time: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>, graph_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            graph_id: graph_id.into(),
            name: name.into(),
            machine_type: None,
            capacity: None,
            cycle_time: None,
        }
    }

    pub fn with_machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.machine_type = Some(machine_type.into());
        self
    }

    pub fn with_capacity(mut self, units_per_hour: f64) -> Self {
        self.capacity = Some(units_per_hour);
        self
    }

    pub fn with_cycle_time(mut self, seconds: f64) -> Self {
        self.cycle_time = Some(seconds);
        self
    }

    /// Capacity usable for utilization; zero or negative means unknown.
    pub fn known_capacity(&self) -> Option<f64> {
        self.capacity.filter(|c| c.is_finite() && *c > 0.0)
    }
}

/// A directed, named process step between two machines.
///
/// Several edges may connect the same pair of machines (parallel routes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub graph_id: String,
    pub source_id: String,
    pub target_id: String,
    pub process_name: String,

    /// Baseline duration in seconds.
    #[serde(default)]
    pub expected_duration: Option<f64>,

    #[serde(default)]
    pub sequence_order: Option<u32>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        graph_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        process_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            graph_id: graph_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            process_name: process_name.into(),
            expected_duration: None,
            sequence_order: None,
        }
    }

    pub fn with_expected_duration(mut self, seconds: f64) -> Self {
        self.expected_duration = Some(seconds);
        self
    }

    pub fn with_sequence_order(mut self, order: u32) -> Self {
        self.sequence_order = Some(order);
        self
    }
}

/// One observed traversal of a process step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub edge_id: String,

    #[serde(default)]
    pub operator: Option<String>,

    pub start: DateTime<Utc>,

    /// Absent while the step is still in progress.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Recorded duration in seconds. Trusted over the timestamps.
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub batch_id: Option<String>,

    /// `false` marks a defect or rework.
    #[serde(default = "default_quality_flag")]
    pub quality_flag: bool,

    /// Lap lengths in seconds, in the order they were marked.
    #[serde(default)]
    pub laps: Vec<f64>,
}

fn default_quality_flag() -> bool {
    true
}

impl Event {
    pub fn new(id: impl Into<String>, edge_id: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            edge_id: edge_id.into(),
            operator: None,
            start,
            end: None,
            duration: None,
            batch_id: None,
            quality_flag: true,
            laps: Vec::new(),
        }
    }

    /// Sets the end timestamp. The stored duration is left untouched.
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_laps(mut self, laps: Vec<f64>) -> Self {
        self.laps = laps;
        self
    }

    /// Marks the event as a defect/rework occurrence.
    pub fn flagged(mut self) -> Self {
        self.quality_flag = false;
        self
    }

    /// Duration in seconds: the stored value when present, otherwise
    /// derived from the timestamps once the event has ended.
    pub fn effective_duration(&self) -> Option<f64> {
        self.duration.or_else(|| {
            self.end
                .map(|end| (end - self.start).num_milliseconds() as f64 / 1000.0)
        })
    }

    pub fn is_flagged(&self) -> bool {
        !self.quality_flag
    }
}

/// A graph together with all of its machines and process steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub graph: GraphRecord,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Topology {
    pub fn new(graph: GraphRecord) -> Self {
        Self {
            graph,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Outgoing process steps of a machine, in storage order.
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &Edge> + '_ {
        let node_id = node_id.to_string();
        self.edges.iter().filter(move |e| e.source_id == node_id)
    }

    /// Checks the record invariants: unique ids, every edge connects
    /// nodes of this graph, and durations/capacities are sane.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let graph_id = &self.graph.id;
        let mut node_ids = HashSet::new();

        for node in &self.nodes {
            if &node.graph_id != graph_id {
                return Err(ProviderError::Invalid(format!(
                    "node {} belongs to graph {}, not {}",
                    node.id, node.graph_id, graph_id
                )));
            }
            if !node_ids.insert(node.id.as_str()) {
                return Err(ProviderError::Invalid(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if &edge.graph_id != graph_id {
                return Err(ProviderError::Invalid(format!(
                    "edge {} belongs to graph {}, not {}",
                    edge.id, edge.graph_id, graph_id
                )));
            }
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(ProviderError::Invalid(format!(
                    "duplicate edge id {}",
                    edge.id
                )));
            }
            for endpoint in [&edge.source_id, &edge.target_id] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(ProviderError::Invalid(format!(
                        "edge {} references unknown node {}",
                        edge.id, endpoint
                    )));
                }
            }
            if edge.expected_duration.is_some_and(|d| d < 0.0) {
                return Err(ProviderError::Invalid(format!(
                    "edge {} has a negative expected duration",
                    edge.id
                )));
            }
        }

        Ok(())
    }
}

/// Bulk import format: whole topologies plus their event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub topologies: Vec<Topology>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn line() -> Topology {
        Topology::new(GraphRecord::new("g", "Line"))
            .with_node(Node::new("a", "g", "Saw"))
            .with_node(Node::new("b", "g", "Drill"))
            .with_edge(Edge::new("e1", "g", "a", "b", "Cut"))
    }

    #[test]
    fn test_effective_duration_prefers_stored_value() {
        let event = Event::new("ev", "e1", at(0)).with_end(at(60)).with_duration(42.0);
        assert_eq!(event.effective_duration(), Some(42.0));
    }

    #[test]
    fn test_effective_duration_from_timestamps() {
        let event = Event::new("ev", "e1", at(0)).with_end(at(90));
        assert_eq!(event.effective_duration(), Some(90.0));

        let running = Event::new("ev", "e1", at(0));
        assert_eq!(running.effective_duration(), None);
    }

    #[test]
    fn test_known_capacity_ignores_non_positive() {
        assert_eq!(Node::new("a", "g", "A").with_capacity(0.0).known_capacity(), None);
        assert_eq!(Node::new("a", "g", "A").with_capacity(-3.0).known_capacity(), None);
        assert_eq!(Node::new("a", "g", "A").with_capacity(10.0).known_capacity(), Some(10.0));
    }

    #[test]
    fn test_validate_accepts_well_formed_topology() {
        assert!(line().validate().is_ok());
        assert!(Topology::new(GraphRecord::new("empty", "Empty")).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_edge() {
        let topology = line().with_edge(Edge::new("e2", "g", "b", "ghost", "Ship"));
        let err = topology.validate().unwrap_err();
        assert!(matches!(err, ProviderError::Invalid(msg) if msg.contains("ghost")));
    }

    #[test]
    fn test_validate_rejects_foreign_node() {
        let topology = line().with_node(Node::new("c", "other", "Paint"));
        assert!(topology.validate().is_err());
    }

    #[test]
    fn test_outgoing_keeps_parallel_routes() {
        let topology = line().with_edge(Edge::new("e2", "g", "a", "b", "Cut (backup)"));
        let ids: Vec<&str> = topology.outgoing("a").map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
        assert_eq!(topology.outgoing("b").count(), 0);
    }

    #[test]
    fn test_event_json_defaults() {
        let json = r#"{"id":"ev","edge_id":"e1","start":"2024-01-01T08:00:00Z"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.quality_flag);
        assert_eq!(event.duration, None);
        assert_eq!(event.end, None);
        assert!(event.laps.is_empty());
    }
}
