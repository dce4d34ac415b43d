//! Persistent graph store backed by sled.
//!
//! Layout, one tree per concern:
//! - `graphs`: graph id → bincode [`Topology`]
//! - `edges`: edge id → owning graph id
//! - `incoming`: `graph \0 target \0 edge` → empty, for per-machine event lookups
//! - `events`: `edge \0 start_ms event_id` → bincode [`Event`]
//!
//! Event keys sort by start time within an edge.

use chrono::{DateTime, Utc};
use kitsu_core::{
    Dataset, EntityKind, Event, EventProvider, GraphCatalog, GraphRecord, ProviderError,
    Topology, TopologyProvider,
};
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid record: {0}")]
    Invalid(String),
}

impl StoreError {
    fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<StoreError> for ProviderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => ProviderError::NotFound { kind, id },
            StoreError::Invalid(msg) => ProviderError::Invalid(msg),
            other => ProviderError::Unavailable(other.to_string()),
        }
    }
}

/// Counts of what an import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub graphs: usize,
    pub nodes: usize,
    pub edges: usize,
    pub events: usize,
}

fn prefix(id: &str) -> Vec<u8> {
    let mut key = id.as_bytes().to_vec();
    key.push(0);
    key
}

fn node_prefix(graph_id: &str, node_id: &str) -> Vec<u8> {
    let mut key = prefix(graph_id);
    key.extend_from_slice(&prefix(node_id));
    key
}

fn incoming_key(graph_id: &str, target_id: &str, edge_id: &str) -> Vec<u8> {
    let mut key = node_prefix(graph_id, target_id);
    key.extend_from_slice(edge_id.as_bytes());
    key
}

fn event_key(event: &Event) -> Vec<u8> {
    // Flipping the sign bit makes big-endian bytes order like the i64.
    let millis = (event.start.timestamp_millis() as u64) ^ (1 << 63);
    let mut key = prefix(&event.edge_id);
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(event.id.as_bytes());
    key
}

fn invalid(err: ProviderError) -> StoreError {
    match err {
        ProviderError::Invalid(msg) => StoreError::Invalid(msg),
        other => StoreError::Invalid(other.to_string()),
    }
}

pub struct FlowStore {
    db: Db,
    graphs: Tree,
    edges: Tree,
    incoming: Tree,
    events: Tree,
}

impl FlowStore {
    /// Opens or creates a store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self {
            graphs: db.open_tree("graphs")?,
            edges: db.open_tree("edges")?,
            incoming: db.open_tree("incoming")?,
            events: db.open_tree("events")?,
            db,
        })
    }

    /// Inserts or replaces a topology.
    ///
    /// Edges missing from the replacement are deleted with their events.
    /// An edge id already owned by another graph is rejected.
    pub fn save_topology(&self, topology: &Topology) -> Result<(), StoreError> {
        topology.validate().map_err(invalid)?;
        let graph_id = &topology.graph.id;

        for edge in &topology.edges {
            if let Some(owner) = self.edge_owner(&edge.id)? {
                if &owner != graph_id {
                    return Err(StoreError::Invalid(format!(
                        "edge {} already belongs to graph {}",
                        edge.id, owner
                    )));
                }
            }
        }

        if let Some(previous) = self.load_topology(graph_id)? {
            for edge in &previous.edges {
                if topology.edge(&edge.id).is_some() {
                    self.incoming
                        .remove(incoming_key(graph_id, &edge.target_id, &edge.id))?;
                } else {
                    self.purge_edge(graph_id, &edge.id, &edge.target_id)?;
                }
            }
        }

        self.write_topology(topology)?;
        self.db.flush()?;
        debug!(
            "Saved graph {} ({} nodes, {} edges)",
            graph_id,
            topology.nodes.len(),
            topology.edges.len()
        );
        Ok(())
    }

    pub fn load_topology(&self, graph_id: &str) -> Result<Option<Topology>, StoreError> {
        match self.graphs.get(graph_id)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All stored graphs, ordered by id.
    pub fn list_graphs(&self) -> Result<Vec<GraphRecord>, StoreError> {
        let mut graphs = Vec::new();
        for entry in self.graphs.iter() {
            let (_, bytes) = entry?;
            let topology: Topology = bincode::deserialize(&bytes)?;
            graphs.push(topology.graph);
        }
        Ok(graphs)
    }

    /// Appends an event for an existing edge.
    ///
    /// Not flushed; call [`FlowStore::flush`] after a batch.
    pub fn append_event(&self, event: &Event) -> Result<(), StoreError> {
        if event.duration.is_some_and(|d| d < 0.0) {
            return Err(StoreError::Invalid(format!(
                "event {} has a negative duration",
                event.id
            )));
        }
        if !self.edges.contains_key(&event.edge_id)? {
            return Err(StoreError::not_found(EntityKind::Edge, &event.edge_id));
        }
        self.events.insert(event_key(event), bincode::serialize(event)?)?;
        Ok(())
    }

    /// Deletes a graph with all of its nodes, edges and events.
    pub fn delete_graph(&self, graph_id: &str) -> Result<(), StoreError> {
        let topology = self.require(graph_id)?;
        for edge in &topology.edges {
            self.purge_edge(graph_id, &edge.id, &edge.target_id)?;
        }
        self.graphs.remove(graph_id)?;
        self.db.flush()?;
        info!("Deleted graph {}", graph_id);
        Ok(())
    }

    /// Deletes a node together with its incident edges and their events.
    pub fn delete_node(&self, graph_id: &str, node_id: &str) -> Result<(), StoreError> {
        let mut topology = self.require(graph_id)?;
        if topology.node(node_id).is_none() {
            return Err(StoreError::not_found(EntityKind::Node, node_id));
        }

        let (incident, kept): (Vec<_>, Vec<_>) = topology
            .edges
            .into_iter()
            .partition(|e| e.source_id == node_id || e.target_id == node_id);
        topology.edges = kept;
        topology.nodes.retain(|n| n.id != node_id);

        for edge in incident {
            self.purge_edge(graph_id, &edge.id, &edge.target_id)?;
        }
        self.write_topology(&topology)?;
        self.db.flush()?;
        Ok(())
    }

    /// Deletes an edge and its events.
    pub fn delete_edge(&self, graph_id: &str, edge_id: &str) -> Result<(), StoreError> {
        let mut topology = self.require(graph_id)?;
        let edge = topology
            .edge(edge_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Edge, edge_id))?;

        topology.edges.retain(|e| e.id != edge_id);
        self.purge_edge(graph_id, &edge.id, &edge.target_id)?;
        self.write_topology(&topology)?;
        self.db.flush()?;
        Ok(())
    }

    /// Loads a dataset: topologies first, then events.
    pub fn import(&self, dataset: &Dataset) -> Result<ImportStats, StoreError> {
        let mut stats = ImportStats::default();
        for topology in &dataset.topologies {
            self.save_topology(topology)?;
            stats.graphs += 1;
            stats.nodes += topology.nodes.len();
            stats.edges += topology.edges.len();
        }
        for event in &dataset.events {
            self.append_event(event)?;
            stats.events += 1;
        }
        self.flush()?;
        info!(
            "Imported {} graphs and {} events",
            stats.graphs, stats.events
        );
        Ok(stats)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn require(&self, graph_id: &str) -> Result<Topology, StoreError> {
        self.load_topology(graph_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Graph, graph_id))
    }

    fn edge_owner(&self, edge_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .edges
            .get(edge_id)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Writes the graph record and indexes its edges.
    fn write_topology(&self, topology: &Topology) -> Result<(), StoreError> {
        for edge in &topology.edges {
            self.edges
                .insert(edge.id.as_str(), topology.graph.id.as_bytes())?;
            self.incoming
                .insert(
                    incoming_key(&topology.graph.id, &edge.target_id, &edge.id),
                    &[] as &[u8],
                )?;
        }
        self.graphs
            .insert(topology.graph.id.as_str(), bincode::serialize(topology)?)?;
        Ok(())
    }

    fn purge_edge(&self, graph_id: &str, edge_id: &str, target_id: &str) -> Result<(), StoreError> {
        self.edges.remove(edge_id)?;
        self.incoming.remove(incoming_key(graph_id, target_id, edge_id))?;
        for entry in self.events.scan_prefix(prefix(edge_id)) {
            let (key, _) = entry?;
            self.events.remove(key)?;
        }
        Ok(())
    }

    fn scan_events(&self, edge_id: &str, since: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        for entry in self.events.scan_prefix(prefix(edge_id)) {
            let (_, bytes) = entry?;
            let event: Event = bincode::deserialize(&bytes)?;
            if event.start >= since {
                events.push(event);
            }
        }
        Ok(events)
    }
}

impl GraphCatalog for FlowStore {
    fn list_graphs(&self) -> Result<Vec<GraphRecord>, ProviderError> {
        Ok(FlowStore::list_graphs(self)?)
    }
}

impl TopologyProvider for FlowStore {
    fn topology(&self, graph_id: &str) -> Result<Topology, ProviderError> {
        Ok(self.require(graph_id)?)
    }
}

impl EventProvider for FlowStore {
    fn events_for_edge(
        &self,
        edge_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProviderError> {
        Ok(self.scan_events(edge_id, since)?)
    }

    fn events_into_node(
        &self,
        graph_id: &str,
        node_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProviderError> {
        let scan = node_prefix(graph_id, node_id);
        let mut events = Vec::new();
        for entry in self.incoming.scan_prefix(&scan) {
            let (key, _) = entry.map_err(StoreError::from)?;
            let edge_id = String::from_utf8_lossy(&key[scan.len()..]).into_owned();
            events.extend(self.scan_events(&edge_id, since)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use kitsu_core::{Edge, Node};
    use tempfile::tempdir;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn topology() -> Topology {
        Topology::new(GraphRecord::new("g", "Line").with_description("Main line"))
            .with_node(Node::new("a", "g", "Saw").with_capacity(12.0))
            .with_node(Node::new("b", "g", "Drill"))
            .with_node(Node::new("c", "g", "Pack"))
            .with_edge(Edge::new("ab", "g", "a", "b", "Cut").with_expected_duration(30.0))
            .with_edge(Edge::new("bc", "g", "b", "c", "Bore"))
            .with_edge(Edge::new("cb", "g", "c", "b", "Rework"))
    }

    fn seeded(path: &Path) -> FlowStore {
        let store = FlowStore::open(path).unwrap();
        store.save_topology(&topology()).unwrap();
        store
            .append_event(&Event::new("1", "ab", t(0)).with_duration(31.0))
            .unwrap();
        store
            .append_event(&Event::new("2", "ab", t(-60)).with_duration(29.0))
            .unwrap();
        store.append_event(&Event::new("3", "cb", t(30))).unwrap();
        store.append_event(&Event::new("4", "bc", t(40))).unwrap();
        store
    }

    #[test]
    fn test_save_load_topology() {
        let dir = tempdir().unwrap();
        let store = FlowStore::open(dir.path()).unwrap();
        store.save_topology(&topology()).unwrap();

        assert_eq!(store.topology("g").unwrap(), topology());
        assert_eq!(store.list_graphs().unwrap()[0].description.as_deref(), Some("Main line"));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        {
            seeded(dir.path()).flush().unwrap();
        }
        let store = FlowStore::open(dir.path()).unwrap();
        assert_eq!(store.event_count(), 4);
        assert_eq!(store.topology("g").unwrap().nodes.len(), 3);
    }

    #[test]
    fn test_events_sorted_and_filtered_by_start() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());

        let all = store.events_for_edge("ab", t(-3600)).unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);

        assert_eq!(store.events_for_edge("ab", t(0)).unwrap().len(), 1);
        assert!(store.events_for_edge("zz", t(-3600)).unwrap().is_empty());
    }

    #[test]
    fn test_events_into_node_covers_every_incoming_edge() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());

        let mut ids: Vec<String> = store
            .events_into_node("g", "b", t(-3600))
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_events_into_node_stay_in_their_graph() {
        let dir = tempdir().unwrap();
        let store = FlowStore::open(dir.path()).unwrap();
        for (graph, edge) in [("line1", "cut1"), ("line2", "cut2")] {
            store
                .save_topology(
                    &Topology::new(GraphRecord::new(graph, graph))
                        .with_node(Node::new("saw", graph, "Saw"))
                        .with_node(Node::new("drill", graph, "Drill"))
                        .with_edge(Edge::new(edge, graph, "saw", "drill", "Cut")),
                )
                .unwrap();
        }
        for i in 0..4 {
            store
                .append_event(&Event::new(format!("ev{i}"), "cut2", t(i * 10)))
                .unwrap();
        }

        assert!(store.events_into_node("line1", "drill", t(0)).unwrap().is_empty());
        assert_eq!(store.events_into_node("line2", "drill", t(0)).unwrap().len(), 4);

        store.delete_graph("line2").unwrap();
        assert!(store.events_into_node("line2", "drill", t(0)).unwrap().is_empty());
    }

    #[test]
    fn test_append_validation() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());

        let err = store.append_event(&Event::new("x", "nope", t(0))).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Edge, .. }));

        let err = store
            .append_event(&Event::new("x", "ab", t(0)).with_duration(-5.0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn test_save_rejects_dangling_edge() {
        let dir = tempdir().unwrap();
        let store = FlowStore::open(dir.path()).unwrap();
        let broken = Topology::new(GraphRecord::new("g", "Line"))
            .with_node(Node::new("a", "g", "Saw"))
            .with_edge(Edge::new("e", "g", "a", "ghost", "Cut"));
        assert!(matches!(store.save_topology(&broken), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_edge_ids_are_unique_across_graphs() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        let other = Topology::new(GraphRecord::new("h", "Other"))
            .with_node(Node::new("x", "h", "X"))
            .with_node(Node::new("y", "h", "Y"))
            .with_edge(Edge::new("ab", "h", "x", "y", "Steal"));
        assert!(matches!(store.save_topology(&other), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_resave_drops_removed_edges() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());

        let mut trimmed = topology();
        trimmed.edges.retain(|e| e.id != "cb");
        store.save_topology(&trimmed).unwrap();

        assert_eq!(store.event_count(), 3);
        assert_eq!(store.events_into_node("g", "b", t(-3600)).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_node_cascades() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        store.delete_node("g", "c").unwrap();

        let topology = store.topology("g").unwrap();
        assert_eq!(topology.nodes.len(), 2);
        assert_eq!(topology.edges.len(), 1);
        assert_eq!(store.event_count(), 2);
        assert!(store.events_into_node("g", "b", t(-3600)).unwrap().iter().all(|e| e.edge_id == "ab"));
    }

    #[test]
    fn test_delete_edge_cascades() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        store.delete_edge("g", "ab").unwrap();

        assert!(store.events_for_edge("ab", t(-3600)).unwrap().is_empty());
        assert_eq!(store.event_count(), 2);
        assert!(matches!(
            store.delete_edge("g", "ab"),
            Err(StoreError::NotFound { kind: EntityKind::Edge, .. })
        ));
    }

    #[test]
    fn test_delete_graph_cascades() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        store.delete_graph("g").unwrap();

        assert!(store.list_graphs().unwrap().is_empty());
        assert_eq!(store.event_count(), 0);
        assert_eq!(
            store.topology("g").unwrap_err(),
            ProviderError::not_found(EntityKind::Graph, "g")
        );
    }

    #[test]
    fn test_import_dataset() {
        let dir = tempdir().unwrap();
        let store = FlowStore::open(dir.path()).unwrap();
        let dataset = Dataset {
            topologies: vec![topology()],
            events: vec![
                Event::new("1", "ab", t(0)).with_duration(30.0),
                Event::new("2", "bc", t(5)).with_end(t(50)),
            ],
        };

        let stats = store.import(&dataset).unwrap();
        assert_eq!(
            stats,
            ImportStats {
                graphs: 1,
                nodes: 3,
                edges: 3,
                events: 2
            }
        );
        assert_eq!(store.event_count(), 2);
    }
}
