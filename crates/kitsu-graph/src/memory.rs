//! In-memory graph store.
//!
//! Holds topologies and the event log behind a lock. Used by tests,
//! the server's demo mode and anywhere a throwaway store is handy.

use chrono::{DateTime, Utc};
use kitsu_core::{
    EntityKind, Event, EventProvider, GraphCatalog, GraphRecord, ProviderError, Topology,
    TopologyProvider,
};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    /// Topologies in insertion order.
    graphs: Vec<Topology>,
    events: Vec<Event>,
}

impl Inner {
    fn graph_mut(&mut self, graph_id: &str) -> Result<&mut Topology, ProviderError> {
        self.graphs
            .iter_mut()
            .find(|t| t.graph.id == graph_id)
            .ok_or_else(|| ProviderError::not_found(EntityKind::Graph, graph_id))
    }

    fn has_edge(&self, edge_id: &str) -> bool {
        self.edge_owner(edge_id).is_some()
    }

    fn edge_owner(&self, edge_id: &str) -> Option<&str> {
        self.graphs
            .iter()
            .find(|t| t.edges.iter().any(|e| e.id == edge_id))
            .map(|t| t.graph.id.as_str())
    }

    /// Drops events whose edge no longer exists.
    fn prune_events(&mut self) {
        let live: HashSet<String> = self
            .graphs
            .iter()
            .flat_map(|t| t.edges.iter().map(|e| e.id.clone()))
            .collect();
        self.events.retain(|e| live.contains(&e.edge_id));
    }
}

/// A graph store living entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, ProviderError> {
        self.inner
            .read()
            .map_err(|_| ProviderError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, ProviderError> {
        self.inner
            .write()
            .map_err(|_| ProviderError::Unavailable("memory store lock poisoned".into()))
    }

    /// Inserts or replaces a topology. Events of edges that disappear
    /// in the replacement are deleted with them.
    ///
    /// An edge id already owned by another graph is rejected.
    pub fn save_topology(&self, topology: Topology) -> Result<(), ProviderError> {
        topology.validate()?;
        let mut inner = self.write()?;
        for edge in &topology.edges {
            if let Some(owner) = inner.edge_owner(&edge.id) {
                if owner != topology.graph.id {
                    return Err(ProviderError::Invalid(format!(
                        "edge {} already belongs to graph {}",
                        edge.id, owner
                    )));
                }
            }
        }
        match inner.graphs.iter_mut().find(|t| t.graph.id == topology.graph.id) {
            Some(existing) => *existing = topology,
            None => inner.graphs.push(topology),
        }
        inner.prune_events();
        Ok(())
    }

    /// Appends an event for an existing edge.
    pub fn append_event(&self, event: Event) -> Result<(), ProviderError> {
        if event.duration.is_some_and(|d| d < 0.0) {
            return Err(ProviderError::Invalid(format!(
                "event {} has a negative duration",
                event.id
            )));
        }
        let mut inner = self.write()?;
        if !inner.has_edge(&event.edge_id) {
            return Err(ProviderError::not_found(EntityKind::Edge, event.edge_id));
        }
        inner.events.push(event);
        Ok(())
    }

    /// Deletes a graph with all of its nodes, edges and events.
    pub fn delete_graph(&self, graph_id: &str) -> Result<(), ProviderError> {
        let mut inner = self.write()?;
        let before = inner.graphs.len();
        inner.graphs.retain(|t| t.graph.id != graph_id);
        if inner.graphs.len() == before {
            return Err(ProviderError::not_found(EntityKind::Graph, graph_id));
        }
        inner.prune_events();
        Ok(())
    }

    /// Deletes a node, its incident edges and their events.
    pub fn delete_node(&self, graph_id: &str, node_id: &str) -> Result<(), ProviderError> {
        let mut inner = self.write()?;
        let topology = inner.graph_mut(graph_id)?;
        if topology.node(node_id).is_none() {
            return Err(ProviderError::not_found(EntityKind::Node, node_id));
        }
        topology.nodes.retain(|n| n.id != node_id);
        topology
            .edges
            .retain(|e| e.source_id != node_id && e.target_id != node_id);
        inner.prune_events();
        Ok(())
    }

    /// Deletes an edge and its events.
    pub fn delete_edge(&self, graph_id: &str, edge_id: &str) -> Result<(), ProviderError> {
        let mut inner = self.write()?;
        let topology = inner.graph_mut(graph_id)?;
        if topology.edge(edge_id).is_none() {
            return Err(ProviderError::not_found(EntityKind::Edge, edge_id));
        }
        topology.edges.retain(|e| e.id != edge_id);
        inner.prune_events();
        Ok(())
    }

    pub fn event_count(&self) -> Result<usize, ProviderError> {
        Ok(self.read()?.events.len())
    }
}

impl GraphCatalog for MemoryStore {
    fn list_graphs(&self) -> Result<Vec<GraphRecord>, ProviderError> {
        Ok(self.read()?.graphs.iter().map(|t| t.graph.clone()).collect())
    }
}

impl TopologyProvider for MemoryStore {
    fn topology(&self, graph_id: &str) -> Result<Topology, ProviderError> {
        self.read()?
            .graphs
            .iter()
            .find(|t| t.graph.id == graph_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(EntityKind::Graph, graph_id))
    }
}

impl EventProvider for MemoryStore {
    fn events_for_edge(
        &self,
        edge_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProviderError> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| e.edge_id == edge_id && e.start >= since)
            .cloned()
            .collect())
    }

    fn events_into_node(
        &self,
        graph_id: &str,
        node_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProviderError> {
        let inner = self.read()?;
        let incoming: HashSet<&str> = inner
            .graphs
            .iter()
            .filter(|t| t.graph.id == graph_id)
            .flat_map(|t| t.edges.iter())
            .filter(|e| e.target_id == node_id)
            .map(|e| e.id.as_str())
            .collect();

        Ok(inner
            .events
            .iter()
            .filter(|e| incoming.contains(e.edge_id.as_str()) && e.start >= since)
            .cloned()
            .collect())
    }
}
