//! Read contracts between the analysis engine and a graph store.
//!
//! The engine never writes through these traits. Each call is an
//! independent read, so two analyses running side by side may see
//! slightly different event logs if events are being appended.

use crate::error::ProviderError;
use crate::model::{Event, GraphRecord, Topology};
use chrono::{DateTime, Utc};

/// Supplies graph topology.
pub trait TopologyProvider {
    /// Loads a graph with all of its nodes and edges.
    ///
    /// Fails with [`ProviderError::NotFound`] for an unknown graph id.
    fn topology(&self, graph_id: &str) -> Result<Topology, ProviderError>;
}

/// Supplies recorded events.
///
/// Results may come back in any order; an empty vector means no events
/// matched and is never an error.
pub trait EventProvider {
    /// Events recorded against one process step starting at or after `since`.
    fn events_for_edge(
        &self,
        edge_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProviderError>;

    /// Events of every process step of `graph_id` that ends at `node_id`,
    /// starting at or after `since`. Steps of other graphs never count,
    /// even when they target a node with the same id.
    fn events_into_node(
        &self,
        graph_id: &str,
        node_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProviderError>;
}

/// Enumerates the graphs a store holds.
pub trait GraphCatalog {
    fn list_graphs(&self) -> Result<Vec<GraphRecord>, ProviderError>;
}

/// A store that can feed a full analysis.
pub trait GraphSource: TopologyProvider + EventProvider + Send + Sync {}

impl<T> GraphSource for T where T: TopologyProvider + EventProvider + Send + Sync {}
