//! Kitsu Core - Process graph records and data contracts
//!
//! This crate holds the plain records the rest of Kitsu works with:
//! machines (nodes), timed process steps (edges) and the execution
//! events recorded against those steps. It also defines the two
//! provider contracts the analysis engine reads through, so that any
//! store (in-memory, sled, a remote database) can feed it.
//!
//! # Example
//!
//! ```
//! use kitsu_core::{Edge, GraphRecord, Node, Topology};
//!
//! let topology = Topology::new(GraphRecord::new("line-1", "Assembly line"))
//!     .with_node(Node::new("cnc", "line-1", "CNC").with_capacity(12.0))
//!     .with_node(Node::new("qa", "line-1", "Inspection"))
//!     .with_edge(Edge::new("e1", "line-1", "cnc", "qa", "Deburr").with_expected_duration(90.0));
//!
//! assert!(topology.validate().is_ok());
//! ```

mod error;
mod model;
mod provider;
mod session;

pub use error::{EntityKind, ProviderError, SessionError};
pub use model::{Dataset, Edge, Event, GraphRecord, Node, Topology};
pub use provider::{EventProvider, GraphCatalog, GraphSource, TopologyProvider};
pub use session::TimerSession;
