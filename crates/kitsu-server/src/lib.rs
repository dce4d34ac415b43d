//! Kitsu Server - WebSocket server for process analysis
//!
//! Exposes the analysis entry points as JSON-RPC 2.0 methods over a
//! WebSocket, so dashboards and line-side tools can query bottlenecks
//! and metrics without linking the engine.
//!
//! Methods:
//! - `graph.list`
//! - `graph.summary` `{ graph_id }`
//! - `critical_path` `{ graph_id }`
//! - `bottlenecks` `{ graph_id, window_hours?, top_n? }`
//! - `node.metrics` / `edge.metrics` `{ graph_id, id, window_hours? }`
//!
//! Unknown graphs, nodes and edges answer with code `-32001`; a store
//! that cannot be read answers with `-32002`.

mod handlers;
mod protocol;
mod server;

pub use handlers::{AppState, Backend, SharedStore};
pub use protocol::{BottleneckParams, EntityParams, GraphParams, Request, Response, RpcError};
pub use server::{process_message, KitsuServer, ServerConfig};
