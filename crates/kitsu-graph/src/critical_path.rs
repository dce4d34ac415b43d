//! Critical path through an acyclic process graph.
//!
//! The critical path is the chain of machines with the largest total
//! expected duration. Steps without an expected duration weigh 1.
//! Graphs with a rework loop have no critical path; the result says so
//! instead of returning a partial answer.

use crate::graph::{NodeId, ProcessGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const CYCLE_MESSAGE: &str = "Graph contains cycles (rework loops)";

/// Result of a critical path computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    /// Machine display names, in flow order.
    pub path: Vec<String>,
    /// Machine ids, in flow order.
    pub node_ids: Vec<String>,
    pub total_duration: f64,
    pub is_acyclic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CriticalPath {
    fn empty(is_acyclic: bool) -> Self {
        Self {
            path: Vec::new(),
            node_ids: Vec::new(),
            total_duration: 0.0,
            is_acyclic,
            message: None,
            error: None,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
enum PathError {
    #[error("{}", CYCLE_MESSAGE)]
    Cycle,

    #[error("node index {0} missing from graph")]
    MissingNode(usize),
}

/// Longest path by step weight, as graph indexes plus total weight.
///
/// For every machine in topological order the best incoming chain is
/// kept; the first machine with the overall best chain ends the path.
fn longest_path(graph: &ProcessGraph) -> Result<(Vec<NodeId>, f64), PathError> {
    let g = &graph.graph;
    let order = petgraph::algo::toposort(g, None).map_err(|_| PathError::Cycle)?;

    // best[v] = (length of best chain ending at v, predecessor on it)
    let mut best: Vec<(f64, NodeId)> = g.node_indices().map(|v| (0.0, v)).collect();

    for &v in &order {
        let mut chosen: Option<(f64, NodeId)> = None;
        for edge in g.edges_directed(v, Direction::Incoming) {
            let u = edge.source();
            let candidate = best[u.index()].0 + edge.weight().path_weight();
            if chosen.map_or(true, |(length, _)| candidate > length) {
                chosen = Some((candidate, u));
            }
        }
        best[v.index()] = chosen
            .filter(|(length, _)| *length >= 0.0)
            .unwrap_or((0.0, v));
    }

    let Some(mut end) = order.first().copied() else {
        return Ok((Vec::new(), 0.0));
    };
    for &v in &order {
        if best[v.index()].0 > best[end.index()].0 {
            end = v;
        }
    }

    let total = best[end.index()].0;
    let mut path = vec![end];
    let mut current = end;
    loop {
        let (_, previous) = *best
            .get(current.index())
            .ok_or(PathError::MissingNode(current.index()))?;
        if previous == current {
            break;
        }
        path.push(previous);
        current = previous;
    }
    path.reverse();

    Ok((path, total))
}

/// Computes the critical path, never failing.
///
/// Cycles yield `is_acyclic = false` with an explanatory message; any
/// other failure is reported in `error`.
pub fn find_critical_path(graph: &ProcessGraph) -> CriticalPath {
    match longest_path(graph) {
        Ok((indexes, total)) => {
            let mut result = CriticalPath::empty(true);
            for index in indexes {
                match graph.get(index) {
                    Some(machine) => {
                        result.path.push(machine.name.clone());
                        result.node_ids.push(machine.id.clone());
                    }
                    None => {
                        let mut failed = CriticalPath::empty(true);
                        failed.error = Some(PathError::MissingNode(index.index()).to_string());
                        return failed;
                    }
                }
            }
            result.total_duration = total;
            debug!(
                "Critical path for {}: {} machines, {}s",
                graph.graph_id(),
                result.path.len(),
                total
            );
            result
        }
        Err(PathError::Cycle) => {
            let mut result = CriticalPath::empty(false);
            result.message = Some(CYCLE_MESSAGE.to_string());
            result
        }
        Err(err) => {
            let mut result = CriticalPath::empty(true);
            result.error = Some(err.to_string());
            result
        }
    }
}
