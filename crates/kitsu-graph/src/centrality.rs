//! Betweenness centrality.
//!
//! Brandes' algorithm over unweighted shortest paths, as implemented by
//! rustworkx-core. Parallel process steps between the same two machines
//! count as one adjacency, so a shortest path is a sequence of machines
//! rather than of arcs. Scores are normalized for directed graphs by
//! `1 / ((n-1)(n-2))`, which keeps every value in `[0, 1]`.

use crate::graph::{NodeId, ProcessGraph};
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::warn;

/// Below this many machines the computation stays on one thread.
const PARALLEL_THRESHOLD: usize = 200;

/// Betweenness score per machine.
#[derive(Debug, Clone, Default)]
pub struct CentralityScores {
    scores: HashMap<NodeId, f64>,
}

impl CentralityScores {
    /// Score for a machine; 0 when it was not computed.
    pub fn get(&self, index: NodeId) -> f64 {
        self.scores.get(&index).copied().unwrap_or(0.0)
    }
}

/// The machine graph with parallel arcs collapsed. Node indexes match
/// the process graph's.
fn simple_view(graph: &ProcessGraph) -> DiGraph<(), ()> {
    let g = &graph.graph;
    let mut simple = DiGraph::with_capacity(g.node_count(), g.edge_count());
    for _ in g.node_indices() {
        simple.add_node(());
    }
    for edge in g.edge_references() {
        simple.update_edge(edge.source(), edge.target(), ());
    }
    simple
}

/// Computes normalized betweenness for every machine.
///
/// Graphs with fewer than two machines yield no scores. A score that
/// comes out missing or non-finite is dropped, so lookups fall back to 0.
pub fn compute_betweenness(graph: &ProcessGraph) -> CentralityScores {
    let g = &graph.graph;
    if g.node_count() < 2 {
        return CentralityScores::default();
    }

    let simple = simple_view(graph);
    let raw = rustworkx_core::centrality::betweenness_centrality(
        &simple,
        false, // include_endpoints
        true,  // normalized
        PARALLEL_THRESHOLD,
    );

    let mut scores = HashMap::with_capacity(g.node_count());
    for idx in g.node_indices() {
        match raw.get(idx.index()).copied().flatten() {
            Some(value) if value.is_finite() => {
                scores.insert(idx, value);
            }
            _ => warn!(
                "Betweenness for node {:?} is not available, treating as 0",
                g.node_weight(idx).map(|m| m.id.as_str())
            ),
        }
    }

    CentralityScores { scores }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Machine, ProcessStep};

    fn make_graph(names: &[&str], arcs: &[(usize, usize)]) -> (ProcessGraph, Vec<NodeId>) {
        let mut graph = ProcessGraph::new("g", "test");
        let ids: Vec<NodeId> = names
            .iter()
            .map(|n| {
                graph.add_node(Machine {
                    id: n.to_string(),
                    name: n.to_string(),
                    capacity: None,
                    cycle_time: None,
                })
            })
            .collect();
        for (i, (from, to)) in arcs.iter().enumerate() {
            graph.add_edge(
                ids[*from],
                ids[*to],
                ProcessStep {
                    edge_id: format!("e{}", i),
                    process_name: "step".into(),
                    expected_duration: None,
                },
            );
        }
        (graph, ids)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_chain_middle_highest() {
        // a → b → c
        let (graph, ids) = make_graph(&["a", "b", "c"], &[(0, 1), (1, 2)]);
        let scores = compute_betweenness(&graph);

        // b sits on the single a→c path; 1 / ((3-1)(3-2)) = 0.5
        assert!(approx(scores.get(ids[1]), 0.5));
        assert!(approx(scores.get(ids[0]), 0.0));
        assert!(approx(scores.get(ids[2]), 0.0));
    }

    #[test]
    fn test_diamond_splits_paths() {
        //     a
        //    / \
        //   b   c
        //    \ /
        //     d
        let (graph, ids) = make_graph(&["a", "b", "c", "d"], &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let scores = compute_betweenness(&graph);

        // Each middle node carries half of the a→d paths: 0.5 / 6
        assert!(approx(scores.get(ids[1]), 0.5 / 6.0));
        assert!(approx(scores.get(ids[2]), 0.5 / 6.0));
        assert!(approx(scores.get(ids[0]), 0.0));
    }

    #[test]
    fn test_parallel_arcs_do_not_inflate() {
        let (single, ids) = make_graph(&["a", "b", "c"], &[(0, 1), (1, 2)]);
        let (parallel, pids) = make_graph(&["a", "b", "c"], &[(0, 1), (0, 1), (1, 2), (1, 2)]);

        assert!(approx(
            compute_betweenness(&single).get(ids[1]),
            compute_betweenness(&parallel).get(pids[1])
        ));
    }

    #[test]
    fn test_small_graphs_score_zero() {
        let (single, ids) = make_graph(&["a"], &[]);
        assert_eq!(compute_betweenness(&single).get(ids[0]), 0.0);

        let (pair, ids) = make_graph(&["a", "b"], &[(0, 1), (1, 0)]);
        let scores = compute_betweenness(&pair);
        assert_eq!(scores.get(ids[0]), 0.0);
        assert_eq!(scores.get(ids[1]), 0.0);
    }

    #[test]
    fn test_simple_view_collapses_parallel_arcs() {
        let (graph, _) = make_graph(&["a", "b", "c"], &[(0, 1), (0, 1), (1, 2), (2, 2)]);
        let simple = simple_view(&graph);
        assert_eq!(simple.node_count(), 3);
        assert_eq!(simple.edge_count(), 3);
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        // Star through a hub plus a cycle back.
        let (graph, ids) = make_graph(
            &["hub", "a", "b", "c", "d"],
            &[(1, 0), (2, 0), (0, 3), (0, 4), (4, 1)],
        );
        let scores = compute_betweenness(&graph);
        for id in ids {
            let s = scores.get(id);
            assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
        }
    }
}
