//! Analysis entry points.
//!
//! [`ProcessAnalyzer`] ties the pieces together: it loads a topology,
//! materializes it, samples the event log over a trailing window and
//! runs the calculators, ranker, critical path finder and reporter.
//! Every call is an independent read against the source.

use crate::builder::materialize;
use crate::centrality::{compute_betweenness, CentralityScores};
use crate::config::AnalysisConfig;
use crate::critical_path::{find_critical_path, CriticalPath};
use crate::error::AnalysisError;
use crate::graph::ProcessGraph;
use crate::metrics::{BottleneckScore, NodeSample, SampleWindow, StepSample};
use crate::ranking::{rank_bottlenecks, BottleneckRecord};
use crate::report::{EdgeMetrics, NodeMetrics};
use crate::stats::{positive_durations, round_to, DurationStats, Stability};
use crate::summary::{summarize, GraphSummary};
use chrono::{DateTime, Utc};
use kitsu_core::{EntityKind, Event, EventProvider, Node, Topology, TopologyProvider};
use tracing::debug;

/// Runs analyses against a topology and event source.
pub struct ProcessAnalyzer<'a, S: ?Sized> {
    source: &'a S,
    config: AnalysisConfig,
    now: Option<DateTime<Utc>>,
}

impl<'a, S> ProcessAnalyzer<'a, S>
where
    S: TopologyProvider + EventProvider + ?Sized,
{
    pub fn new(source: &'a S) -> Self {
        Self::with_config(source, AnalysisConfig::default())
    }

    pub fn with_config(source: &'a S, config: AnalysisConfig) -> Self {
        Self {
            source,
            config,
            now: None,
        }
    }

    /// Pins the evaluation instant instead of reading the clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry points
    // ─────────────────────────────────────────────────────────────────────────

    /// Scores every machine of a graph and returns the `top_n` worst.
    ///
    /// Always yields `min(top_n, node_count)` records. Ties keep the
    /// store's node order.
    pub fn analyze_bottlenecks(
        &self,
        graph_id: &str,
        window_hours: f64,
        top_n: usize,
    ) -> Result<Vec<BottleneckRecord>, AnalysisError> {
        let (topology, graph) = materialize(self.source, graph_id)?;
        let window = self.window(window_hours);
        let centrality = compute_betweenness(&graph);

        let mut records = Vec::with_capacity(topology.nodes.len());
        for node in &topology.nodes {
            let events = self.node_events(graph_id, &node.id, window)?;
            let score = self.score_node(&topology, &graph, &centrality, node, &events, window)?;
            records.push(BottleneckRecord {
                node_id: node.id.clone(),
                machine_name: node.name.clone(),
                score,
            });
        }

        let ranked = rank_bottlenecks(records, top_n);
        debug!(
            "Ranked {} of {} machines in {} over {}h",
            ranked.len(),
            topology.nodes.len(),
            graph_id,
            window.hours()
        );
        Ok(ranked)
    }

    /// Display name of the top machine, if its score is above the
    /// configured threshold.
    pub fn primary_bottleneck(
        &self,
        graph_id: &str,
        window_hours: f64,
    ) -> Result<Option<String>, AnalysisError> {
        let threshold = self.config.bottleneck_threshold;
        Ok(self
            .analyze_bottlenecks(graph_id, window_hours, 1)?
            .into_iter()
            .next()
            .filter(|record| record.score.total_score > threshold)
            .map(|record| record.machine_name))
    }

    pub fn critical_path(&self, graph_id: &str) -> Result<CriticalPath, AnalysisError> {
        let (_, graph) = materialize(self.source, graph_id)?;
        Ok(find_critical_path(&graph))
    }

    pub fn graph_summary(&self, graph_id: &str) -> Result<GraphSummary, AnalysisError> {
        let (_, graph) = materialize(self.source, graph_id)?;
        Ok(summarize(&graph))
    }

    /// Detail view for one machine.
    pub fn node_metrics(
        &self,
        graph_id: &str,
        node_id: &str,
        window_hours: f64,
    ) -> Result<NodeMetrics, AnalysisError> {
        let (topology, graph) = materialize(self.source, graph_id)?;
        let node = topology
            .node(node_id)
            .ok_or_else(|| AnalysisError::not_found(EntityKind::Node, node_id))?;

        let window = self.window(window_hours);
        let centrality = compute_betweenness(&graph);
        let events = self.node_events(graph_id, node_id, window)?;
        let score = self.score_node(&topology, &graph, &centrality, node, &events, window)?;

        let stats = DurationStats::from_samples(&positive_durations(&events));
        let cv = stats.map(|s| s.cv()).unwrap_or(0.0);
        let throughput = window.rate(events.len());
        let capacity = node.known_capacity();
        let index = graph.get_index(node_id);

        Ok(NodeMetrics {
            node_id: node.id.clone(),
            machine_name: node.name.clone(),
            window_hours: window.hours(),
            event_count: events.len(),
            throughput: round_to(throughput, 2),
            theoretical_capacity: capacity,
            utilization: capacity.map(|c| round_to(throughput / c * 100.0, 1)),
            mean_duration: round_to(stats.map_or(0.0, |s| s.mean), 2),
            median_duration: round_to(stats.map_or(0.0, |s| s.median), 2),
            std_duration: round_to(stats.map_or(0.0, |s| s.std_dev), 2),
            min_duration: round_to(stats.map_or(0.0, |s| s.min), 2),
            max_duration: round_to(stats.map_or(0.0, |s| s.max), 2),
            cv: round_to(cv, 3),
            stability: Stability::from_cv(cv),
            in_degree: index.map_or(0, |i| graph.in_degree(i)),
            out_degree: index.map_or(0, |i| graph.out_degree(i)),
            betweenness: round_to(index.map_or(0.0, |i| centrality.get(i)), 3),
            score,
        })
    }

    /// Detail view for one process step.
    pub fn edge_metrics(
        &self,
        graph_id: &str,
        edge_id: &str,
        window_hours: f64,
    ) -> Result<EdgeMetrics, AnalysisError> {
        let (_, graph) = materialize(self.source, graph_id)?;
        let (source, target, step) = graph
            .step(edge_id)
            .ok_or_else(|| AnalysisError::not_found(EntityKind::Edge, edge_id))?;

        let window = self.window(window_hours);
        let events = self.edge_events(edge_id, window)?;
        let stats = DurationStats::from_samples(&positive_durations(&events));
        let cv = stats.map(|s| s.cv()).unwrap_or(0.0);

        let expected = step.expected_or_zero();
        let performance_ratio = match stats {
            Some(s) if expected > 0.0 => Some(round_to(s.mean / expected, 2)),
            _ => None,
        };

        Ok(EdgeMetrics {
            edge_id: step.edge_id.clone(),
            process_name: step.process_name.clone(),
            source: source.name.clone(),
            target: target.name.clone(),
            window_hours: window.hours(),
            event_count: events.len(),
            flow_rate: round_to(window.rate(events.len()), 2),
            mean_duration: round_to(stats.map_or(0.0, |s| s.mean), 2),
            median_duration: round_to(stats.map_or(0.0, |s| s.median), 2),
            std_duration: round_to(stats.map_or(0.0, |s| s.std_dev), 2),
            min_duration: round_to(stats.map_or(0.0, |s| s.min), 2),
            max_duration: round_to(stats.map_or(0.0, |s| s.max), 2),
            expected_duration: step.expected_duration,
            variance: round_to(stats.map_or(0.0, |s| s.variance), 2),
            cv: round_to(cv, 3),
            stability: Stability::from_cv(cv),
            performance_ratio,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sampling
    // ─────────────────────────────────────────────────────────────────────────

    fn window(&self, hours: f64) -> SampleWindow {
        SampleWindow::new(self.now.unwrap_or_else(Utc::now), hours)
    }

    /// Keeps events inside the window, dropping flagged ones if configured.
    fn sample(&self, mut events: Vec<Event>, window: SampleWindow) -> Vec<Event> {
        let include_flagged = self.config.include_flagged_events;
        events.retain(|e| window.contains(e.start) && (include_flagged || !e.is_flagged()));
        events
    }

    fn node_events(
        &self,
        graph_id: &str,
        node_id: &str,
        window: SampleWindow,
    ) -> Result<Vec<Event>, AnalysisError> {
        let events = self.source.events_into_node(graph_id, node_id, window.since())?;
        Ok(self.sample(events, window))
    }

    fn edge_events(&self, edge_id: &str, window: SampleWindow) -> Result<Vec<Event>, AnalysisError> {
        let events = self.source.events_for_edge(edge_id, window.since())?;
        Ok(self.sample(events, window))
    }

    fn score_node(
        &self,
        topology: &Topology,
        graph: &ProcessGraph,
        centrality: &CentralityScores,
        node: &Node,
        events: &[Event],
        window: SampleWindow,
    ) -> Result<BottleneckScore, AnalysisError> {
        // Downstream samples are only needed when the machine has work.
        let mut downstream = Vec::new();
        if !events.is_empty() {
            for edge in topology.outgoing(&node.id) {
                downstream.push((edge.expected_duration, self.edge_events(&edge.id, window)?));
            }
        }

        let sample = NodeSample {
            capacity: node.known_capacity(),
            events,
            outgoing: downstream
                .iter()
                .map(|(expected, events)| StepSample {
                    expected_duration: *expected,
                    events,
                })
                .collect(),
            betweenness: graph
                .get_index(&node.id)
                .map_or(0.0, |index| centrality.get(index)),
            window,
        };
        Ok(BottleneckScore::compute(&sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::{Duration, TimeZone};
    use kitsu_core::{Edge, GraphRecord, ProviderError};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn run(id: &str, edge: &str, start: i64, secs: i64) -> Event {
        Event::new(id, edge, t(start))
            .with_end(t(start + secs))
            .with_duration(secs as f64)
    }

    /// Saw -> Drill -> Pack, with Drill running at capacity.
    fn line() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .save_topology(
                Topology::new(GraphRecord::new("line", "Line 1"))
                    .with_node(Node::new("saw", "line", "Saw").with_capacity(10.0))
                    .with_node(Node::new("drill", "line", "Drill").with_capacity(4.0))
                    .with_node(Node::new("pack", "line", "Pack"))
                    .with_edge(Edge::new("e1", "line", "saw", "drill", "Cut").with_expected_duration(60.0))
                    .with_edge(Edge::new("e2", "line", "drill", "pack", "Bore").with_expected_duration(100.0)),
            )
            .unwrap();

        for (i, start) in [-3000, -2000, -1000, -500].into_iter().enumerate() {
            store.append_event(run(&format!("c{i}"), "e1", start, 60)).unwrap();
        }
        // Outside a one hour window.
        store.append_event(run("old", "e1", -7200, 60)).unwrap();
        store.append_event(run("b0", "e2", -600, 150)).unwrap();
        store
    }

    fn analyzer(store: &MemoryStore) -> ProcessAnalyzer<'_, MemoryStore> {
        ProcessAnalyzer::new(store).at(t(0))
    }

    #[test]
    fn test_ranks_saturated_machine_first() {
        let store = line();
        let ranked = analyzer(&store).analyze_bottlenecks("line", 1.0, 5).unwrap();

        let ids: Vec<&str> = ranked.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["drill", "saw", "pack"]);

        let drill = &ranked[0].score;
        assert_eq!(drill.event_count, 4);
        assert_eq!(drill.actual_throughput, 4.0);
        assert_eq!(drill.utilization_percent, 100.0);
        assert_eq!(drill.utilization_score, 30.0);
        assert_eq!(drill.queue_score, 25.0);
        assert_eq!(drill.variance_score, 0.0);
        assert_eq!(drill.centrality_score, 7.5);
        assert_eq!(drill.downstream_score, 5.0);
        assert_eq!(drill.total_score, 67.5);

        assert_eq!(ranked[1].score, BottleneckScore::default());
    }

    #[test]
    fn test_top_n_truncates() {
        let store = line();
        let analyzer = analyzer(&store);
        assert_eq!(analyzer.analyze_bottlenecks("line", 1.0, 1).unwrap().len(), 1);
        assert_eq!(analyzer.analyze_bottlenecks("line", 1.0, 50).unwrap().len(), 3);
        assert!(analyzer.analyze_bottlenecks("line", 1.0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_window_controls_sample() {
        let store = line();
        let analyzer = analyzer(&store);
        let narrow = analyzer.node_metrics("line", "drill", 1.0).unwrap();
        let wide = analyzer.node_metrics("line", "drill", 3.0).unwrap();
        assert_eq!(narrow.event_count, 4);
        assert_eq!(wide.event_count, 5);
    }

    #[test]
    fn test_events_after_now_are_ignored() {
        let store = line();
        store.append_event(run("future", "e1", 60, 60)).unwrap();
        let metrics = analyzer(&store).node_metrics("line", "drill", 1.0).unwrap();
        assert_eq!(metrics.event_count, 4);
    }

    #[test]
    fn test_flagged_events_can_be_excluded() {
        let store = line();
        store
            .append_event(run("defect", "e1", -100, 60).flagged())
            .unwrap();

        let included = analyzer(&store).node_metrics("line", "drill", 1.0).unwrap();
        assert_eq!(included.event_count, 5);

        let config = AnalysisConfig {
            include_flagged_events: false,
            ..AnalysisConfig::default()
        };
        let excluded = ProcessAnalyzer::with_config(&store, config)
            .at(t(0))
            .node_metrics("line", "drill", 1.0)
            .unwrap();
        assert_eq!(excluded.event_count, 4);
    }

    #[test]
    fn test_primary_bottleneck() {
        let store = line();
        let analyzer = analyzer(&store);
        assert_eq!(
            analyzer.primary_bottleneck("line", 1.0).unwrap().as_deref(),
            Some("Drill")
        );
        // Nothing recorded in the last few seconds.
        assert_eq!(analyzer.primary_bottleneck("line", 0.001).unwrap(), None);
    }

    #[test]
    fn test_node_metrics_details() {
        let store = line();
        let drill = analyzer(&store).node_metrics("line", "drill", 1.0).unwrap();

        assert_eq!(drill.machine_name, "Drill");
        assert_eq!(drill.throughput, 4.0);
        assert_eq!(drill.theoretical_capacity, Some(4.0));
        assert_eq!(drill.utilization, Some(100.0));
        assert_eq!(drill.mean_duration, 60.0);
        assert_eq!(drill.median_duration, 60.0);
        assert_eq!(drill.std_duration, 0.0);
        assert_eq!(drill.cv, 0.0);
        assert_eq!(drill.stability, Stability::Stable);
        assert_eq!(drill.in_degree, 1);
        assert_eq!(drill.out_degree, 1);
        assert_eq!(drill.betweenness, 0.5);
        assert_eq!(drill.score.total_score, 67.5);
    }

    #[test]
    fn test_node_metrics_without_capacity_or_events() {
        let store = line();
        let analyzer = analyzer(&store);

        let pack = analyzer.node_metrics("line", "pack", 1.0).unwrap();
        assert_eq!(pack.utilization, None);
        assert_eq!(pack.event_count, 1);

        let saw = analyzer.node_metrics("line", "saw", 1.0).unwrap();
        assert_eq!(saw.event_count, 0);
        assert_eq!(saw.utilization, Some(0.0));
        assert_eq!(saw.mean_duration, 0.0);
    }

    #[test]
    fn test_edge_metrics_details() {
        let store = line();
        let bore = analyzer(&store).edge_metrics("line", "e2", 1.0).unwrap();

        assert_eq!(bore.process_name, "Bore");
        assert_eq!(bore.source, "Drill");
        assert_eq!(bore.target, "Pack");
        assert_eq!(bore.event_count, 1);
        assert_eq!(bore.flow_rate, 1.0);
        assert_eq!(bore.mean_duration, 150.0);
        assert_eq!(bore.expected_duration, Some(100.0));
        assert_eq!(bore.performance_ratio, Some(1.5));
        assert_eq!(bore.variance, 0.0);
    }

    #[test]
    fn test_edge_metrics_without_events_has_no_ratio() {
        let store = line();
        let bore = analyzer(&store).edge_metrics("line", "e2", 0.01).unwrap();
        assert_eq!(bore.event_count, 0);
        assert_eq!(bore.performance_ratio, None);
    }

    #[test]
    fn test_edge_metrics_unknown_duration_has_no_ratio() {
        let store = MemoryStore::new();
        store
            .save_topology(
                Topology::new(GraphRecord::new("g", "Line"))
                    .with_node(Node::new("a", "g", "A"))
                    .with_node(Node::new("b", "g", "B"))
                    .with_edge(Edge::new("ab", "g", "a", "b", "Move")),
            )
            .unwrap();
        store.append_event(run("m0", "ab", -60, 30)).unwrap();

        let metrics = analyzer(&store).edge_metrics("g", "ab", 1.0).unwrap();
        assert_eq!(metrics.mean_duration, 30.0);
        assert_eq!(metrics.expected_duration, None);
        assert_eq!(metrics.performance_ratio, None);
    }

    #[test]
    fn test_machines_with_shared_ids_score_per_graph() {
        let store = line();
        store
            .save_topology(
                Topology::new(GraphRecord::new("line2", "Line 2"))
                    .with_node(Node::new("saw", "line2", "Saw").with_capacity(10.0))
                    .with_node(Node::new("drill", "line2", "Drill").with_capacity(4.0))
                    .with_edge(Edge::new("l2e1", "line2", "saw", "drill", "Cut")),
            )
            .unwrap();
        for i in 0..6 {
            store
                .append_event(run(&format!("l2c{i}"), "l2e1", -100 * (i + 1), 60))
                .unwrap();
        }

        let analyzer = analyzer(&store);
        let drill = analyzer.node_metrics("line", "drill", 1.0).unwrap();
        assert_eq!(drill.event_count, 4);
        assert_eq!(drill.score.total_score, 67.5);

        let other = analyzer.node_metrics("line2", "drill", 1.0).unwrap();
        assert_eq!(other.event_count, 6);

        store.delete_graph("line").unwrap();
        let ranked = analyzer.analyze_bottlenecks("line2", 1.0, 5).unwrap();
        assert_eq!(ranked[0].node_id, "drill");
        assert_eq!(ranked[0].score.event_count, 6);
    }

    #[test]
    fn test_idle_graph_is_not_scored_by_a_busy_twin() {
        let store = MemoryStore::new();
        for (graph, edge) in [("line1", "cut1"), ("line2", "cut2")] {
            store
                .save_topology(
                    Topology::new(GraphRecord::new(graph, graph))
                        .with_node(Node::new("saw", graph, "Saw"))
                        .with_node(Node::new("drill", graph, "Drill").with_capacity(4.0))
                        .with_edge(Edge::new(edge, graph, "saw", "drill", "Cut")),
                )
                .unwrap();
        }
        for i in 0..4 {
            store
                .append_event(run(&format!("ev{i}"), "cut2", -600 * (i + 1), 60))
                .unwrap();
        }

        let analyzer = analyzer(&store);
        let drill = analyzer.node_metrics("line1", "drill", 1.0).unwrap();
        assert_eq!(drill.event_count, 0);
        assert_eq!(drill.utilization, Some(0.0));

        for record in analyzer.analyze_bottlenecks("line1", 1.0, 5).unwrap() {
            assert_eq!(record.score, BottleneckScore::default());
        }
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let store = line();
        let analyzer = analyzer(&store);

        let ranked = analyzer.analyze_bottlenecks("line", 1e12, 5).unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].node_id, "drill");
        assert_eq!(ranked[0].score.event_count, 5);

        let drill = analyzer.node_metrics("line", "drill", f64::MAX).unwrap();
        assert_eq!(drill.event_count, 5);
    }

    #[test]
    fn test_unknown_entities() {
        let store = line();
        let analyzer = analyzer(&store);

        assert_eq!(
            analyzer.analyze_bottlenecks("nope", 1.0, 5).unwrap_err(),
            AnalysisError::not_found(EntityKind::Graph, "nope")
        );
        assert_eq!(
            analyzer.node_metrics("line", "ghost", 1.0).unwrap_err(),
            AnalysisError::not_found(EntityKind::Node, "ghost")
        );
        assert_eq!(
            analyzer.edge_metrics("line", "ghost", 1.0).unwrap_err(),
            AnalysisError::not_found(EntityKind::Edge, "ghost")
        );
    }

    #[test]
    fn test_critical_path_and_summary() {
        let store = line();
        let analyzer = analyzer(&store);

        let path = analyzer.critical_path("line").unwrap();
        assert_eq!(path.path, vec!["Saw", "Drill", "Pack"]);
        assert_eq!(path.total_duration, 160.0);

        let summary = analyzer.graph_summary("line").unwrap();
        assert_eq!(summary.node_count, 3);
        assert_eq!(summary.edge_count, 2);
        assert!(summary.is_acyclic);
    }

    /// Topology reads work; the event log is down.
    struct EventsDown(MemoryStore);

    impl TopologyProvider for EventsDown {
        fn topology(&self, graph_id: &str) -> Result<Topology, ProviderError> {
            self.0.topology(graph_id)
        }
    }

    impl EventProvider for EventsDown {
        fn events_for_edge(&self, _: &str, _: DateTime<Utc>) -> Result<Vec<Event>, ProviderError> {
            Err(ProviderError::Unavailable("event log offline".into()))
        }

        fn events_into_node(
            &self,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<Vec<Event>, ProviderError> {
            Err(ProviderError::Unavailable("event log offline".into()))
        }
    }

    #[test]
    fn test_provider_failure_propagates() {
        let source = EventsDown(line());
        let analyzer = ProcessAnalyzer::new(&source).at(t(0));

        let err = analyzer.analyze_bottlenecks("line", 1.0, 5).unwrap_err();
        assert!(matches!(err, AnalysisError::UpstreamUnavailable(_)));

        // Topology-only entry points still work.
        assert!(analyzer.critical_path("line").is_ok());
        assert!(analyzer.graph_summary("line").is_ok());
    }
}
