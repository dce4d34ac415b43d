//! Request handlers for protocol methods.
//!
//! Each handler implements one method. Analyses read from a blocking
//! store, so they run on the blocking thread pool.

use crate::protocol::{BottleneckParams, EntityParams, GraphParams, Response};
use kitsu_core::{GraphCatalog, GraphRecord, GraphSource};
use kitsu_graph::{AnalysisConfig, AnalysisError, BottleneckRecord, ProcessAnalyzer};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What the server needs from a store.
pub trait Backend: GraphSource + GraphCatalog {}

impl<T> Backend for T where T: GraphSource + GraphCatalog {}

/// Store shared across connections.
pub type SharedStore = Arc<dyn Backend>;

/// State every handler sees.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub analysis: AnalysisConfig,
}

impl AppState {
    pub fn new(store: SharedStore, analysis: AnalysisConfig) -> Self {
        Self { store, analysis }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, AnalysisError>
where
    F: FnOnce() -> Result<T, AnalysisError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|e| {
        Err(AnalysisError::UpstreamUnavailable(format!(
            "analysis task failed: {}",
            e
        )))
    })
}

fn respond<T: Serialize>(id: Option<Value>, result: Result<T, AnalysisError>) -> Response {
    match result {
        Ok(value) => Response::success(id, value),
        Err(err) => {
            debug!("Request failed: {}", err);
            Response::analysis_error(id, err)
        }
    }
}

/// Handles the graph.list method.
pub async fn handle_list(state: AppState, id: Option<Value>) -> Response {
    #[derive(Serialize)]
    struct ListResult {
        graphs: Vec<GraphRecord>,
        version: &'static str,
    }

    let store = state.store;
    let result = run_blocking(move || {
        Ok(ListResult {
            graphs: store.list_graphs()?,
            version: env!("CARGO_PKG_VERSION"),
        })
    })
    .await;
    respond(id, result)
}

/// Handles the graph.summary method.
pub async fn handle_summary(state: AppState, id: Option<Value>, params: GraphParams) -> Response {
    let AppState { store, analysis } = state;
    let result = run_blocking(move || {
        ProcessAnalyzer::with_config(&*store, analysis).graph_summary(&params.graph_id)
    })
    .await;
    respond(id, result)
}

/// Handles the critical_path method.
pub async fn handle_critical_path(
    state: AppState,
    id: Option<Value>,
    params: GraphParams,
) -> Response {
    let AppState { store, analysis } = state;
    let result = run_blocking(move || {
        ProcessAnalyzer::with_config(&*store, analysis).critical_path(&params.graph_id)
    })
    .await;
    respond(id, result)
}

/// Handles the bottlenecks method.
pub async fn handle_bottlenecks(
    state: AppState,
    id: Option<Value>,
    params: BottleneckParams,
) -> Response {
    #[derive(Serialize)]
    struct BottleneckResult {
        graph_id: String,
        window_hours: f64,
        bottlenecks: Vec<BottleneckRecord>,
        primary_bottleneck: Option<String>,
    }

    let AppState { store, analysis } = state;
    let window_hours = params.window_hours.unwrap_or(analysis.window_hours);
    let top_n = params.top_n.unwrap_or(analysis.top_n);

    debug!(
        "Bottlenecks for {} over {}h (top {})",
        params.graph_id, window_hours, top_n
    );

    let result = run_blocking(move || {
        let threshold = analysis.bottleneck_threshold;
        let analyzer = ProcessAnalyzer::with_config(&*store, analysis);
        let bottlenecks = analyzer.analyze_bottlenecks(&params.graph_id, window_hours, top_n)?;
        let primary_bottleneck = bottlenecks
            .first()
            .filter(|record| record.score.total_score > threshold)
            .map(|record| record.machine_name.clone());

        Ok(BottleneckResult {
            graph_id: params.graph_id,
            window_hours,
            bottlenecks,
            primary_bottleneck,
        })
    })
    .await;
    respond(id, result)
}

/// Handles the node.metrics method.
pub async fn handle_node_metrics(
    state: AppState,
    id: Option<Value>,
    params: EntityParams,
) -> Response {
    let AppState { store, analysis } = state;
    let window_hours = params.window_hours.unwrap_or(analysis.window_hours);
    let result = run_blocking(move || {
        ProcessAnalyzer::with_config(&*store, analysis).node_metrics(
            &params.graph_id,
            &params.id,
            window_hours,
        )
    })
    .await;
    respond(id, result)
}

/// Handles the edge.metrics method.
pub async fn handle_edge_metrics(
    state: AppState,
    id: Option<Value>,
    params: EntityParams,
) -> Response {
    let AppState { store, analysis } = state;
    let window_hours = params.window_hours.unwrap_or(analysis.window_hours);
    let result = run_blocking(move || {
        ProcessAnalyzer::with_config(&*store, analysis).edge_metrics(
            &params.graph_id,
            &params.id,
            window_hours,
        )
    })
    .await;
    respond(id, result)
}
