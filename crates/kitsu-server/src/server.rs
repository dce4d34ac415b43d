//! WebSocket server implementation.
//!
//! Handles client connections and routes messages to handlers.

use crate::handlers::{
    handle_bottlenecks, handle_critical_path, handle_edge_metrics, handle_list,
    handle_node_metrics, handle_summary, AppState, SharedStore,
};
use crate::protocol::{BottleneckParams, EntityParams, GraphParams, Request, Response};
use futures_util::{SinkExt, StreamExt};
use kitsu_graph::AnalysisConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 7432)),
        }
    }
}

/// The Kitsu WebSocket server.
pub struct KitsuServer {
    config: ServerConfig,
    state: AppState,
}

impl KitsuServer {
    /// Creates a new server over the given store.
    pub fn new(store: SharedStore, analysis: AnalysisConfig, config: ServerConfig) -> Self {
        Self {
            config,
            state: AppState::new(store, analysis),
        }
    }

    /// Runs the server, accepting connections forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Kitsu server listening on {}", self.config.addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, state).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handles a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    info!("WebSocket connection established with {}", addr);

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!("Message error from {}: {}", addr, e);
                break;
            }
        };

        if msg.is_close() {
            debug!("Client {} disconnected", addr);
            break;
        }

        if msg.is_ping() {
            write.send(Message::Pong(msg.into_data())).await?;
            continue;
        }

        if msg.is_text() {
            let text = msg.to_text().unwrap_or("");
            let response = process_message(text, state.clone()).await;
            let json = serde_json::to_string(&response)?;
            write.send(Message::Text(json)).await?;
        }
    }

    info!("Connection closed: {}", addr);
    Ok(())
}

fn parse_params<T: DeserializeOwned>(id: &Option<Value>, params: Value) -> Result<T, Response> {
    serde_json::from_value(params).map_err(|e| Response::invalid_params(id.clone(), e.to_string()))
}

/// Processes a JSON-RPC message and returns a response.
pub async fn process_message(text: &str, state: AppState) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return Response::parse_error(),
    };

    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return Response::invalid_request(id);
    }

    let method = request.method.as_str();
    debug!("Processing method: {}", method);

    match method {
        "graph.list" => handle_list(state, id).await,

        "graph.summary" => match parse_params::<GraphParams>(&id, request.params) {
            Ok(params) => handle_summary(state, id, params).await,
            Err(response) => response,
        },

        "critical_path" => match parse_params::<GraphParams>(&id, request.params) {
            Ok(params) => handle_critical_path(state, id, params).await,
            Err(response) => response,
        },

        "bottlenecks" => match parse_params::<BottleneckParams>(&id, request.params) {
            Ok(params) => handle_bottlenecks(state, id, params).await,
            Err(response) => response,
        },

        "node.metrics" => match parse_params::<EntityParams>(&id, request.params) {
            Ok(params) => handle_node_metrics(state, id, params).await,
            Err(response) => response,
        },

        "edge.metrics" => match parse_params::<EntityParams>(&id, request.params) {
            Ok(params) => handle_edge_metrics(state, id, params).await,
            Err(response) => response,
        },

        _ => Response::method_not_found(id, method),
    }
}
