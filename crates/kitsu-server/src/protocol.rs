//! JSON-RPC 2.0 message types and method parameters.

use kitsu_graph::AnalysisError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const NOT_FOUND: i32 = -32001;
pub const UPSTREAM_UNAVAILABLE: i32 = -32002;

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// An outgoing response carrying either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn success<T: Serialize>(id: Option<Value>, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(value),
                error: None,
            },
            Err(e) => Self::error(id, -32603, format!("Failed to encode result: {}", e)),
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::error(id, INVALID_REQUEST, "Invalid request")
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, format!("Invalid params: {}", message.into()))
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    /// Maps an analysis failure to a structured error.
    pub fn analysis_error(id: Option<Value>, err: AnalysisError) -> Self {
        let (code, data) = match &err {
            AnalysisError::NotFound { kind, id } => {
                (NOT_FOUND, Some(json!({ "kind": kind, "id": id })))
            }
            AnalysisError::UpstreamUnavailable(_) => (UPSTREAM_UNAVAILABLE, None),
        };
        let mut response = Self::error(id, code, err.to_string());
        if let Some(error) = response.error.as_mut() {
            error.data = data;
        }
        response
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Method parameters
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for `graph.summary` and `critical_path`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphParams {
    pub graph_id: String,
}

/// Parameters for `bottlenecks`. Omitted values use the server's
/// analysis defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BottleneckParams {
    pub graph_id: String,
    #[serde(default)]
    pub window_hours: Option<f64>,
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// Parameters for `node.metrics` and `edge.metrics`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityParams {
    pub graph_id: String,
    pub id: String,
    #[serde(default)]
    pub window_hours: Option<f64>,
}
