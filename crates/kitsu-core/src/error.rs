//! Error types shared by providers and the timer session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of record an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Graph,
    Node,
    Edge,
    Event,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Graph => "graph",
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Event => "event",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised by topology and event providers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid record: {0}")]
    Invalid(String),
}

impl ProviderError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Misuse of a [`crate::TimerSession`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("timer is already stopped")]
    AlreadyStopped,

    #[error("timer has not been stopped yet")]
    NotStopped,

    #[error("stop time precedes start time")]
    StopBeforeStart,
}
