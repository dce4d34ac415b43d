use kitsu_core::{EntityKind, ProviderError};
use thiserror::Error;

/// Errors surfaced by analysis entry points.
///
/// Degenerate samples and graph algorithm hiccups never show up here;
/// they resolve to neutral scores inside the calculators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl AnalysisError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<ProviderError> for AnalysisError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}
