//! Error types shared across the engine layers

use crate::models::record::EntityId;
use thiserror::Error;

/// Failure at the collaborator boundary (record listing or remote aggregates).
///
/// Always recoverable: the next refresh trigger retries.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// A raw record that cannot take part in aggregation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record for entity {entity_id} has no date")]
    MissingDate { entity_id: EntityId },

    #[error("record for entity {entity_id} has unparseable date '{value}'")]
    InvalidDate { entity_id: EntityId, value: String },

    #[error("record for entity {entity_id} has no usable quantity")]
    MissingQuantity { entity_id: EntityId },

    #[error("record for entity {entity_id} has non-finite secondary quantity")]
    InvalidSecondary { entity_id: EntityId },

    #[error("record for entity {entity_id} has invalid category: {reason}")]
    InvalidCategory { entity_id: EntityId, reason: String },
}

/// Malformed query parameter or identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: '{value}'")]
pub struct ParseError {
    pub field: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// Outcome of a refresh cycle that produced no usable series.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every selected entity failed to fetch. The only blocking failure.
    #[error("no entity could be resolved (failed: {failed:?})")]
    NoEntitiesResolved { failed: Vec<EntityId> },

    /// The cycle was superseded; its results must be discarded.
    #[error("refresh cycle was cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ParseError> for EngineError {
    fn from(err: ParseError) -> Self {
        EngineError::InvalidRequest(err.to_string())
    }
}
