//! List engine error types.

use thiserror::Error;

/// Errors raised while building or executing a list query.
///
/// Expected absences (no list source, no results, no contextual entity) are
/// modeled as `None` or empty collections and never reach this type.
#[derive(Debug, Error)]
pub enum ListError {
    /// A hierarchy-aware operator was used against a value the hierarchy
    /// handler for that entity type does not know.
    #[error("hierarchy for '{value}' of entity type '{entity_type}' could not be resolved")]
    HierarchyUnresolvable { entity_type: String, value: String },

    /// The stored list configuration does not have the expected shape.
    #[error("invalid list configuration: {0}")]
    InvalidConfiguration(String),

    /// The search backend failed to execute the query.
    #[error("search backend error")]
    Backend(#[from] anyhow::Error),
}

/// Result type alias using ListError.
pub type ListResult<T> = Result<T, ListError>;
