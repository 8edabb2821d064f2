//! Error types for mapping-layer operations.

use thiserror::Error;

use grom_core::{Id, MappingError};
use grom_traversal::ExecutorError;

/// Top-level error type for the mapping layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// A single-result read yielded nothing.
    #[error("vertex not found for label {label}")]
    NotFound { label: String, id: Option<Id> },

    /// A lifecycle hook failed; `stage` names the hook point.
    #[error("{stage}: {source}")]
    Hook {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A targeted update named a property absent from the record schema.
    #[error("property not found in record schema: {0}")]
    UnknownProperty(String),

    /// Engine failure, propagated unchanged. Retry policy belongs to the
    /// transport.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

pub type Result<T> = std::result::Result<T, Error>;
