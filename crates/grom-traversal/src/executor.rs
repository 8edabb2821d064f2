//! The graph-engine collaborator contract.

use async_trait::async_trait;
use thiserror::Error;

use grom_core::{PropertyMap, Value};

use crate::step::Traversal;

/// A single result row: a string-keyed property map.
pub type ResultRow = PropertyMap;

/// Errors surfaced by a traversal executor.
///
/// Retry policy, timeouts, and cancellation belong to the transport; the
/// mapping layer propagates these errors unchanged.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("traversal produced no result")]
    NoResult,

    #[error("unsupported step: {0}")]
    Unsupported(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// An engine capable of executing compiled traversals.
///
/// The four entry points mirror the result shapes an engine can produce: a
/// completion signal, a list of rows, at most one row, or a scalar value
/// (counts and ids). Implementations are externally synchronized; the
/// mapping layer only ever reads through a shared reference.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    /// Submit a traversal for its side effects only.
    async fn run(&self, traversal: Traversal) -> Result<(), ExecutorError>;

    /// Execute a traversal and collect every result row.
    async fn fetch_all(&self, traversal: Traversal) -> Result<Vec<ResultRow>, ExecutorError>;

    /// Execute a traversal and return the first result row, if any.
    async fn fetch_one(&self, traversal: Traversal) -> Result<Option<ResultRow>, ExecutorError>;

    /// Execute a traversal ending in a scalar-producing step.
    async fn fetch_value(&self, traversal: Traversal) -> Result<Value, ExecutorError>;
}
