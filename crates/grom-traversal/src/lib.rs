//! grom-traversal: the traversal intermediate representation and the
//! executor contract.
//!
//! A [`Traversal`] is a flat sequence of [`Step`]s — selection, filtering,
//! mutation, projection, paging — produced by the query compiler and
//! submitted to a [`GraphExecutor`]. Transports implement the executor
//! trait; this crate carries no I/O of its own.

pub mod executor;
pub mod step;

pub use executor::{ExecutorError, GraphExecutor, ResultRow};
pub use step::{Cardinality, Order, Predicate, Step, TextPredicate, Traversal};
