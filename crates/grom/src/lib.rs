//! grom: an object-to-property-graph mapping layer.
//!
//! Typed records bind to vertices through a per-type declarative schema; a
//! chainable query builder compiles filters, ordering, and pagination into
//! traversals executed by a pluggable engine behind the
//! [`GraphExecutor`] contract.
//!
//! ```
//! use std::sync::OnceLock;
//!
//! use grom::{
//!     from_value, Comparator, Field, GraphClient, Hooks, Value, Vertex, VertexRecord,
//! };
//! use grom_mem::MemGraph;
//!
//! #[derive(Default)]
//! struct Person {
//!     vertex: Vertex,
//!     name: String,
//! }
//!
//! impl VertexRecord for Person {
//!     const NAME: &'static str = "Person";
//!
//!     fn vertex(&self) -> &Vertex {
//!         &self.vertex
//!     }
//!
//!     fn vertex_mut(&mut self) -> &mut Vertex {
//!         &mut self.vertex
//!     }
//!
//!     fn fields() -> &'static [Field<Self>] {
//!         static FIELDS: OnceLock<Vec<Field<Person>>> = OnceLock::new();
//!         FIELDS.get_or_init(|| {
//!             vec![Field::new(
//!                 "name",
//!                 |p| Some(Value::from(p.name.clone())),
//!                 |p, v| {
//!                     p.name = from_value(v)?;
//!                     Ok(())
//!                 },
//!             )]
//!         })
//!     }
//! }
//!
//! impl Hooks for Person {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> grom::Result<()> {
//! let db = GraphClient::new(MemGraph::new());
//!
//! let mut person = Person {
//!     name: "ada".into(),
//!     ..Person::default()
//! };
//! db.create(&mut person).await?;
//! assert!(person.vertex().id.is_some());
//!
//! let found = db
//!     .model::<Person>()
//!     .filter("name", Comparator::Eq, "ada")
//!     .take()
//!     .await?;
//! assert_eq!(found.name, "ada");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod hooks;
pub mod marshal;
pub mod query;

pub use client::GraphClient;
pub use error::{Error, Result};
pub use hooks::Hooks;
pub use marshal::{marshal, unmarshal};
pub use query::{Comparator, LabelQuery, Query};

pub use grom_core::{
    from_value, to_snake_case, uuid_id_generator, ClientConfig, Dialect, Field, FieldSpec,
    FromValue, Id, IdGenerator, MappingError, PropertyMap, Value, Vertex, VertexRecord,
    CREATED_AT, DEBUG_ENV, ID, LAST_MODIFIED,
};
pub use grom_traversal::{
    Cardinality, ExecutorError, GraphExecutor, Order, Predicate, ResultRow, Step, TextPredicate,
    Traversal,
};
