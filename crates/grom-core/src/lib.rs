//! grom-core: shared types for the grom object-to-graph mapping layer.
//!
//! This crate provides the foundational types used across the grom crates:
//! - Property values, ids, and the flat property map used at the
//!   marshalling boundary
//! - The `Vertex` base component and the `VertexRecord` schema trait
//! - Field annotation parsing and per-type field descriptors
//! - Value coercion out of inbound results
//! - Client configuration (engine dialect, id generation, debug tracing)

pub mod config;
pub mod convert;
pub mod error;
pub mod label;
pub mod record;
pub mod schema;
pub mod value;

pub use config::{uuid_id_generator, ClientConfig, Dialect, IdGenerator, DEBUG_ENV};
pub use convert::{from_value, FromValue};
pub use error::MappingError;
pub use label::to_snake_case;
pub use record::{Vertex, VertexRecord, CREATED_AT, ID, LAST_MODIFIED};
pub use schema::{Field, FieldSpec};
pub use value::{Id, PropertyMap, Value};
