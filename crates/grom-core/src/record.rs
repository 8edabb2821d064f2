//! The base vertex component and the trait binding a record type to a
//! label and a property schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::label::to_snake_case;
use crate::schema::Field;
use crate::value::Id;

/// Property name carrying the vertex id.
pub const ID: &str = "id";
/// Property name of the creation timestamp.
pub const CREATED_AT: &str = "created_at";
/// Property name of the last-modification timestamp.
pub const LAST_MODIFIED: &str = "last_modified";

/// Base component every mappable record embeds as a named field.
///
/// The client is the only writer of these fields: `id` and `created_at`
/// are stamped once at creation, `last_modified` at creation and on every
/// update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: Option<Id>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Binds a record type to a vertex label and a field schema.
///
/// Implementations embed a [`Vertex`] and expose it through the accessor
/// pair; `fields()` returns the type's schema in declaration order, built
/// once per type:
///
/// ```
/// use std::sync::OnceLock;
/// use grom_core::{from_value, Field, Value, Vertex, VertexRecord};
///
/// #[derive(Default)]
/// struct Person {
///     vertex: Vertex,
///     name: String,
/// }
///
/// impl VertexRecord for Person {
///     const NAME: &'static str = "Person";
///
///     fn vertex(&self) -> &Vertex {
///         &self.vertex
///     }
///
///     fn vertex_mut(&mut self) -> &mut Vertex {
///         &mut self.vertex
///     }
///
///     fn fields() -> &'static [Field<Self>] {
///         static FIELDS: OnceLock<Vec<Field<Person>>> = OnceLock::new();
///         FIELDS.get_or_init(|| {
///             vec![Field::new(
///                 "name",
///                 |p| Some(Value::from(p.name.clone())),
///                 |p, v| {
///                     p.name = from_value(v)?;
///                     Ok(())
///                 },
///             )]
///         })
///     }
/// }
///
/// assert_eq!(Person::label(), "person");
/// ```
pub trait VertexRecord: Default + Send {
    /// Declared type name, used to derive the default label.
    const NAME: &'static str;

    fn vertex(&self) -> &Vertex;

    fn vertex_mut(&mut self) -> &mut Vertex;

    /// The type's field schema in declaration order.
    fn fields() -> &'static [Field<Self>];

    /// Custom label override; the default label derives from
    /// [`VertexRecord::NAME`].
    fn custom_label() -> Option<&'static str> {
        None
    }

    /// The vertex label: the custom override when it is non-empty,
    /// otherwise the snake-cased type name.
    fn label() -> String {
        match Self::custom_label() {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => to_snake_case(Self::NAME),
        }
    }
}
