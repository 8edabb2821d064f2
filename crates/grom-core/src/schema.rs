//! Per-type declarative field schema.
//!
//! Each mappable field is described once by a [`FieldSpec`] parsed from its
//! annotation string, paired with get/set accessor fns in a [`Field`]. A
//! record type's full schema is the static slice returned by
//! [`crate::VertexRecord::fields`], built once per type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::value::Value;

/// Parsed field annotation metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Property name; empty or `"-"` means the field is not mapped outbound.
    pub name: String,
    /// Skip the field outbound when its value is at the type's default.
    pub omit_if_default: bool,
    /// The field is an extras sink receiving unclaimed inbound properties
    /// instead of a normal property.
    pub unmapped: bool,
    /// Result key filled by a named sub-traversal. Such fields are never
    /// sent outbound, and this key wins over `name` when both are present
    /// in an inbound result.
    pub sub_traversal: Option<String>,
}

impl FieldSpec {
    /// Parse a field annotation: `"<name>[,omitempty][,unmapped]"`.
    ///
    /// Empty segments between commas are dropped and unknown modifiers are
    /// ignored; there are no error cases. An empty annotation yields an
    /// empty name with all flags unset.
    pub fn parse(tag: &str) -> Self {
        let mut parts = tag.split(',').filter(|p| !p.is_empty());
        let mut spec = FieldSpec {
            name: parts.next().unwrap_or("").to_string(),
            ..FieldSpec::default()
        };
        for part in parts {
            match part {
                "omitempty" => spec.omit_if_default = true,
                "unmapped" => spec.unmapped = true,
                _ => {}
            }
        }
        spec
    }

    /// Whether the field maps to an outbound property name.
    pub fn is_mapped(&self) -> bool {
        !self.name.is_empty() && self.name != "-"
    }
}

/// One field of a record schema: parsed metadata plus accessors.
///
/// `get` returns `None` for unset optional fields (they are skipped
/// outbound); `set` coerces an inbound value into the field and reports
/// unconvertible values.
pub struct Field<T> {
    spec: FieldSpec,
    get: fn(&T) -> Option<Value>,
    set: fn(&mut T, &Value) -> Result<(), MappingError>,
}

impl<T> Field<T> {
    pub fn new(
        tag: &str,
        get: fn(&T) -> Option<Value>,
        set: fn(&mut T, &Value) -> Result<(), MappingError>,
    ) -> Self {
        Field {
            spec: FieldSpec::parse(tag),
            get,
            set,
        }
    }

    /// Attach the sub-traversal result key for this field.
    pub fn sub_traversal(mut self, key: impl Into<String>) -> Self {
        self.spec.sub_traversal = Some(key.into());
        self
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn get(&self, record: &T) -> Option<Value> {
        (self.get)(record)
    }

    pub fn set(&self, record: &mut T, value: &Value) -> Result<(), MappingError> {
        (self.set)(record, value)
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("spec", &self.spec).finish()
    }
}
