//! Coercion out of property values into native field types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::MappingError;
use crate::value::{Id, Value};

/// Conversion from an inbound property [`Value`] into a field's native type.
///
/// Rules: direct conversion where the shapes line up (including int↔float
/// and RFC 3339 strings into timestamps), element-wise conversion for
/// sequences, and wrapping a scalar as a single-element sequence when the
/// target is a sequence — engines commonly return single-valued
/// multi-properties unwrapped.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, MappingError>;
}

/// Free-function form of [`FromValue::from_value`], convenient in schema
/// accessor closures.
pub fn from_value<T: FromValue>(value: &Value) -> Result<T, MappingError> {
    T::from_value(value)
}

fn unconvertible<T>(value: &Value, expected: &'static str) -> Result<T, MappingError> {
    Err(MappingError::Unconvertible {
        expected,
        found: value.kind(),
    })
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Bool(v) => Ok(*v),
            _ => unconvertible(value, "bool"),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            _ => unconvertible(value, "int"),
        }
    }
}

macro_rules! int_from_value {
    ($($t:ty),* $(,)?) => {
        $(impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self, MappingError> {
                i64::from_value(value).map(|v| v as $t)
            }
        })*
    };
}

int_from_value!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            _ => unconvertible(value, "float"),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::String(v) => Ok(v.clone()),
            Value::Id(v) => Ok(v.to_string()),
            _ => unconvertible(value, "string"),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            Value::String(v) => DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| MappingError::Unconvertible {
                    expected: "timestamp",
                    found: "string",
                }),
            // Engines frequently surface timestamps as epoch milliseconds.
            Value::Int(v) => DateTime::from_timestamp_millis(*v).ok_or(
                MappingError::Unconvertible {
                    expected: "timestamp",
                    found: "int",
                },
            ),
            _ => unconvertible(value, "timestamp"),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Id(Id::Uuid(v)) => Ok(*v),
            Value::String(v) => Uuid::parse_str(v).map_err(|_| MappingError::Unconvertible {
                expected: "uuid",
                found: "string",
            }),
            _ => unconvertible(value, "uuid"),
        }
    }
}

impl FromValue for Id {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Id(v) => Ok(v.clone()),
            Value::Int(v) => Ok(Id::Int(*v)),
            Value::String(v) => Ok(Id::String(v.clone())),
            _ => unconvertible(value, "id"),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        T::from_value(value).map(Some)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            scalar => Ok(vec![T::from_value(scalar)?]),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_value(v)?)))
                .collect(),
            _ => unconvertible(value, "map"),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_value(v)?)))
                .collect(),
            _ => unconvertible(value, "map"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_conversions() {
        assert_eq!(i64::from_value(&Value::Int(7)).unwrap(), 7);
        assert_eq!(i32::from_value(&Value::Float(2.0)).unwrap(), 2);
        assert_eq!(f64::from_value(&Value::Int(3)).unwrap(), 3.0);
        assert_eq!(
            String::from_value(&Value::from("hello")).unwrap(),
            "hello"
        );
        assert!(bool::from_value(&Value::Int(1)).is_err());
    }

    #[test]
    fn list_converts_element_wise() {
        let value = Value::List(vec![Value::Float(1.0), Value::Float(2.0)]);
        let ints: Vec<i64> = from_value(&value).unwrap();
        assert_eq!(ints, vec![1, 2]);
    }

    #[test]
    fn scalar_wraps_into_single_element_list() {
        let items: Vec<String> = from_value(&Value::from("1")).unwrap();
        assert_eq!(items, vec!["1".to_string()]);
    }

    #[test]
    fn rfc3339_string_becomes_timestamp() {
        let now = Utc::now();
        let parsed: DateTime<Utc> =
            from_value(&Value::String(now.to_rfc3339())).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn string_map_sink_rejects_mixed_values() {
        let mut entries = BTreeMap::new();
        entries.insert("note".to_string(), Value::from("text"));
        entries.insert("flag".to_string(), Value::from(true));
        let result: Result<BTreeMap<String, String>, _> =
            from_value(&Value::Map(entries));
        assert!(result.is_err());
    }
}
