//! Conversion between records and flat property maps.

use std::collections::{BTreeMap, BTreeSet};

use grom_core::{
    from_value, FieldSpec, MappingError, PropertyMap, Value, VertexRecord, CREATED_AT, ID,
    LAST_MODIFIED,
};

/// Convert a record into its label and outbound property map.
///
/// The embedded base component is flattened first (id and timestamps, when
/// set), then each declared field in schema order — a declared field
/// overwrites a base key on collision. Skipped entirely: fields carrying a
/// sub-traversal key, fields without a mapped name, extras sinks, unset
/// optional fields, and `omitempty` fields at their zero value.
pub fn marshal<T: VertexRecord + 'static>(record: &T) -> (String, PropertyMap) {
    let mut map = PropertyMap::new();

    let vertex = record.vertex();
    if let Some(id) = &vertex.id {
        map.insert(ID, id.clone());
    }
    if let Some(created_at) = vertex.created_at {
        map.insert(CREATED_AT, created_at);
    }
    if let Some(last_modified) = vertex.last_modified {
        map.insert(LAST_MODIFIED, last_modified);
    }

    for field in T::fields() {
        let spec = field.spec();
        if spec.sub_traversal.is_some() || spec.unmapped || !spec.is_mapped() {
            continue;
        }
        let Some(value) = field.get(record) else {
            continue;
        };
        if spec.omit_if_default && value.is_zero() {
            continue;
        }
        map.insert(spec.name.clone(), value);
    }

    (T::label(), map)
}

/// Populate a record from an inbound property map.
///
/// Base-component keys are coerced into the vertex. Each field reads its
/// sub-traversal key when the result carries it, otherwise its property
/// name; when neither key is present the field is left untouched. After
/// the walk, every inbound key claimed by no field is copied verbatim into
/// each extras sink; a sink that cannot hold the values is skipped
/// silently.
pub fn unmarshal<T: VertexRecord + 'static>(record: &mut T, map: &PropertyMap) -> Result<(), MappingError> {
    let mut claimed: BTreeSet<&str> = BTreeSet::new();

    if let Some(value) = map.get(ID) {
        record.vertex_mut().id = Some(from_value(value)?);
        claimed.insert(ID);
    }
    if let Some(value) = map.get(CREATED_AT) {
        record.vertex_mut().created_at = Some(from_value(value)?);
        claimed.insert(CREATED_AT);
    }
    if let Some(value) = map.get(LAST_MODIFIED) {
        record.vertex_mut().last_modified = Some(from_value(value)?);
        claimed.insert(LAST_MODIFIED);
    }

    let mut sinks = Vec::new();
    let mut assignments = Vec::new();
    for field in T::fields() {
        let spec = field.spec();
        if spec.unmapped {
            sinks.push(field);
            continue;
        }
        let Some((key, value)) = select_entry(spec, map) else {
            continue;
        };
        claimed.insert(key);
        assignments.push((field, value));
    }
    for (field, value) in assignments {
        field.set(record, value)?;
    }

    if !sinks.is_empty() {
        let extras: BTreeMap<String, Value> = map
            .iter()
            .filter(|(key, _)| !claimed.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let extras = Value::Map(extras);
        for sink in sinks {
            let _ = sink.set(record, &extras);
        }
    }

    Ok(())
}

/// Pick the inbound entry for a field: the sub-traversal key wins when the
/// result carries it, then the property name; `None` when neither key is
/// present or the field maps nothing.
fn select_entry<'s, 'm>(
    spec: &'s FieldSpec,
    map: &'m PropertyMap,
) -> Option<(&'s str, &'m Value)> {
    if let Some(sub) = spec.sub_traversal.as_deref() {
        if !sub.is_empty() && sub != "-" {
            if let Some(value) = map.get(sub) {
                return Some((sub, value));
            }
        }
    }
    if spec.is_mapped() {
        if let Some(value) = map.get(&spec.name) {
            return Some((spec.name.as_str(), value));
        }
    }
    None
}
