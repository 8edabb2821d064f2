//! grom-mem: an in-memory property-graph engine.
//!
//! Implements the [`GraphExecutor`] contract by interpreting traversals
//! over a process-local vertex store. Properties are multi-valued the way
//! graph engines keep them: `Single` writes replace, `List` writes append,
//! `Set` writes append unless the value is present. Used by the grom
//! integration tests and handy for local development; it is not a durable
//! store.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use grom_core::{Id, PropertyMap, Value};
use grom_traversal::{
    Cardinality, ExecutorError, GraphExecutor, Order, Predicate, ResultRow, Step, TextPredicate,
    Traversal,
};

#[derive(Debug, Clone)]
struct StoredVertex {
    label: String,
    props: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Default)]
struct Store {
    vertices: BTreeMap<Id, StoredVertex>,
    next_id: i64,
}

impl Store {
    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        Id::Int(self.next_id)
    }

    fn write_property(&mut self, id: &Id, cardinality: Cardinality, key: &str, value: Value) {
        let Some(vertex) = self.vertices.get_mut(id) else {
            return;
        };
        let slot = vertex.props.entry(key.to_string()).or_default();
        match cardinality {
            Cardinality::Single => {
                slot.clear();
                slot.push(value);
            }
            Cardinality::List => slot.push(value),
            Cardinality::Set => {
                if !slot.contains(&value) {
                    slot.push(value);
                }
            }
        }
    }
}

/// Traverser state while interpreting a step sequence.
enum Items {
    Vertices(Vec<Id>),
    Rows(Vec<PropertyMap>),
    Values(Vec<Value>),
}

impl Items {
    fn len(&self) -> usize {
        match self {
            Items::Vertices(v) => v.len(),
            Items::Rows(v) => v.len(),
            Items::Values(v) => v.len(),
        }
    }
}

/// In-memory graph engine.
#[derive(Debug, Default)]
pub struct MemGraph {
    store: Mutex<Store>,
}

impl MemGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vertices, across all labels.
    pub fn vertex_count(&self) -> usize {
        self.store.lock().map(|s| s.vertices.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, ExecutorError> {
        self.store
            .lock()
            .map_err(|_| ExecutorError::Transport("store lock poisoned".into()))
    }
}

#[async_trait]
impl GraphExecutor for MemGraph {
    async fn run(&self, traversal: Traversal) -> Result<(), ExecutorError> {
        let mut store = self.lock()?;
        execute(&mut store, &traversal)?;
        Ok(())
    }

    async fn fetch_all(&self, traversal: Traversal) -> Result<Vec<ResultRow>, ExecutorError> {
        let mut store = self.lock()?;
        match execute(&mut store, &traversal)? {
            Items::Rows(rows) => Ok(rows),
            Items::Vertices(ids) => Ok(ids
                .iter()
                .map(|id| project(&store, id, true))
                .collect()),
            Items::Values(_) => Err(ExecutorError::Unsupported(
                "scalar result where rows were expected".into(),
            )),
        }
    }

    async fn fetch_one(&self, traversal: Traversal) -> Result<Option<ResultRow>, ExecutorError> {
        Ok(self.fetch_all(traversal).await?.into_iter().next())
    }

    async fn fetch_value(&self, traversal: Traversal) -> Result<Value, ExecutorError> {
        let mut store = self.lock()?;
        match execute(&mut store, &traversal)? {
            Items::Values(values) => values.into_iter().next().ok_or(ExecutorError::NoResult),
            _ => Err(ExecutorError::NoResult),
        }
    }
}

fn execute(store: &mut Store, traversal: &Traversal) -> Result<Items, ExecutorError> {
    let mut items = Items::Vertices(Vec::new());
    for step in traversal.steps() {
        items = apply_step(store, items, step)?;
    }
    Ok(items)
}

fn apply_step(store: &mut Store, items: Items, step: &Step) -> Result<Items, ExecutorError> {
    match step {
        Step::Vertices(ids) => {
            if ids.is_empty() {
                Ok(Items::Vertices(store.vertices.keys().cloned().collect()))
            } else {
                Ok(Items::Vertices(
                    ids.iter()
                        .filter(|id| store.vertices.contains_key(id))
                        .cloned()
                        .collect(),
                ))
            }
        }
        Step::AddVertex(label) => {
            let id = store.allocate_id();
            store.vertices.insert(
                id.clone(),
                StoredVertex {
                    label: label.clone(),
                    props: BTreeMap::new(),
                },
            );
            Ok(Items::Vertices(vec![id]))
        }
        Step::MergeVertex {
            label,
            match_id,
            match_props,
            on_create,
            on_match,
        } => Ok(Items::Vertices(vec![merge_vertex(
            store,
            label,
            match_id.as_ref(),
            match_props,
            on_create,
            on_match,
        )])),
        Step::HasLabel(label) => filter_vertices(store, items, |_, vertex| vertex.label == *label),
        Step::HasId(ids) => filter_vertices(store, items, |id, _| ids.contains(id)),
        Step::Has { key, predicate } => filter_vertices(store, items, |_, vertex| {
            vertex
                .props
                .get(key)
                .is_some_and(|values| values.iter().any(|v| predicate_matches(predicate, v)))
        }),
        Step::HasText { key, predicate } => filter_vertices(store, items, |_, vertex| {
            vertex.props.get(key).is_some_and(|values| {
                values.iter().any(|v| text_predicate_matches(predicate, v))
            })
        }),
        Step::WhereTraversal(sub) => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "where applies to vertices".into(),
                ));
            };
            let mut kept = Vec::new();
            for id in ids {
                if eval_sub(store, &id, sub)?.len() > 0 {
                    kept.push(id);
                }
            }
            Ok(Items::Vertices(kept))
        }
        Step::Dedup => Ok(dedup(items)),
        Step::Property {
            cardinality,
            key,
            value,
        } => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "property applies to vertices".into(),
                ));
            };
            for id in &ids {
                store.write_property(id, *cardinality, key, value.clone());
            }
            Ok(Items::Vertices(ids))
        }
        Step::PropertyId(requested) => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "id assignment applies to vertices".into(),
                ));
            };
            let mut reassigned = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(vertex) = store.vertices.remove(&id) {
                    store.vertices.insert(requested.clone(), vertex);
                    reassigned.push(requested.clone());
                }
            }
            Ok(Items::Vertices(reassigned))
        }
        Step::OrderBy { key, order } => Ok(order_items(store, items, key, *order)),
        Step::Skip(n) => Ok(slice_items(items, *n as usize, usize::MAX)),
        Step::Limit(n) => Ok(slice_items(items, 0, *n as usize)),
        Step::Range { lower, upper } => {
            let lower = *lower as usize;
            let upper = *upper as usize;
            Ok(slice_items(items, lower, upper.saturating_sub(lower)))
        }
        Step::ValueMap { unfold_single } => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "value map applies to vertices".into(),
                ));
            };
            Ok(Items::Rows(
                ids.iter()
                    .map(|id| project(store, id, *unfold_single))
                    .collect(),
            ))
        }
        Step::ProjectUnion { subs } => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "projection applies to vertices".into(),
                ));
            };
            let mut rows = Vec::with_capacity(ids.len());
            for id in ids {
                let mut row = project(store, &id, true);
                for (key, sub) in subs {
                    row.insert(key.clone(), eval_sub_value(store, &id, sub)?);
                }
                rows.push(row);
            }
            Ok(Items::Rows(rows))
        }
        Step::Count => Ok(Items::Values(vec![Value::Int(items.len() as i64)])),
        Step::VertexId => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "id step applies to vertices".into(),
                ));
            };
            Ok(Items::Values(ids.into_iter().map(Value::Id).collect()))
        }
        Step::Drop => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported("drop applies to vertices".into()));
            };
            for id in &ids {
                store.vertices.remove(id);
            }
            Ok(Items::Vertices(Vec::new()))
        }
        Step::Constant(value) => Ok(Items::Values(vec![value.clone(); items.len().max(1)])),
        Step::Values(key) => {
            let Items::Vertices(ids) = items else {
                return Err(ExecutorError::Unsupported(
                    "values applies to vertices".into(),
                ));
            };
            let mut values = Vec::new();
            for id in ids {
                if let Some(vertex) = store.vertices.get(&id) {
                    if let Some(stored) = vertex.props.get(key) {
                        values.extend(stored.iter().cloned());
                    }
                }
            }
            Ok(Items::Values(values))
        }
    }
}

fn merge_vertex(
    store: &mut Store,
    label: &str,
    match_id: Option<&Id>,
    match_props: &PropertyMap,
    on_create: &PropertyMap,
    on_match: &PropertyMap,
) -> Id {
    let matched = match match_id {
        Some(id) => store
            .vertices
            .get(id)
            .filter(|vertex| vertex.label == label)
            .map(|_| id.clone()),
        None => store
            .vertices
            .iter()
            .find(|(_, vertex)| {
                vertex.label == label
                    && match_props.iter().all(|(key, value)| {
                        vertex
                            .props
                            .get(key)
                            .is_some_and(|stored| stored.iter().any(|v| values_equal(v, value)))
                    })
            })
            .map(|(id, _)| id.clone()),
    };

    match matched {
        Some(id) => {
            for (key, value) in on_match {
                store.write_property(&id, Cardinality::Single, key, value.clone());
            }
            id
        }
        None => {
            let id = match match_id {
                Some(id) => id.clone(),
                None => store.allocate_id(),
            };
            store.vertices.insert(
                id.clone(),
                StoredVertex {
                    label: label.to_string(),
                    props: BTreeMap::new(),
                },
            );
            for (key, value) in match_props {
                store.write_property(&id, Cardinality::Single, key, value.clone());
            }
            for (key, value) in on_create {
                store.write_property(&id, Cardinality::Single, key, value.clone());
            }
            id
        }
    }
}

fn filter_vertices(
    store: &Store,
    items: Items,
    keep: impl Fn(&Id, &StoredVertex) -> bool,
) -> Result<Items, ExecutorError> {
    let Items::Vertices(ids) = items else {
        return Err(ExecutorError::Unsupported(
            "vertex filter applied to non-vertex results".into(),
        ));
    };
    Ok(Items::Vertices(
        ids.into_iter()
            .filter(|id| store.vertices.get(id).is_some_and(|vertex| keep(id, vertex)))
            .collect(),
    ))
}

/// Project a vertex to its property map, with `id` and `label` keys, the
/// way valueMap-with-tokens behaves.
fn project(store: &Store, id: &Id, unfold_single: bool) -> PropertyMap {
    let mut row = PropertyMap::new();
    let Some(vertex) = store.vertices.get(id) else {
        return row;
    };
    row.insert("id", Value::Id(id.clone()));
    row.insert("label", vertex.label.clone());
    for (key, values) in &vertex.props {
        let value = if unfold_single && values.len() == 1 {
            values[0].clone()
        } else {
            Value::List(values.clone())
        };
        row.insert(key.clone(), value);
    }
    row
}

fn eval_sub(store: &mut Store, seed: &Id, sub: &Traversal) -> Result<Items, ExecutorError> {
    let mut items = Items::Vertices(vec![seed.clone()]);
    for step in sub.steps() {
        items = apply_step(store, items, step)?;
    }
    Ok(items)
}

fn eval_sub_value(store: &mut Store, seed: &Id, sub: &Traversal) -> Result<Value, ExecutorError> {
    let result = match eval_sub(store, seed, sub)? {
        Items::Values(mut values) => {
            if values.len() == 1 {
                values.remove(0)
            } else {
                Value::List(values)
            }
        }
        Items::Vertices(ids) => {
            let mut values: Vec<Value> = ids.into_iter().map(Value::Id).collect();
            if values.len() == 1 {
                values.remove(0)
            } else {
                Value::List(values)
            }
        }
        Items::Rows(rows) => Value::List(
            rows.into_iter()
                .map(|row| Value::Map(row.into_iter().collect()))
                .collect(),
        ),
    };
    Ok(result)
}

fn dedup(items: Items) -> Items {
    match items {
        Items::Vertices(ids) => {
            let mut seen = Vec::new();
            for id in ids {
                if !seen.contains(&id) {
                    seen.push(id);
                }
            }
            Items::Vertices(seen)
        }
        Items::Rows(rows) => {
            let mut seen: Vec<PropertyMap> = Vec::new();
            for row in rows {
                if !seen.contains(&row) {
                    seen.push(row);
                }
            }
            Items::Rows(seen)
        }
        Items::Values(values) => {
            let mut seen = Vec::new();
            for value in values {
                if !seen.contains(&value) {
                    seen.push(value);
                }
            }
            Items::Values(seen)
        }
    }
}

fn order_items(store: &Store, items: Items, key: &str, order: Order) -> Items {
    let reverse = order == Order::Desc;
    match items {
        Items::Vertices(mut ids) => {
            ids.sort_by(|a, b| {
                let left = store
                    .vertices
                    .get(a)
                    .and_then(|v| v.props.get(key))
                    .and_then(|values| values.first());
                let right = store
                    .vertices
                    .get(b)
                    .and_then(|v| v.props.get(key))
                    .and_then(|values| values.first());
                directed(compare_options(left, right), reverse)
            });
            Items::Vertices(ids)
        }
        Items::Rows(mut rows) => {
            rows.sort_by(|a, b| directed(compare_options(a.get(key), b.get(key)), reverse));
            Items::Rows(rows)
        }
        Items::Values(mut values) => {
            values.sort_by(|a, b| directed(compare_values(a, b), reverse));
            Items::Values(values)
        }
    }
}

fn directed(ordering: Ordering, reverse: bool) -> Ordering {
    if reverse {
        ordering.reverse()
    } else {
        ordering
    }
}

fn slice_items(items: Items, start: usize, count: usize) -> Items {
    fn window<T>(items: Vec<T>, start: usize, count: usize) -> Vec<T> {
        items.into_iter().skip(start).take(count).collect()
    }
    match items {
        Items::Vertices(ids) => Items::Vertices(window(ids, start, count)),
        Items::Rows(rows) => Items::Rows(window(rows, start, count)),
        Items::Values(values) => Items::Values(window(values, start, count)),
    }
}

fn predicate_matches(predicate: &Predicate, stored: &Value) -> bool {
    match predicate {
        Predicate::Eq(value) => values_equal(stored, value),
        Predicate::Neq(value) => !values_equal(stored, value),
        Predicate::Gt(value) => compare_values(stored, value) == Ordering::Greater,
        Predicate::Gte(value) => compare_values(stored, value) != Ordering::Less,
        Predicate::Lt(value) => compare_values(stored, value) == Ordering::Less,
        Predicate::Lte(value) => compare_values(stored, value) != Ordering::Greater,
        Predicate::Within(values) => values.iter().any(|v| values_equal(stored, v)),
        Predicate::Without(values) => !values.iter().any(|v| values_equal(stored, v)),
    }
}

fn text_predicate_matches(predicate: &TextPredicate, stored: &Value) -> bool {
    match predicate {
        TextPredicate::Containing(needle) => stored
            .as_str()
            .is_some_and(|text| text.contains(needle.as_str())),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare_values(a, b) == Ordering::Equal && comparable(a, b)
}

fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Int(_), Value::Int(_))
            | (Value::Int(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_))
            | (Value::Float(_), Value::Float(_))
            | (Value::String(_), Value::String(_))
            | (Value::Timestamp(_), Value::Timestamp(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Id(_), Value::Id(_))
    )
}

fn compare_options(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(left), Some(right)) => compare_values(left, right),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order over values: comparable pairs compare naturally, mixed
/// shapes fall back to a stable kind rank.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Id(x), Value::Id(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Int(_) => 1,
        Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Timestamp(_) => 4,
        Value::Id(_) => 5,
        Value::List(_) => 6,
        Value::Map(_) => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(graph: &MemGraph, label: &str, props: &[(&str, Value)]) -> Id {
        let mut store = graph.store.lock().unwrap();
        let id = store.allocate_id();
        store.vertices.insert(
            id.clone(),
            StoredVertex {
                label: label.to_string(),
                props: BTreeMap::new(),
            },
        );
        for (key, value) in props {
            store.write_property(&id, Cardinality::Single, key, value.clone());
        }
        id
    }

    #[tokio::test]
    async fn full_scan_filters_by_label_and_property() {
        let graph = MemGraph::new();
        seed(&graph, "person", &[("name", Value::from("ada"))]);
        seed(&graph, "person", &[("name", Value::from("brin"))]);
        seed(&graph, "device", &[("name", Value::from("ada"))]);

        let traversal = Traversal::vertices([])
            .has_label("person")
            .has("name", Predicate::Eq(Value::from("ada")));
        let rows = graph.fetch_all(traversal).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("label"), Some(&Value::from("person")));
    }

    #[tokio::test]
    async fn single_valued_properties_unfold() {
        let graph = MemGraph::new();
        let id = seed(&graph, "person", &[("name", Value::from("ada"))]);
        {
            let mut store = graph.store.lock().unwrap();
            store.write_property(&id, Cardinality::Set, "tag", Value::from("a"));
            store.write_property(&id, Cardinality::Set, "tag", Value::from("b"));
        }

        let mut traversal = Traversal::vertices([]);
        traversal.push(Step::ValueMap {
            unfold_single: true,
        });
        let rows = graph.fetch_all(traversal).await.unwrap();
        assert_eq!(rows[0].get("name"), Some(&Value::from("ada")));
        assert_eq!(
            rows[0].get("tag"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[tokio::test]
    async fn order_skip_limit_range_compose() {
        let graph = MemGraph::new();
        for sort in [3, 1, 2] {
            seed(&graph, "item", &[("sort", Value::from(sort))]);
        }

        let traversal = Traversal::vertices([])
            .order_by("sort", Order::Asc)
            .range(1, 3)
            .values("sort");
        let mut store = graph.store.lock().unwrap();
        let Items::Values(values) = execute(&mut store, &traversal).unwrap() else {
            panic!("expected values");
        };
        assert_eq!(values, vec![Value::from(2), Value::from(3)]);
    }

    #[tokio::test]
    async fn merge_by_content_is_idempotent() {
        let graph = MemGraph::new();
        let mut match_props = PropertyMap::new();
        match_props.insert("name", "ada");

        let mut traversal = Traversal::new();
        traversal.push(Step::MergeVertex {
            label: "person".into(),
            match_id: None,
            match_props: match_props.clone(),
            on_create: PropertyMap::new(),
            on_match: PropertyMap::new(),
        });
        traversal.push(Step::VertexId);

        let first = graph.fetch_value(traversal.clone()).await.unwrap();
        let second = graph.fetch_value(traversal).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.vertex_count(), 1);
    }

    #[tokio::test]
    async fn drop_removes_vertices() {
        let graph = MemGraph::new();
        seed(&graph, "person", &[("name", Value::from("ada"))]);
        seed(&graph, "person", &[("name", Value::from("brin"))]);

        let mut traversal = Traversal::vertices([]).has_label("person").limit(1);
        traversal.push(Step::Drop);
        graph.run(traversal).await.unwrap();
        assert_eq!(graph.vertex_count(), 1);
    }

    #[tokio::test]
    async fn fetch_value_on_empty_is_no_result() {
        let graph = MemGraph::new();
        let mut traversal = Traversal::vertices([Id::Int(99)]);
        traversal.push(Step::VertexId);
        let err = graph.fetch_value(traversal).await.unwrap_err();
        assert!(matches!(err, ExecutorError::NoResult));
    }

    #[tokio::test]
    async fn where_traversal_keeps_matching_vertices() {
        let graph = MemGraph::new();
        seed(&graph, "person", &[("name", Value::from("ada"))]);
        seed(&graph, "person", &[("name", Value::from("brin"))]);

        let sub = Traversal::new().has("name", Predicate::Eq(Value::from("brin")));
        let traversal = Traversal::vertices([]).where_traversal(sub);
        let rows = graph.fetch_all(traversal).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("brin")));
    }
}
