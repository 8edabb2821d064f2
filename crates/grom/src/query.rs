//! The chainable query builder and its compiler.
//!
//! A [`Query`] accumulates declarative intent — conditions, ordering,
//! pagination, projections — and compiles it into a [`Traversal`] when one
//! of the execution methods consumes it. Builders are single-owner values;
//! start a fresh one per call chain.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::marker::PhantomData;

use chrono::Utc;

use grom_core::{from_value, Dialect, Id, PropertyMap, Value, VertexRecord, ID, LAST_MODIFIED};
use grom_traversal::{Cardinality, Order, Predicate, Step, TextPredicate, Traversal};

use crate::client::GraphClient;
use crate::error::{Error, Result};
use crate::hooks::{self, Hooks};
use crate::marshal::unmarshal;

/// Condition operator accepted by [`Query::filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Without,
    Contains,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Comparator::Eq => "eq",
            Comparator::Neq => "neq",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::In => "within",
            Comparator::Without => "without",
            Comparator::Contains => "containing",
        };
        write!(f, "{name}")
    }
}

enum Condition {
    Property {
        field: String,
        cmp: Comparator,
        value: Value,
    },
    Traversal(Traversal),
}

struct OrderCondition {
    field: String,
    order: Order,
}

/// Human-readable mirror of builder mutations, logged before execution.
/// Purely diagnostic; never affects compiled output.
struct Trace {
    enabled: bool,
    buf: String,
}

impl Trace {
    fn new(enabled: bool, label: &str) -> Self {
        let mut trace = Trace {
            enabled,
            buf: String::new(),
        };
        trace.restart("v()", label);
        trace
    }

    fn restart(&mut self, base: &str, label: &str) {
        if !self.enabled {
            return;
        }
        self.buf.clear();
        self.buf.push_str(base);
        if !label.is_empty() {
            let _ = write!(self.buf, ".has_label({label})");
        }
    }

    fn record(&mut self, write: impl FnOnce(&mut String)) {
        if self.enabled {
            write(&mut self.buf);
        }
    }
}

/// A chainable, single-owner query over records of type `T`.
pub struct Query<'a, T: VertexRecord> {
    client: &'a GraphClient,
    label: String,
    ids: Vec<Id>,
    conditions: Vec<Condition>,
    order_by: Option<OrderCondition>,
    limit: Option<u64>,
    offset: Option<u64>,
    range: Option<(u64, u64)>,
    dedup: bool,
    pre_traversal: Option<Traversal>,
    sub_traversals: BTreeMap<String, Traversal>,
    trace: Trace,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T: VertexRecord + 'static> Query<'a, T> {
    pub(crate) fn new(client: &'a GraphClient) -> Self {
        let label = T::label();
        let trace = Trace::new(client.config().debug, &label);
        Query {
            client,
            label,
            ids: Vec::new(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
            range: None,
            dedup: false,
            pre_traversal: None,
            sub_traversals: BTreeMap::new(),
            trace,
            _record: PhantomData,
        }
    }

    /// Add a property condition.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        cmp: Comparator,
        value: impl Into<Value>,
    ) -> Self {
        let field = field.into();
        let value = value.into();
        self.trace.record(|buf| {
            let _ = write!(buf, ".has({field}, {cmp}({value}))");
        });
        self.conditions.push(Condition::Property { field, cmp, value });
        self
    }

    /// Add an opaque traversal predicate.
    pub fn filter_traversal(mut self, traversal: Traversal) -> Self {
        self.trace.record(|buf| buf.push_str(".where(<traversal>)"));
        self.conditions.push(Condition::Traversal(traversal));
        self
    }

    /// Drop duplicate results.
    pub fn dedup(mut self) -> Self {
        self.trace.record(|buf| buf.push_str(".dedup()"));
        self.dedup = true;
        self
    }

    /// Replace the default full-scan start with a custom traversal.
    /// Explicit ids become an id filter on top of it.
    pub fn pre_traversal(mut self, traversal: Traversal) -> Self {
        self.pre_traversal = Some(traversal);
        let label = self.label.clone();
        self.trace.restart("pre_traversal()", &label);
        self
    }

    /// Select by explicit ids, letting the engine use its id index.
    pub fn ids(mut self, ids: impl IntoIterator<Item = Id>) -> Self {
        let ids: Vec<Id> = ids.into_iter().collect();
        let has_pre = self.pre_traversal.is_some();
        self.trace.record(|buf| {
            buf.push_str(if has_pre { ".has_id(" } else { ".v(" });
            for id in &ids {
                let _ = write!(buf, "{id}, ");
            }
            buf.push(')');
        });
        self.ids.extend(ids);
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.trace.record(|buf| {
            let _ = write!(buf, ".limit({limit})");
        });
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` results.
    pub fn offset(mut self, offset: u64) -> Self {
        self.trace.record(|buf| {
            let _ = write!(buf, ".skip({offset})");
        });
        self.offset = Some(offset);
        self
    }

    /// Keep results at zero-based positions `[lower, upper)`.
    ///
    /// Ignored with a warning when an offset is already set.
    pub fn range(mut self, lower: u64, upper: u64) -> Self {
        if self.offset.is_some() {
            tracing::warn!("range should not be used with offset; it will be ignored");
            return self;
        }
        self.trace.record(|buf| {
            let _ = write!(buf, ".range({lower}, {upper})");
        });
        self.range = Some((lower, upper));
        self
    }

    /// Order results by a property. A second call overwrites the first and
    /// warns.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        if self.order_by.is_some() {
            tracing::warn!("order_by was already defined; the new ordering overrides it");
        }
        let field = field.into();
        self.trace.record(|buf| {
            let _ = write!(buf, ".order_by({field}, {order})");
        });
        self.order_by = Some(OrderCondition { field, order });
        self
    }

    /// Attach a named sub-traversal whose result fills the field annotated
    /// with the same key.
    pub fn sub_traversal(mut self, key: impl Into<String>, traversal: Traversal) -> Self {
        self.sub_traversals.insert(key.into(), traversal);
        self
    }

    /// Attach several named sub-traversals at once.
    pub fn sub_traversals(
        mut self,
        subs: impl IntoIterator<Item = (String, Traversal)>,
    ) -> Self {
        self.sub_traversals.extend(subs);
        self
    }

    // ── Execution ────────────────────────────────────────────────

    /// Execute and return every matching record.
    pub async fn find(mut self) -> Result<Vec<T>>
    where
        T: Hooks,
    {
        self.trace.record(|buf| buf.push_str(".to_list()"));
        let traversal = self.compile_for_read();
        let rows = self.client.executor().fetch_all(traversal).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = T::default();
            unmarshal(&mut record, &row)?;
            hooks::after_find(self.client, &mut record).await?;
            records.push(record);
        }
        Ok(records)
    }

    /// Execute and return the first matching record.
    pub async fn take(mut self) -> Result<T>
    where
        T: Hooks,
    {
        self.trace.record(|buf| buf.push_str(".next()"));
        let traversal = self.compile_for_read();
        let row = self
            .client
            .executor()
            .fetch_one(traversal)
            .await?
            .ok_or_else(|| Error::NotFound {
                label: self.label.clone(),
                id: None,
            })?;

        let mut record = T::default();
        unmarshal(&mut record, &row)?;
        hooks::after_find(self.client, &mut record).await?;
        Ok(record)
    }

    /// Fetch one vertex by id, skipping accumulated conditions — faster
    /// than a property filter where the id is known.
    pub async fn by_id(self, id: impl Into<Id>) -> Result<T>
    where
        T: Hooks,
    {
        let id = id.into();
        let traversal = Traversal::vertices([id.clone()]).has_label(self.label.clone());
        let traversal = self.apply_projection(traversal);
        let row = self
            .client
            .executor()
            .fetch_one(traversal)
            .await?
            .ok_or_else(|| Error::NotFound {
                label: self.label.clone(),
                id: Some(id),
            })?;

        let mut record = T::default();
        unmarshal(&mut record, &row)?;
        hooks::after_find(self.client, &mut record).await?;
        Ok(record)
    }

    /// Count matching vertices. Runs no hooks.
    pub async fn count(mut self) -> Result<u64> {
        self.trace.record(|buf| buf.push_str(".count()"));
        let mut traversal = self.compile_with_paging();
        traversal.push(Step::Count);
        let value = self.client.executor().fetch_value(traversal).await?;
        Ok(from_value(&value)?)
    }

    /// Delete every matching vertex. Runs no hooks.
    pub async fn delete(mut self) -> Result<()> {
        self.trace.record(|buf| buf.push_str(".drop()"));
        let mut traversal = self.compile_with_paging();
        traversal.push(Step::Drop);
        self.client.executor().run(traversal).await?;
        Ok(())
    }

    /// Set one property across every matching vertex, stamping
    /// `last_modified`.
    ///
    /// The name must appear in the record schema. List values emit one
    /// multi-cardinality step per element (list vs. set per dialect); map
    /// values emit one set-cardinality step per *key*; scalars emit a
    /// single-cardinality step.
    pub async fn update_property(mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let known = T::fields().iter().any(|field| field.spec().name == name);
        if !known {
            return Err(Error::UnknownProperty(name.to_string()));
        }

        let value = value.into();
        let mut traversal = self.compile_with_paging();
        traversal.push(Step::Property {
            cardinality: Cardinality::Single,
            key: LAST_MODIFIED.to_string(),
            value: Value::from(Utc::now()),
        });

        let multi = match self.client.config().dialect {
            Dialect::Neptune => Cardinality::Set,
            Dialect::Gremlin => Cardinality::List,
        };
        match value {
            Value::List(items) => {
                for item in items {
                    traversal.push(Step::Property {
                        cardinality: multi,
                        key: name.to_string(),
                        value: item,
                    });
                }
            }
            Value::Map(entries) => {
                for key in entries.into_keys() {
                    traversal.push(Step::Property {
                        cardinality: Cardinality::Set,
                        key: name.to_string(),
                        value: Value::String(key),
                    });
                }
            }
            scalar => {
                traversal.push(Step::Property {
                    cardinality: Cardinality::Single,
                    key: name.to_string(),
                    value: scalar,
                });
            }
        }

        self.client.executor().run(traversal).await?;
        Ok(())
    }

    // ── Compilation ──────────────────────────────────────────────

    /// Base selection, label filter, conditions, dedup.
    fn compile(&mut self) -> Traversal {
        self.flush_trace();

        let mut traversal = match (&self.pre_traversal, self.ids.is_empty()) {
            (Some(pre), true) => pre.clone(),
            (Some(pre), false) => pre.clone().has_id(self.ids.clone()),
            (None, false) => Traversal::vertices(self.ids.clone()),
            (None, true) => Traversal::vertices([]),
        };

        if !self.label.is_empty() {
            traversal = traversal.has_label(self.label.clone());
        }

        for condition in &self.conditions {
            apply_condition(&mut traversal, condition);
        }

        if self.dedup {
            traversal = traversal.dedup();
        }
        traversal
    }

    fn compile_with_paging(&mut self) -> Traversal {
        let traversal = self.compile();
        self.apply_order_and_paging(traversal)
    }

    fn compile_for_read(&mut self) -> Traversal {
        let traversal = self.compile();
        let traversal = self.apply_projection(traversal);
        self.apply_order_and_paging(traversal)
    }

    fn apply_projection(&self, mut traversal: Traversal) -> Traversal {
        if self.sub_traversals.is_empty() {
            traversal.push(Step::ValueMap {
                unfold_single: true,
            });
        } else {
            traversal.push(Step::ProjectUnion {
                subs: self.sub_traversals.clone(),
            });
        }
        traversal
    }

    fn apply_order_and_paging(&self, mut traversal: Traversal) -> Traversal {
        if let Some(order) = &self.order_by {
            traversal = traversal.order_by(order.field.clone(), order.order);
        }
        if let Some(offset) = self.offset {
            traversal = traversal.skip(offset);
        }
        if let Some(limit) = self.limit {
            traversal = traversal.limit(limit);
        }
        if let Some((lower, upper)) = self.range {
            traversal = traversal.range(lower, upper);
        }
        traversal
    }

    /// Log the accumulated trace and restart it for a potential reuse of
    /// the builder's remains.
    fn flush_trace(&mut self) {
        if !self.trace.enabled {
            return;
        }
        tracing::info!(query = %self.trace.buf, "running query");
        let label = self.label.clone();
        self.trace.restart("v()", &label);
    }

    #[cfg(test)]
    fn compiled_for_read(mut self) -> Traversal {
        self.compile_for_read()
    }

    #[cfg(test)]
    fn compiled(mut self) -> Traversal {
        self.compile_with_paging()
    }
}

fn apply_condition(traversal: &mut Traversal, condition: &Condition) {
    match condition {
        Condition::Traversal(sub) => traversal.push(Step::WhereTraversal(sub.clone())),
        Condition::Property { field, cmp, value } => match cmp {
            Comparator::Eq if field.as_str() == ID => {
                if let Ok(id) = from_value::<Id>(value) {
                    traversal.push(Step::HasId(vec![id]));
                }
            }
            Comparator::Eq => traversal.push(Step::Has {
                key: field.clone(),
                predicate: Predicate::Eq(value.clone()),
            }),
            Comparator::Neq => traversal.push(Step::Has {
                key: field.clone(),
                predicate: Predicate::Neq(value.clone()),
            }),
            Comparator::Gt => traversal.push(Step::Has {
                key: field.clone(),
                predicate: Predicate::Gt(value.clone()),
            }),
            Comparator::Gte => traversal.push(Step::Has {
                key: field.clone(),
                predicate: Predicate::Gte(value.clone()),
            }),
            Comparator::Lt => traversal.push(Step::Has {
                key: field.clone(),
                predicate: Predicate::Lt(value.clone()),
            }),
            Comparator::Lte => traversal.push(Step::Has {
                key: field.clone(),
                predicate: Predicate::Lte(value.clone()),
            }),
            // Membership over a non-list value emits no filter.
            Comparator::In => {
                if let Value::List(items) = value {
                    traversal.push(Step::Has {
                        key: field.clone(),
                        predicate: Predicate::Within(items.clone()),
                    });
                }
            }
            Comparator::Without => {
                if let Value::List(items) = value {
                    traversal.push(Step::Has {
                        key: field.clone(),
                        predicate: Predicate::Without(items.clone()),
                    });
                }
            }
            // Text containment over a non-string value emits no filter.
            Comparator::Contains => {
                if let Value::String(text) = value {
                    traversal.push(Step::HasText {
                        key: field.clone(),
                        predicate: TextPredicate::Containing(text.clone()),
                    });
                }
            }
        },
    }
}

/// An untyped query over a label, yielding raw property-map rows.
pub struct LabelQuery<'a> {
    client: &'a GraphClient,
    label: String,
    limit: Option<u64>,
}

impl<'a> LabelQuery<'a> {
    pub(crate) fn new(client: &'a GraphClient, label: impl Into<String>) -> Self {
        LabelQuery {
            client,
            label: label.into(),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fetch the property maps of every vertex carrying the label.
    pub async fn to_list(self) -> Result<Vec<PropertyMap>> {
        let mut traversal = Traversal::vertices([]).has_label(self.label);
        traversal.push(Step::ValueMap {
            unfold_single: true,
        });
        if let Some(limit) = self.limit {
            traversal = traversal.limit(limit);
        }
        Ok(self.client.executor().fetch_all(traversal).await?)
    }

    /// Count vertices carrying the label.
    pub async fn count(self) -> Result<u64> {
        let traversal = Traversal::vertices([]).has_label(self.label).count();
        let value = self.client.executor().fetch_value(traversal).await?;
        Ok(from_value(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use async_trait::async_trait;

    use grom_core::{Field, Vertex};
    use grom_traversal::{ExecutorError, GraphExecutor, ResultRow};

    use super::*;

    struct NullExecutor;

    #[async_trait]
    impl GraphExecutor for NullExecutor {
        async fn run(&self, _traversal: Traversal) -> std::result::Result<(), ExecutorError> {
            Ok(())
        }

        async fn fetch_all(
            &self,
            _traversal: Traversal,
        ) -> std::result::Result<Vec<ResultRow>, ExecutorError> {
            Ok(Vec::new())
        }

        async fn fetch_one(
            &self,
            _traversal: Traversal,
        ) -> std::result::Result<Option<ResultRow>, ExecutorError> {
            Ok(None)
        }

        async fn fetch_value(
            &self,
            _traversal: Traversal,
        ) -> std::result::Result<Value, ExecutorError> {
            Err(ExecutorError::NoResult)
        }
    }

    #[derive(Default, Debug)]
    struct Device {
        vertex: Vertex,
        name: String,
    }

    impl VertexRecord for Device {
        const NAME: &'static str = "Device";

        fn vertex(&self) -> &Vertex {
            &self.vertex
        }

        fn vertex_mut(&mut self) -> &mut Vertex {
            &mut self.vertex
        }

        fn fields() -> &'static [Field<Self>] {
            static FIELDS: OnceLock<Vec<Field<Device>>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                vec![Field::new(
                    "name",
                    |r| Some(Value::from(r.name.clone())),
                    |r, v| {
                        r.name = from_value(v)?;
                        Ok(())
                    },
                )]
            })
        }
    }

    impl Hooks for Device {}

    fn client() -> GraphClient {
        GraphClient::new(NullExecutor)
    }

    #[test]
    fn base_selection_precedence() {
        let db = client();

        let full_scan = db.model::<Device>().compiled();
        assert_eq!(full_scan.steps()[0], Step::Vertices(Vec::new()));
        assert_eq!(full_scan.steps()[1], Step::HasLabel("device".into()));

        let by_ids = db.model::<Device>().ids([Id::Int(1), Id::Int(2)]).compiled();
        assert_eq!(
            by_ids.steps()[0],
            Step::Vertices(vec![Id::Int(1), Id::Int(2)])
        );

        let pre = db
            .model::<Device>()
            .pre_traversal(Traversal::vertices([]).has("name", Predicate::Eq(Value::from("x"))))
            .ids([Id::Int(3)])
            .compiled();
        assert_eq!(pre.steps()[0], Step::Vertices(Vec::new()));
        assert!(matches!(pre.steps()[1], Step::Has { .. }));
        assert_eq!(pre.steps()[2], Step::HasId(vec![Id::Int(3)]));
        assert_eq!(pre.steps()[3], Step::HasLabel("device".into()));
    }

    #[test]
    fn id_equality_becomes_id_filter() {
        let db = client();
        let traversal = db
            .model::<Device>()
            .filter(ID, Comparator::Eq, Id::Int(7))
            .compiled();
        assert!(traversal
            .steps()
            .iter()
            .any(|step| *step == Step::HasId(vec![Id::Int(7)])));
    }

    #[test]
    fn lenient_conditions_emit_no_step() {
        let db = client();
        let traversal = db
            .model::<Device>()
            .filter("name", Comparator::In, "not a list")
            .filter("name", Comparator::Contains, 42)
            .compiled();
        assert!(!traversal
            .steps()
            .iter()
            .any(|step| matches!(step, Step::Has { .. } | Step::HasText { .. })));
    }

    #[test]
    fn read_projection_precedes_order_and_paging() {
        let db = client();
        let traversal = db
            .model::<Device>()
            .order_by("name", Order::Desc)
            .offset(5)
            .limit(10)
            .compiled_for_read();

        let steps = traversal.steps();
        let value_map = steps
            .iter()
            .position(|step| matches!(step, Step::ValueMap { .. }))
            .unwrap();
        let order = steps
            .iter()
            .position(|step| matches!(step, Step::OrderBy { .. }))
            .unwrap();
        let skip = steps.iter().position(|step| matches!(step, Step::Skip(_))).unwrap();
        let limit = steps
            .iter()
            .position(|step| matches!(step, Step::Limit(_)))
            .unwrap();
        assert!(value_map < order && order < skip && skip < limit);
    }

    #[test]
    fn second_order_by_wins() {
        let db = client();
        let traversal = db
            .model::<Device>()
            .order_by("name", Order::Asc)
            .order_by("name", Order::Desc)
            .compiled_for_read();
        let order = traversal
            .steps()
            .iter()
            .find_map(|step| match step {
                Step::OrderBy { order, .. } => Some(*order),
                _ => None,
            })
            .unwrap();
        assert_eq!(order, Order::Desc);
    }

    #[test]
    fn range_is_ignored_after_offset() {
        let db = client();
        let traversal = db
            .model::<Device>()
            .offset(4)
            .range(0, 10)
            .compiled_for_read();
        assert!(!traversal
            .steps()
            .iter()
            .any(|step| matches!(step, Step::Range { .. })));
        assert!(traversal.steps().iter().any(|step| *step == Step::Skip(4)));
    }

    #[test]
    fn sub_traversals_switch_projection() {
        let db = client();
        let traversal = db
            .model::<Device>()
            .sub_traversal("note", Traversal::new().constant("x"))
            .compiled_for_read();
        assert!(traversal
            .steps()
            .iter()
            .any(|step| matches!(step, Step::ProjectUnion { .. })));
        assert!(!traversal
            .steps()
            .iter()
            .any(|step| matches!(step, Step::ValueMap { .. })));
    }

    #[tokio::test]
    async fn unknown_property_update_is_rejected() {
        let db = client();
        let err = db
            .model::<Device>()
            .update_property("badField", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProperty(name) if name == "badField"));
    }

    #[tokio::test]
    async fn take_on_empty_result_is_not_found() {
        let db = client();
        let err = db.model::<Device>().take().await.unwrap_err();
        assert!(matches!(err, Error::NotFound { label, .. } if label == "device"));
    }
}
