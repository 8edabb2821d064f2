//! The create/update/save orchestrator and query entry points.

use std::sync::Arc;

use chrono::Utc;

use grom_core::{
    from_value, ClientConfig, Dialect, Id, IdGenerator, PropertyMap, Value, VertexRecord,
    CREATED_AT, ID, LAST_MODIFIED,
};
use grom_traversal::{Cardinality, GraphExecutor, Step, Traversal};

use crate::error::{Error, Result};
use crate::hooks::{self, Hooks};
use crate::marshal::marshal;
use crate::query::{Comparator, LabelQuery, Query};

/// Entry point binding typed records and queries to a graph engine.
///
/// Cheap to clone; clones share the executor.
#[derive(Clone)]
pub struct GraphClient {
    executor: Arc<dyn GraphExecutor>,
    config: ClientConfig,
    id_generator: Option<IdGenerator>,
}

impl GraphClient {
    /// Open a client over an executor with default configuration.
    pub fn new(executor: impl GraphExecutor + 'static) -> Self {
        Self::with_config(executor, ClientConfig::default())
    }

    /// Open a client with explicit configuration.
    pub fn with_config(executor: impl GraphExecutor + 'static, config: ClientConfig) -> Self {
        tracing::info!(dialect = ?config.dialect, debug = config.debug, "opening graph client");
        GraphClient {
            executor: Arc::new(executor),
            config,
            id_generator: None,
        }
    }

    /// Install an id generator consulted at create time. When it yields an
    /// id, that id is requested from the engine instead of an
    /// engine-assigned one.
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = Some(generator);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &dyn GraphExecutor {
        self.executor.as_ref()
    }

    /// A typed query builder for `T`.
    pub fn model<T: VertexRecord + 'static>(&self) -> Query<'_, T> {
        Query::new(self)
    }

    /// Shorthand for `model::<T>().filter(…)`.
    pub fn filter<T: VertexRecord + 'static>(
        &self,
        field: impl Into<String>,
        cmp: Comparator,
        value: impl Into<Value>,
    ) -> Query<'_, T> {
        self.model::<T>().filter(field, cmp, value)
    }

    /// An untyped query over a label.
    pub fn label(&self, label: impl Into<String>) -> LabelQuery<'_> {
        LabelQuery::new(self, label)
    }

    /// Persist the record as a new vertex.
    ///
    /// Runs the before-create hook, marshals (dropping any inbound id),
    /// stamps both timestamps, emits an add-vertex traversal, and stamps
    /// the resulting id back onto the record before the after-create hook.
    pub async fn create<T>(&self, record: &mut T) -> Result<()>
    where
        T: VertexRecord + Hooks + 'static,
    {
        hooks::before_create(self, record).await?;

        let (label, mut map) = marshal(record);
        map.remove(ID);
        let now = Utc::now();
        map.insert(CREATED_AT, now);
        map.insert(LAST_MODIFIED, now);

        let mut traversal = Traversal::add_vertex(label);
        apply_properties(&mut traversal, map, self.config.dialect);
        if let Some(id) = self.id_generator.as_ref().and_then(|generate| generate()) {
            traversal.push(Step::PropertyId(id));
        }
        traversal.push(Step::VertexId);

        let value = self.executor.fetch_value(traversal).await?;
        let id: Id = from_value(&value)?;

        let vertex = record.vertex_mut();
        vertex.id = Some(id);
        vertex.created_at = Some(now);
        vertex.last_modified = Some(now);

        hooks::after_create(self, record).await
    }

    /// Rewrite every mapped property of an existing vertex.
    ///
    /// Fails with a validation error when the marshalled payload carries
    /// no id.
    pub async fn update<T>(&self, record: &mut T) -> Result<()>
    where
        T: VertexRecord + Hooks + 'static,
    {
        hooks::before_update(self, record).await?;

        let (label, mut map) = marshal(record);
        let Some(id_value) = map.remove(ID) else {
            return Err(Error::Validation(
                "update requires a record with an id".into(),
            ));
        };
        let id: Id = from_value(&id_value)?;
        let now = Utc::now();
        map.insert(LAST_MODIFIED, now);

        let mut traversal = Traversal::vertices([id]).has_label(label);
        apply_properties(&mut traversal, map, self.config.dialect);
        traversal.push(Step::VertexId);
        self.executor.fetch_value(traversal).await?;

        record.vertex_mut().last_modified = Some(now);
        hooks::after_update(self, record).await
    }

    /// Create when the record has no id, update otherwise.
    pub async fn save<T>(&self, record: &mut T) -> Result<()>
    where
        T: VertexRecord + Hooks + 'static,
    {
        if record.vertex().id.is_none() {
            self.create(record).await
        } else {
            self.update(record).await
        }
    }

    /// Upsert the record.
    ///
    /// With an id: merge by id, updating all properties whether matched or
    /// created. Without one: merge with every marshalled property as match
    /// criteria, creating only when no match exists (timestamps are
    /// stamped only on create). Runs the create hook pair when the record
    /// carries no id and the update pair otherwise.
    pub async fn merge<T>(&self, record: &mut T) -> Result<()>
    where
        T: VertexRecord + Hooks + 'static,
    {
        let existing_id = record.vertex().id.clone();
        if existing_id.is_none() {
            hooks::before_create(self, record).await?;
        } else {
            hooks::before_update(self, record).await?;
        }

        let (label, mut map) = marshal(record);
        map.remove(ID);
        let now = Utc::now();

        let step = match &existing_id {
            Some(id) => {
                let mut on_create = map.clone();
                on_create.insert(CREATED_AT, now);
                on_create.insert(LAST_MODIFIED, now);
                let mut on_match = map;
                on_match.insert(LAST_MODIFIED, now);
                Step::MergeVertex {
                    label,
                    match_id: Some(id.clone()),
                    match_props: PropertyMap::new(),
                    on_create,
                    on_match,
                }
            }
            None => {
                let mut on_create = PropertyMap::new();
                on_create.insert(CREATED_AT, now);
                on_create.insert(LAST_MODIFIED, now);
                Step::MergeVertex {
                    label,
                    match_id: None,
                    match_props: map,
                    on_create,
                    on_match: PropertyMap::new(),
                }
            }
        };

        let mut traversal = Traversal::new();
        traversal.push(step);
        traversal.push(Step::VertexId);
        let value = self.executor.fetch_value(traversal).await?;
        let id: Id = from_value(&value)?;

        let vertex = record.vertex_mut();
        vertex.id = Some(id);
        if vertex.created_at.is_none() {
            vertex.created_at = Some(now);
        }
        vertex.last_modified = Some(now);

        if existing_id.is_none() {
            hooks::after_create(self, record).await
        } else {
            hooks::after_update(self, record).await
        }
    }
}

/// Emit one property step per payload entry.
///
/// Multi-valued encoding follows the dialect: Neptune requires one
/// set-cardinality step per element (map properties contribute their
/// values), Gremlin Server takes the collection as one single-cardinality
/// value.
fn apply_properties(traversal: &mut Traversal, map: PropertyMap, dialect: Dialect) {
    for (key, value) in map {
        match (dialect, value) {
            (Dialect::Neptune, Value::List(items)) => {
                for item in items {
                    traversal.push(Step::Property {
                        cardinality: Cardinality::Set,
                        key: key.clone(),
                        value: item,
                    });
                }
            }
            (Dialect::Neptune, Value::Map(entries)) => {
                for item in entries.into_values() {
                    traversal.push(Step::Property {
                        cardinality: Cardinality::Set,
                        key: key.clone(),
                        value: item,
                    });
                }
            }
            (_, value) => {
                traversal.push(Step::Property {
                    cardinality: Cardinality::Single,
                    key,
                    value,
                });
            }
        }
    }
}
