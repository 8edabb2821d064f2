//! Create/update/save/merge lifecycle and hook integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use uuid::Uuid;

use grom::{
    from_value, uuid_id_generator, ClientConfig, Dialect, Error, Field, GraphClient, Hooks, Id,
    Value, Vertex, VertexRecord,
};
use grom_mem::MemGraph;

#[derive(Default)]
struct Note {
    vertex: Vertex,
    name: String,
    tags: Vec<String>,
}

impl VertexRecord for Note {
    const NAME: &'static str = "Note";

    fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut self.vertex
    }

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: OnceLock<Vec<Field<Note>>> = OnceLock::new();
        FIELDS.get_or_init(|| {
            vec![
                Field::new(
                    "name",
                    |r| Some(Value::from(r.name.clone())),
                    |r, v| {
                        r.name = from_value(v)?;
                        Ok(())
                    },
                ),
                Field::new(
                    "tags",
                    |r| Some(Value::from(r.tags.clone())),
                    |r, v| {
                        r.tags = from_value(v)?;
                        Ok(())
                    },
                ),
            ]
        })
    }
}

impl Hooks for Note {}

#[derive(Default)]
struct HookedVertex {
    vertex: Vertex,
    name: String,
    hook_note: String,

    before_create_called: bool,
    after_create_called: bool,
    before_update_called: bool,
    after_update_called: bool,
    after_had_id: bool,
    after_had_modified_at: bool,
}

impl VertexRecord for HookedVertex {
    const NAME: &'static str = "HookedVertex";

    fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut self.vertex
    }

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: OnceLock<Vec<Field<HookedVertex>>> = OnceLock::new();
        FIELDS.get_or_init(|| {
            vec![
                Field::new(
                    "name",
                    |r| Some(Value::from(r.name.clone())),
                    |r, v| {
                        r.name = from_value(v)?;
                        Ok(())
                    },
                ),
                Field::new(
                    "hook_note",
                    |r| Some(Value::from(r.hook_note.clone())),
                    |r, v| {
                        r.hook_note = from_value(v)?;
                        Ok(())
                    },
                ),
            ]
        })
    }
}

#[async_trait]
impl Hooks for HookedVertex {
    async fn before_create(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        self.before_create_called = true;
        self.hook_note = "before-create".into();
        Ok(())
    }

    async fn after_create(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        self.after_create_called = true;
        self.after_had_id = self.vertex.id.is_some();
        self.after_had_modified_at = self.vertex.last_modified.is_some();
        Ok(())
    }

    async fn before_update(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        self.before_update_called = true;
        self.hook_note = "before-update".into();
        Ok(())
    }

    async fn after_update(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        self.after_update_called = true;
        self.after_had_id = self.vertex.id.is_some();
        self.after_had_modified_at = self.vertex.last_modified.is_some();
        Ok(())
    }
}

#[derive(Default)]
struct FoundVertex {
    vertex: Vertex,
    name: String,
    hook_note: String,
    after_find_called: bool,
}

impl VertexRecord for FoundVertex {
    const NAME: &'static str = "FoundVertex";

    fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut self.vertex
    }

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: OnceLock<Vec<Field<FoundVertex>>> = OnceLock::new();
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

#[async_trait]
impl Hooks for FoundVertex {
    async fn after_find(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        self.after_find_called = true;
        self.hook_note = "after-find".into();
        Ok(())
    }
}

#[derive(Default, Debug)]
struct FailingVertex {
    vertex: Vertex,
    name: String,
}

impl VertexRecord for FailingVertex {
    const NAME: &'static str = "FailingVertex";

    fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut self.vertex
    }

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: OnceLock<Vec<Field<FailingVertex>>> = OnceLock::new();
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

#[async_trait]
impl Hooks for FailingVertex {
    async fn before_create(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        anyhow::bail!("refusing to create")
    }

    async fn after_find(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        anyhow::bail!("after find failed")
    }
}

#[derive(Default)]
struct ExtrasVertex {
    vertex: Vertex,
    name: String,
    extras: HashMap<String, Value>,
}

impl VertexRecord for ExtrasVertex {
    const NAME: &'static str = "ExtrasVertex";

    fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut self.vertex
    }

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: OnceLock<Vec<Field<ExtrasVertex>>> = OnceLock::new();
        FIELDS.get_or_init(|| {
            vec![
                Field::new(
                    "name",
                    |r| Some(Value::from(r.name.clone())),
                    |r, v| {
                        r.name = from_value(v)?;
                        Ok(())
                    },
                ),
                Field::new(
                    "-,unmapped",
                    |_| None,
                    |r, v| {
                        r.extras = from_value(v)?;
                        Ok(())
                    },
                ),
            ]
        })
    }
}

impl Hooks for ExtrasVertex {}

fn db() -> GraphClient {
    GraphClient::new(MemGraph::new())
}

fn neptune_db() -> GraphClient {
    GraphClient::with_config(
        MemGraph::new(),
        ClientConfig {
            dialect: Dialect::Neptune,
            debug: false,
        },
    )
}

#[tokio::test]
async fn create_populates_base_component() {
    let db = db();
    let mut note = Note {
        name: "pre-test".into(),
        ..Note::default()
    };
    db.create(&mut note).await.unwrap();

    assert!(note.vertex().id.is_some());
    assert!(note.vertex().created_at.is_some());
    assert!(note.vertex().last_modified.is_some());
    assert_eq!(note.vertex().created_at, note.vertex().last_modified);
}

#[tokio::test]
async fn save_dispatches_on_id() {
    let db = db();
    let mut note = Note {
        name: "pre-test".into(),
        ..Note::default()
    };

    // Empty id: save creates.
    db.save(&mut note).await.unwrap();
    let id = note.vertex().id.clone().unwrap();
    let created_at = note.vertex().created_at;

    // Non-empty id: save updates in place.
    note.name = "post-test".into();
    db.save(&mut note).await.unwrap();
    assert_eq!(note.vertex().id.as_ref(), Some(&id));

    let loaded = db.model::<Note>().by_id(id).await.unwrap();
    assert_eq!(loaded.name, "post-test");
    assert_eq!(loaded.vertex().created_at, created_at);
    assert_eq!(db.model::<Note>().count().await.unwrap(), 1);
}

#[tokio::test]
async fn update_changes_only_last_modified() {
    let db = db();
    let mut note = Note {
        name: "original".into(),
        ..Note::default()
    };
    db.create(&mut note).await.unwrap();
    let created_at = note.vertex().created_at;
    let first_modified = note.vertex().last_modified;

    note.name = "renamed".into();
    db.update(&mut note).await.unwrap();
    assert_eq!(note.vertex().created_at, created_at);
    assert_ne!(note.vertex().last_modified, first_modified);
}

#[tokio::test]
async fn update_without_id_is_a_validation_error() {
    let db = db();
    let mut note = Note {
        name: "orphan".into(),
        ..Note::default()
    };
    let err = db.update(&mut note).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(db.model::<Note>().count().await.unwrap(), 0);
}

#[tokio::test]
async fn create_hooks_run_and_persist_mutations() {
    let db = db();
    let mut vertex = HookedVertex {
        name: "hook-test".into(),
        ..HookedVertex::default()
    };
    db.create(&mut vertex).await.unwrap();

    assert!(vertex.before_create_called);
    assert!(vertex.after_create_called);
    assert!(vertex.after_had_id);
    assert!(vertex.after_had_modified_at);

    let loaded = db
        .model::<HookedVertex>()
        .by_id(vertex.vertex().id.clone().unwrap())
        .await
        .unwrap();
    assert_eq!(loaded.hook_note, "before-create");
}

#[tokio::test]
async fn update_hooks_run_and_persist_mutations() {
    let db = db();
    let mut vertex = HookedVertex {
        name: "hook-test".into(),
        ..HookedVertex::default()
    };
    db.create(&mut vertex).await.unwrap();

    vertex.before_update_called = false;
    vertex.after_update_called = false;
    vertex.hook_note.clear();
    vertex.name = "hook-test-updated".into();

    db.save(&mut vertex).await.unwrap();
    assert!(vertex.before_update_called);
    assert!(vertex.after_update_called);
    assert!(vertex.after_had_id);
    assert!(vertex.after_had_modified_at);

    let loaded = db
        .model::<HookedVertex>()
        .by_id(vertex.vertex().id.clone().unwrap())
        .await
        .unwrap();
    assert_eq!(loaded.hook_note, "before-update");
    assert_eq!(loaded.name, "hook-test-updated");
}

#[tokio::test]
async fn before_create_failure_aborts_with_nothing_written() {
    let db = db();
    let mut vertex = FailingVertex {
        name: "doomed".into(),
        ..FailingVertex::default()
    };
    let err = db.create(&mut vertex).await.unwrap_err();
    assert!(matches!(err, Error::Hook { stage, .. } if stage == "before create hook"));
    assert!(vertex.vertex().id.is_none());
    assert_eq!(db.label("failing_vertex").count().await.unwrap(), 0);
}

#[tokio::test]
async fn after_find_runs_for_every_read_path() {
    let db = db();
    let mut records = vec![
        FoundVertex {
            name: "hook-find-1".into(),
            ..FoundVertex::default()
        },
        FoundVertex {
            name: "hook-find-2".into(),
            ..FoundVertex::default()
        },
    ];
    for record in &mut records {
        db.create(record).await.unwrap();
    }

    let results = db.model::<FoundVertex>().find().await.unwrap();
    assert_eq!(results.len(), records.len());
    for result in &results {
        assert!(result.after_find_called);
        assert_eq!(result.hook_note, "after-find");
    }

    let taken = db.model::<FoundVertex>().take().await.unwrap();
    assert!(taken.after_find_called);

    let found = db
        .model::<FoundVertex>()
        .by_id(records[0].vertex().id.clone().unwrap())
        .await
        .unwrap();
    assert!(found.after_find_called);
}

#[tokio::test]
async fn after_find_failure_fails_the_read() {
    let db = db();

    // Insert without hooks by writing through the untyped path: create a
    // sibling record type sharing the label is overkill here, so persist
    // via merge with a prepared id instead.
    let mut planted = FailingVertex {
        name: "hook-find-error".into(),
        ..FailingVertex::default()
    };
    planted.vertex_mut().id = Some(Id::Int(777));
    db.merge(&mut planted).await.unwrap();

    let err = db.model::<FailingVertex>().take().await.unwrap_err();
    assert!(matches!(err, Error::Hook { stage, .. } if stage == "after find hook"));
}

#[tokio::test]
async fn merge_without_id_upserts_by_content() {
    let db = db();
    let mut first = Note {
        name: "merge-me".into(),
        ..Note::default()
    };
    db.merge(&mut first).await.unwrap();
    let first_id = first.vertex().id.clone().unwrap();
    assert!(first.vertex().created_at.is_some());

    let mut second = Note {
        name: "merge-me".into(),
        ..Note::default()
    };
    db.merge(&mut second).await.unwrap();
    assert_eq!(second.vertex().id, Some(first_id));
    assert_eq!(db.model::<Note>().count().await.unwrap(), 1);
}

#[tokio::test]
async fn merge_with_id_updates_or_creates() {
    let db = db();
    let mut note = Note {
        name: "original".into(),
        ..Note::default()
    };
    note.vertex_mut().id = Some(Id::Int(42));
    db.merge(&mut note).await.unwrap();
    assert_eq!(db.model::<Note>().count().await.unwrap(), 1);

    note.name = "renamed".into();
    db.merge(&mut note).await.unwrap();
    assert_eq!(db.model::<Note>().count().await.unwrap(), 1);

    let loaded = db.model::<Note>().by_id(Id::Int(42)).await.unwrap();
    assert_eq!(loaded.name, "renamed");
}

#[tokio::test]
async fn id_generator_supplies_created_ids() {
    let db = GraphClient::new(MemGraph::new()).with_id_generator(uuid_id_generator());
    let mut note = Note {
        name: "generated".into(),
        ..Note::default()
    };
    db.create(&mut note).await.unwrap();
    assert!(matches!(note.vertex().id, Some(Id::Uuid(_))));
}

#[tokio::test]
async fn custom_id_generator_is_honored() {
    let fixed = Uuid::new_v4();
    let db = GraphClient::new(MemGraph::new())
        .with_id_generator(Arc::new(move || Some(Id::Uuid(fixed))));
    let mut note = Note {
        name: "pinned".into(),
        ..Note::default()
    };
    db.create(&mut note).await.unwrap();
    assert_eq!(note.vertex().id, Some(Id::Uuid(fixed)));

    let loaded = db.model::<Note>().by_id(Id::Uuid(fixed)).await.unwrap();
    assert_eq!(loaded.name, "pinned");
}

#[tokio::test]
async fn list_properties_round_trip_in_both_dialects() {
    for db in [db(), neptune_db()] {
        let mut note = Note {
            name: "tagged".into(),
            tags: vec!["a".into(), "b".into()],
            ..Note::default()
        };
        db.create(&mut note).await.unwrap();

        let loaded = db
            .model::<Note>()
            .by_id(note.vertex().id.clone().unwrap())
            .await
            .unwrap();
        assert_eq!(loaded.tags, vec!["a", "b"]);
    }
}

#[tokio::test]
async fn engine_tokens_land_in_extras_sink() {
    let db = db();
    let mut record = ExtrasVertex {
        name: "extra".into(),
        ..ExtrasVertex::default()
    };
    db.create(&mut record).await.unwrap();

    let loaded = db.model::<ExtrasVertex>().take().await.unwrap();
    assert_eq!(loaded.name, "extra");
    // The label token is a genuine inbound key claimed by no field.
    assert_eq!(
        loaded.extras.get("label"),
        Some(&Value::from("extras_vertex"))
    );
    assert!(!loaded.extras.contains_key("name"));
    assert!(!loaded.extras.contains_key("id"));
}
