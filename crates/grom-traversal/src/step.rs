//! Traversal steps and the traversal sequence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use grom_core::{Id, PropertyMap, Value};

/// Result ordering direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => write!(f, "asc"),
            Order::Desc => write!(f, "desc"),
        }
    }
}

/// Property write cardinality.
///
/// `Single` replaces any existing value, `List` appends, `Set` appends
/// unless the value is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    List,
    Set,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Single => write!(f, "single"),
            Cardinality::List => write!(f, "list"),
            Cardinality::Set => write!(f, "set"),
        }
    }
}

/// Value predicate applied by a property filter step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Within(Vec<Value>),
    Without(Vec<Value>),
}

/// Text predicate applied by a text filter step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextPredicate {
    Containing(String),
}

/// One traversal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Start from the given vertices; an empty id list is a full scan.
    Vertices(Vec<Id>),
    /// Create a vertex with the given label.
    AddVertex(String),
    /// Update a matching vertex or create one when no match exists.
    ///
    /// Matches by id when `match_id` is set, otherwise by `match_props`.
    /// `on_create` applies only to a newly created vertex, `on_match` only
    /// to an existing one.
    MergeVertex {
        label: String,
        match_id: Option<Id>,
        match_props: PropertyMap,
        on_create: PropertyMap,
        on_match: PropertyMap,
    },
    /// Keep vertices carrying the label.
    HasLabel(String),
    /// Keep vertices whose id is among the given ids.
    HasId(Vec<Id>),
    /// Keep vertices with a property value satisfying the predicate.
    Has { key: String, predicate: Predicate },
    /// Keep vertices with a string property satisfying the text predicate.
    HasText {
        key: String,
        predicate: TextPredicate,
    },
    /// Keep vertices for which the sub-traversal yields anything.
    WhereTraversal(Traversal),
    /// Drop duplicate results.
    Dedup,
    /// Write one property value with the given cardinality.
    Property {
        cardinality: Cardinality,
        key: String,
        value: Value,
    },
    /// Request a specific id for the vertex under construction.
    PropertyId(Id),
    /// Order results by a property or projected key.
    OrderBy { key: String, order: Order },
    /// Skip the first `n` results.
    Skip(u64),
    /// Keep at most `n` results.
    Limit(u64),
    /// Keep results at zero-based positions `[lower, upper)`.
    Range { lower: u64, upper: u64 },
    /// Project each vertex to its property map, including the `id` and
    /// `label` keys; `unfold_single` collapses single-valued
    /// multi-properties to scalars.
    ValueMap { unfold_single: bool },
    /// Project each vertex to the union of its property map and one
    /// sub-traversal result per named key, merged into one flat row.
    ProjectUnion { subs: BTreeMap<String, Traversal> },
    /// Produce the number of results.
    Count,
    /// Produce the id of each result vertex.
    VertexId,
    /// Remove every result vertex.
    Drop,
    /// Sub-traversal step: produce a constant value.
    Constant(Value),
    /// Sub-traversal step: produce the values of a property.
    Values(String),
}

/// A composed sequence of traversal operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traversal {
    steps: Vec<Step>,
}

impl Traversal {
    /// An empty (anonymous) traversal, extended step by step. Used for
    /// pre-traversals, where-predicates, and sub-traversal projections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the given vertices; no ids means a full scan.
    pub fn vertices(ids: impl IntoIterator<Item = Id>) -> Self {
        Traversal {
            steps: vec![Step::Vertices(ids.into_iter().collect())],
        }
    }

    /// Start a vertex creation.
    pub fn add_vertex(label: impl Into<String>) -> Self {
        Traversal {
            steps: vec![Step::AddVertex(label.into())],
        }
    }

    pub fn has_label(mut self, label: impl Into<String>) -> Self {
        self.steps.push(Step::HasLabel(label.into()));
        self
    }

    pub fn has_id(mut self, ids: impl IntoIterator<Item = Id>) -> Self {
        self.steps.push(Step::HasId(ids.into_iter().collect()));
        self
    }

    pub fn has(mut self, key: impl Into<String>, predicate: Predicate) -> Self {
        self.steps.push(Step::Has {
            key: key.into(),
            predicate,
        });
        self
    }

    pub fn has_text(mut self, key: impl Into<String>, predicate: TextPredicate) -> Self {
        self.steps.push(Step::HasText {
            key: key.into(),
            predicate,
        });
        self
    }

    pub fn where_traversal(mut self, traversal: Traversal) -> Self {
        self.steps.push(Step::WhereTraversal(traversal));
        self
    }

    pub fn dedup(mut self) -> Self {
        self.steps.push(Step::Dedup);
        self
    }

    pub fn property(
        mut self,
        cardinality: Cardinality,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.steps.push(Step::Property {
            cardinality,
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, key: impl Into<String>, order: Order) -> Self {
        self.steps.push(Step::OrderBy {
            key: key.into(),
            order,
        });
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.steps.push(Step::Skip(n));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.steps.push(Step::Limit(n));
        self
    }

    pub fn range(mut self, lower: u64, upper: u64) -> Self {
        self.steps.push(Step::Range { lower, upper });
        self
    }

    pub fn count(mut self) -> Self {
        self.steps.push(Step::Count);
        self
    }

    pub fn constant(mut self, value: impl Into<Value>) -> Self {
        self.steps.push(Step::Constant(value.into()));
        self
    }

    pub fn values(mut self, key: impl Into<String>) -> Self {
        self.steps.push(Step::Values(key.into()));
        self
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
