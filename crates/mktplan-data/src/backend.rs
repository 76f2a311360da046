//! The `Backend` trait -- the persistence capability the stores depend on.
//!
//! The stores treat persistence as a row-oriented query interface over named
//! relations: select with equality filters and ascending sort, insert,
//! update, delete, and upsert. The trait is intentionally object-safe so it
//! can be shared as `Arc<dyn Backend>` across stores.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// A persisted row: a flat JSON object.
pub type Row = serde_json::Map<String, Value>;

/// Error returned by backend operations. Every method is fallible; no
/// retries are attempted anywhere -- callers may re-invoke.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// The named relations the backend stores rows for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Plans,
    Templates,
    TemplateActivities,
    Tasks,
    Documents,
}

impl Relation {
    /// All relations, in snapshot order.
    pub const ALL: [Relation; 5] = [
        Relation::Plans,
        Relation::Templates,
        Relation::TemplateActivities,
        Relation::Tasks,
        Relation::Documents,
    ];
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plans => "plans",
            Self::Templates => "templates",
            Self::TemplateActivities => "template_activities",
            Self::Tasks => "tasks",
            Self::Documents => "documents",
        };
        f.write_str(s)
    }
}

impl FromStr for Relation {
    type Err = RelationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plans" => Ok(Self::Plans),
            "templates" => Ok(Self::Templates),
            "template_activities" => Ok(Self::TemplateActivities),
            "tasks" => Ok(Self::Tasks),
            "documents" => Ok(Self::Documents),
            other => Err(RelationParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Relation`] string.
#[derive(Debug, Clone)]
pub struct RelationParseError(pub String);

impl fmt::Display for RelationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown relation: {:?}", self.0)
    }
}

impl std::error::Error for RelationParseError {}

// ---------------------------------------------------------------------------
// Filters and ordering
// ---------------------------------------------------------------------------

/// A conjunction of equality constraints over row fields.
///
/// An empty filter matches every row.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality constraint: `field == value`.
    ///
    /// A value that fails to serialize degrades to a `field == null`
    /// clause (debug builds assert instead).
    pub fn eq(mut self, field: &str, value: impl Serialize) -> Self {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                debug_assert!(false, "unserializable filter value for {field}: {err}");
                Value::Null
            }
        };
        self.clauses.push((field.to_owned(), value));
        self
    }

    /// Whether the given row satisfies every constraint.
    pub fn matches(&self, row: &Row) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| row.get(field) == Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Ascending sort on a single field.
///
/// Missing fields sort first; numbers compare numerically, everything else
/// by its string form.
#[derive(Debug, Clone)]
pub struct Order {
    field: String,
}

impl Order {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
        }
    }

    /// Sort the given rows in place.
    pub fn apply(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| compare_values(a.get(&self.field), b.get(&self.field)));
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// The capability trait
// ---------------------------------------------------------------------------

/// Row-oriented persistence interface over named relations.
///
/// # Object Safety
///
/// This trait is object-safe: the stores hold it as `Arc<dyn Backend>`, so
/// tests can substitute an in-memory backend with failure injection.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch every row in `relation` matching `filter`, optionally sorted
    /// ascending by a field.
    async fn select(
        &self,
        relation: Relation,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, BackendError>;

    /// Insert rows into `relation`. Returns the first inserted row as stored.
    async fn insert(&self, relation: Relation, rows: Vec<Row>) -> Result<Row, BackendError>;

    /// Merge `patch` into every row of `relation` matching `filter`.
    async fn update(
        &self,
        relation: Relation,
        filter: &Filter,
        patch: Row,
    ) -> Result<(), BackendError>;

    /// Remove every row of `relation` matching `filter`.
    async fn delete(&self, relation: Relation, filter: &Filter) -> Result<(), BackendError>;

    /// Insert or replace rows in `relation`, matching existing rows on `id`.
    async fn upsert(&self, relation: Relation, rows: Vec<Row>) -> Result<(), BackendError>;
}

// Compile-time assertion: Backend must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Backend) {}
};

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

/// Serialize a model into a row.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Invalid(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a row back into a model.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, BackendError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Deserialize a whole result set.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(from_row).collect()
}
