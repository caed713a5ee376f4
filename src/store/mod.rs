//! Storage seam: the repository interface every backend implements, plus query descriptors and storage errors.

mod memory;
mod postgres;
mod schema;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use schema::{ColumnInfo, RelationInfo, ResourceSchema};

use crate::paging::PageDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key holding the record identifier.
pub const ID_FIELD: &str = "id";

/// A persisted entity: a JSON object with a string `id`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Record(fields)
    }

    /// Identifier as a string. Numeric ids are rendered; a missing id is empty.
    pub fn id(&self) -> String {
        match self.0.get(ID_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String view of a field, `None` for missing or non-string values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Record(fields)
    }
}

/// One condition of a collection filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Scalar field equals the value.
    Eq { field: String, value: Value },
    /// At least one entity of the relation has this id.
    Related { relation: String, id: String },
}

/// Conjunction of conditions. Empty matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn related(mut self, relation: impl Into<String>, id: impl Into<String>) -> Self {
        self.conditions.push(Condition::Related {
            relation: relation.into(),
            id: id.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Known storage failures. Each maps to a fixed HTTP shape in [`crate::error`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("A connection to the database has been timed out.")]
    ConnectionTimeout,
    #[error("The value of the field \"{}\" already exists.", .target.join(", "))]
    UniqueViolation { target: Vec<String> },
    #[error("The id \"{}\" is not valid.", .target.join(", "))]
    InvalidId { target: Vec<String> },
    #[error("You cannot do this action because a relation exists: {model}.{field}")]
    RelationExists {
        model: String,
        field: String,
        target: Vec<String>,
    },
    #[error("The provided value {value} for {model} field {field} is not valid")]
    InvalidValue {
        model: String,
        field: String,
        value: String,
        target: Vec<String>,
    },
    #[error("Record with id {0} not found.")]
    NotFound(String),
    #[error("{message}")]
    Other { code: Option<String>, message: String },
}

/// Repository over one resource. Routers depend only on this interface.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Known fields and relations of the resource.
    fn schema(&self) -> &ResourceSchema;

    async fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Matching records in `order`, restricted to `page` when given.
    async fn find_page(
        &self,
        filter: &Filter,
        order: &[OrderBy],
        page: Option<PageDescriptor>,
    ) -> Result<Vec<Record>, StoreError>;

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert when the id is absent, update otherwise.
    async fn upsert(&self, record: &Record) -> Result<Record, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Open an atomic unit of work. Dropping it uncommitted discards its writes.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Cheap liveness check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Writes staged inside [`Repository::begin`].
#[async_trait]
pub trait Transaction: Send {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Insert a new record. A missing `id` is generated.
    async fn create(&mut self, data: Map<String, Value>) -> Result<Record, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// New random record id.
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
