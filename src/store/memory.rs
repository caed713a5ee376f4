//! In-process repository. Records live in insertion order behind a lock; transactions stage inserts until commit.

use super::{
    generate_id, Condition, Filter, OrderBy, Record, Repository, ResourceSchema, SortDirection,
    StoreError, Transaction, ID_FIELD,
};
use crate::paging::PageDescriptor;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock};

/// Repository backed by a `Vec` of records. Clones share storage.
#[derive(Clone)]
pub struct MemoryRepository {
    schema: Arc<ResourceSchema>,
    rows: Arc<RwLock<Vec<Record>>>,
}

impl MemoryRepository {
    pub fn new(schema: ResourceSchema) -> Self {
        MemoryRepository {
            schema: Arc::new(schema),
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed records directly, bypassing validation and hooks.
    pub fn with_records(self, records: impl IntoIterator<Item = Record>) -> Self {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(records);
        self
    }

    /// Copy of every stored record.
    pub fn records(&self) -> Vec<Record> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only known columns and relations.
    fn restrict(&self, data: Map<String, Value>) -> Map<String, Value> {
        data.into_iter()
            .filter(|(k, _)| self.schema.has_field(k) || self.schema.relation_info(k).is_some())
            .collect()
    }
}

fn check_unique<'a>(
    schema: &ResourceSchema,
    candidate: &Record,
    existing: impl Iterator<Item = &'a Record>,
) -> Result<(), StoreError> {
    let id = candidate.id();
    for other in existing {
        if other.id() == id {
            continue;
        }
        for field in &schema.unique {
            match (candidate.get(field), other.get(field)) {
                (Some(a), Some(b)) if !a.is_null() && a == b => {
                    return Err(StoreError::UniqueViolation {
                        target: vec![field.clone()],
                    });
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Equality between a stored value and a (typically string) filter value.
fn loosely_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            b.to_string() == *s
        }
        _ => stored == wanted,
    }
}

fn has_related(value: Option<&Value>, id: &str) -> bool {
    let matches_one = |v: &Value| match v {
        Value::String(s) => s == id,
        Value::Object(o) => o.get(ID_FIELD).and_then(Value::as_str) == Some(id),
        _ => false,
    };
    match value {
        Some(Value::Array(items)) => items.iter().any(matches_one),
        Some(other) => matches_one(other),
        None => false,
    }
}

fn matches(filter: &Filter, rec: &Record) -> bool {
    filter.conditions.iter().all(|c| match c {
        Condition::Eq { field, value } => rec
            .get(field)
            .map(|stored| loosely_equal(stored, value))
            .unwrap_or(false),
        Condition::Related { relation, id } => has_related(rec.get(relation), id),
    })
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn sort(records: &mut [Record], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for o in order {
            let ord = compare_values(a.get(&o.field), b.get(&o.field));
            let ord = match o.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl Repository for MemoryRepository {
    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.iter().find(|r| r.id() == id).cloned())
    }

    async fn find_page(
        &self,
        filter: &Filter,
        order: &[OrderBy],
        page: Option<PageDescriptor>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut found: Vec<Record> = {
            let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
            rows.iter().filter(|r| matches(filter, r)).cloned().collect()
        };
        sort(&mut found, order);
        Ok(match page {
            Some(p) => found
                .into_iter()
                .skip(p.skip as usize)
                .take(p.take as usize)
                .collect(),
            None => found,
        })
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.iter().filter(|r| matches(filter, r)).count() as u64)
    }

    async fn upsert(&self, record: &Record) -> Result<Record, StoreError> {
        let id = record.id();
        if id.is_empty() {
            return Err(StoreError::InvalidId {
                target: vec![ID_FIELD.into()],
            });
        }
        let record = Record::new(self.restrict(record.fields().clone()));
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        check_unique(&self.schema, &record, rows.iter())?;
        match rows.iter_mut().find(|r| r.id() == id) {
            Some(slot) => *slot = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        if rows.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            repo: self.clone(),
            staged: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct MemoryTransaction {
    repo: MemoryRepository,
    staged: Vec<Record>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Record>, StoreError> {
        if let Some(rec) = self.staged.iter().find(|r| r.id() == id) {
            return Ok(Some(rec.clone()));
        }
        self.repo.find_by_id(id).await
    }

    async fn create(&mut self, data: Map<String, Value>) -> Result<Record, StoreError> {
        let mut record = Record::new(self.repo.restrict(data));
        if record.id().is_empty() {
            record.set(ID_FIELD, Value::String(generate_id()));
        }
        let id = record.id();
        let rows = self.repo.rows.read().unwrap_or_else(PoisonError::into_inner);
        if rows.iter().chain(self.staged.iter()).any(|r| r.id() == id) {
            return Err(StoreError::UniqueViolation {
                target: vec![ID_FIELD.into()],
            });
        }
        check_unique(&self.repo.schema, &record, rows.iter().chain(self.staged.iter()))?;
        drop(rows);
        self.staged.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { repo, staged } = *self;
        let mut rows = repo.rows.write().unwrap_or_else(PoisonError::into_inner);
        for rec in &staged {
            let id = rec.id();
            if rows.iter().any(|r| r.id() == id) {
                return Err(StoreError::UniqueViolation {
                    target: vec![ID_FIELD.into()],
                });
            }
            check_unique(&repo.schema, rec, rows.iter())?;
        }
        rows.extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
