//! Record model adapter: a statically declared field table per model type, the JSON projection,
//! partial updates, and upsert persistence.

mod tasks;
pub mod validation;

pub use tasks::TaskQueue;
pub use validation::{Format, ValidationRule, Violation};

use crate::error::AppError;
use crate::store::{Record, Repository};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reads a field; may suspend (e.g. to load related data).
pub type Getter<M> = Box<dyn for<'a> Fn(&'a M) -> BoxFuture<'a, Result<Value, AppError>> + Send + Sync>;

/// Writes a field from an input value.
pub type Setter<M> = Box<dyn Fn(&mut M, Value) -> Result<(), AppError> + Send + Sync>;

/// One entry of a model's field table.
pub struct Field<M> {
    name: &'static str,
    get: Getter<M>,
    set: Option<Setter<M>>,
    rule: Option<ValidationRule>,
    hidden: bool,
}

impl<M: 'static> Field<M> {
    /// Field whose value is produced asynchronously.
    pub fn computed<F>(name: &'static str, get: F) -> Self
    where
        F: for<'a> Fn(&'a M) -> BoxFuture<'a, Result<Value, AppError>> + Send + Sync + 'static,
    {
        Field {
            name,
            get: Box::new(get),
            set: None,
            rule: None,
            hidden: false,
        }
    }

    /// Field whose value is available synchronously.
    pub fn value<F>(name: &'static str, get: F) -> Self
    where
        F: Fn(&M) -> Value + Send + Sync + 'static,
    {
        Self::computed(name, move |m| {
            let v = get(m);
            Box::pin(async move { Ok(v) })
        })
    }

    pub fn writable<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut M, Value) -> Result<(), AppError> + Send + Sync + 'static,
    {
        self.set = Some(Box::new(set));
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Keep the field out of the JSON projection. It stays writable.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl<M> Field<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub(crate) fn validation_rule(&self) -> Option<&ValidationRule> {
        self.rule.as_ref()
    }
}

/// Shared, ordered field table of a model type. Built once per router.
pub type FieldTable<M> = Arc<Vec<Field<M>>>;

/// Guard run after a record is created inside the creation transaction. `Ok(false)` vetoes the creation.
#[async_trait]
pub trait BeforeInsert: Send + Sync {
    async fn before_insert(&self) -> Result<bool, AppError>;
}

/// Guard run before a record is deleted. `Ok(false)` vetoes the deletion.
#[async_trait]
pub trait BeforeDelete: Send + Sync {
    async fn before_delete(&self) -> Result<bool, AppError>;
}

/// Guard run before a partial update is applied. `Ok(false)` skips the update silently.
#[async_trait]
pub trait BeforeModify: Send + Sync {
    async fn before_modify(&self) -> Result<bool, AppError>;
}

/// A record type exposed through an [`crate::ApiRouter`].
///
/// Guards are capabilities: a model that implements [`BeforeInsert`] returns `Some(self)`
/// from [`Model::insert_guard`], and so on.
pub trait Model: Send + Sync + Sized + 'static {
    /// Wrap a freshly fetched or created record.
    fn wrap(record: Record) -> Result<Self, AppError>;

    fn id(&self) -> String;

    /// Current in-memory record, as persisted by [`ModelAdapter::save`].
    fn to_record(&self) -> Record;

    /// Ordered field table. Called once per router.
    fn fields() -> Vec<Field<Self>>;

    fn tasks(&mut self) -> Option<&mut TaskQueue> {
        None
    }

    fn insert_guard(&self) -> Option<&dyn BeforeInsert> {
        None
    }

    fn delete_guard(&self) -> Option<&dyn BeforeDelete> {
        None
    }

    fn modify_guard(&self) -> Option<&dyn BeforeModify> {
        None
    }
}

/// Per-request wrapper around one model instance.
pub struct ModelAdapter<M: Model> {
    model: M,
    fields: FieldTable<M>,
    repo: Arc<dyn Repository>,
}

impl<M: Model> ModelAdapter<M> {
    pub fn new(record: Record, fields: FieldTable<M>, repo: Arc<dyn Repository>) -> Result<Self, AppError> {
        Ok(ModelAdapter {
            model: M::wrap(record)?,
            fields,
            repo,
        })
    }

    pub fn id(&self) -> String {
        self.model.id()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    async fn settle(&mut self) -> Result<(), AppError> {
        match self.model.tasks() {
            Some(tasks) => tasks.drain().await,
            None => Ok(()),
        }
    }

    /// Projection of every non-hidden field, in declaration order. Each getter is awaited in turn.
    pub async fn to_json_object(&mut self) -> Result<Map<String, Value>, AppError> {
        self.settle().await?;
        let mut out = Map::new();
        for field in self.fields.iter().filter(|f| !f.hidden) {
            let v = (field.get)(&self.model).await?;
            out.insert(field.name.to_string(), v);
        }
        Ok(out)
    }

    /// Assign every writable field named in `input`. Returns `false` when the modify guard vetoed.
    pub async fn apply(&mut self, input: &Map<String, Value>) -> Result<bool, AppError> {
        self.settle().await?;
        if let Some(guard) = self.model.modify_guard() {
            if !guard.before_modify().await? {
                tracing::debug!(target: "api_kit::model", id = %self.model.id(), "modification vetoed");
                return Ok(false);
            }
        }
        let violations = validation::validate_present(&self.fields, input);
        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }
        for field in self.fields.iter() {
            let (Some(set), Some(v)) = (&field.set, input.get(field.name)) else { continue };
            set(&mut self.model, v.clone())?;
        }
        Ok(true)
    }

    /// Upsert the current record by id.
    pub async fn save(&mut self) -> Result<Record, AppError> {
        self.settle().await?;
        Ok(self.repo.upsert(&self.model.to_record()).await?)
    }
}
