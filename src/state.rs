//! Per-resource state shared by the generated handlers.

use crate::error::AppError;
use crate::model::{FieldTable, Model, ModelAdapter};
use crate::store::{Filter, OrderBy, Record, Repository, Transaction};
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What a refinement or initializer may inspect about the request.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Path parameters, including those captured by parent routers.
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

/// Caller refinement of the collection filter.
pub type FilterFn = Arc<dyn Fn(&RequestContext, Filter) -> Filter + Send + Sync>;

/// Augments the creation payload inside the creation transaction.
/// Returned keys override keys of the request body.
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn initialize(
        &self,
        ctx: &RequestContext,
        tx: &mut dyn Transaction,
        body: &Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError>;
}

pub struct ResourceState<M: Model> {
    pub name: Arc<str>,
    pub repo: Arc<dyn Repository>,
    pub fields: FieldTable<M>,
    pub order: Arc<Vec<OrderBy>>,
    pub refine: Option<FilterFn>,
    pub initializer: Option<Arc<dyn Initializer>>,
}

impl<M: Model> Clone for ResourceState<M> {
    fn clone(&self) -> Self {
        ResourceState {
            name: self.name.clone(),
            repo: self.repo.clone(),
            fields: self.fields.clone(),
            order: self.order.clone(),
            refine: self.refine.clone(),
            initializer: self.initializer.clone(),
        }
    }
}

impl<M: Model> ResourceState<M> {
    pub fn new(name: &str, repo: Arc<dyn Repository>) -> Self {
        ResourceState {
            name: Arc::from(name),
            repo,
            fields: Arc::new(M::fields()),
            order: Arc::new(Vec::new()),
            refine: None,
            initializer: None,
        }
    }

    /// Fresh adapter over `record`. Adapters live for one request.
    pub fn adapter(&self, record: Record) -> Result<ModelAdapter<M>, AppError> {
        ModelAdapter::new(record, self.fields.clone(), self.repo.clone())
    }
}
