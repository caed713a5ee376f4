//! Shared fixtures: a `User` model over an in-memory repository.

#![allow(dead_code)]

use api_kit::middleware::trace_id;
use api_kit::model::Format;
use api_kit::{
    AppError, ApiRouter, BeforeDelete, BeforeInsert, Field, MemoryRepository, Model, OrderBy, Record,
    ResourceSchema,
};
use async_trait::async_trait;
use axum::middleware::from_fn;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct User {
    rec: Record,
}

fn field(rec: &Record, name: &str) -> Value {
    rec.get(name).cloned().unwrap_or(Value::Null)
}

impl Model for User {
    fn wrap(rec: Record) -> Result<Self, AppError> {
        Ok(User { rec })
    }

    fn id(&self) -> String {
        self.rec.id()
    }

    fn to_record(&self) -> Record {
        self.rec.clone()
    }

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::value("id", |u: &User| json!(u.rec.id())),
            Field::value("name", |u: &User| field(&u.rec, "name"))
                .writable(|u, v| {
                    u.rec.set("name", v);
                    Ok(())
                })
                .rule(api_kit::ValidationRule::new().required().max_length(40)),
            Field::value("email", |u: &User| field(&u.rec, "email"))
                .writable(|u, v| {
                    u.rec.set("email", v);
                    Ok(())
                })
                .rule(api_kit::ValidationRule::new().format(Format::Email)),
            Field::value("shelfId", |u: &User| field(&u.rec, "shelfId")),
            Field::value("locked", |u: &User| json!(u.locked())),
        ]
    }

    fn insert_guard(&self) -> Option<&dyn BeforeInsert> {
        Some(self)
    }

    fn delete_guard(&self) -> Option<&dyn BeforeDelete> {
        Some(self)
    }
}

impl User {
    fn locked(&self) -> bool {
        self.rec.get("locked") == Some(&Value::Bool(true))
    }
}

#[async_trait]
impl BeforeInsert for User {
    async fn before_insert(&self) -> Result<bool, AppError> {
        match self.rec.get_str("name") {
            Some("explode") => Err(AppError::Internal("insert guard failed".into())),
            name => Ok(name != Some("blocked")),
        }
    }
}

#[async_trait]
impl BeforeDelete for User {
    async fn before_delete(&self) -> Result<bool, AppError> {
        if self.rec.get_str("name") == Some("explode") {
            return Err(AppError::Internal("delete guard failed".into()));
        }
        Ok(!self.locked())
    }
}

pub fn users_repo() -> MemoryRepository {
    MemoryRepository::new(
        ResourceSchema::new("users")
            .column("name")
            .column("email")
            .column("shelfId")
            .column("locked")
            .unique("email"),
    )
}

pub fn user(id: &str, name: &str) -> Record {
    serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
}

/// Every operation mounted, sorted by name.
pub fn users_router(repo: &MemoryRepository) -> ApiRouter<User> {
    ApiRouter::<User>::new("users", Arc::new(repo.clone()))
        .get_one(&[])
        .get_many(vec![OrderBy::asc("name")], None, &[])
        .update(None, &[])
        .delete(&[])
}

/// `/users` with trace ids, as a server would mount it.
pub fn app(repo: &MemoryRepository) -> Router {
    Router::new()
        .nest("/users", users_router(repo).build())
        .layer(from_fn(trace_id))
}
