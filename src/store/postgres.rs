//! PostgreSQL repository: parameterized SQL from the resource schema, rows decoded as JSONB.

use super::{
    generate_id, Filter, OrderBy, Record, Repository, ResourceSchema, StoreError, Transaction,
    ID_FIELD,
};
use crate::paging::PageDescriptor;
use crate::sql::{self, scalar_query, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgDatabaseError;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

/// Repository over one table. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
    schema: Arc<ResourceSchema>,
}

impl PgRepository {
    pub fn new(pool: PgPool, schema: ResourceSchema) -> Self {
        PgRepository {
            pool,
            schema: Arc::new(schema),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn into_record(v: Value) -> Record {
    match v {
        Value::Object(m) => Record::new(m),
        _ => Record::default(),
    }
}

async fn fetch_optional_json<'c, E>(executor: E, q: &QueryBuf) -> Result<Option<Value>, StoreError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(target: "api_kit::store", sql = %q.sql, params = ?q.params, "query");
    Ok(scalar_query::<Value>(q).fetch_optional(executor).await?)
}

/// Whether ids may be generated client-side for this primary key.
fn generates_ids(schema: &ResourceSchema) -> bool {
    match schema
        .column_info(&schema.primary_key)
        .and_then(|c| c.pg_type.as_deref())
    {
        None => true,
        Some(t) => matches!(t.to_lowercase().as_str(), "uuid" | "text" | "varchar"),
    }
}

#[async_trait]
impl Repository for PgRepository {
    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let q = sql::select_by_id(&self.schema, id);
        Ok(fetch_optional_json(&self.pool, &q).await?.map(into_record))
    }

    async fn find_page(
        &self,
        filter: &Filter,
        order: &[OrderBy],
        page: Option<PageDescriptor>,
    ) -> Result<Vec<Record>, StoreError> {
        let q = sql::select_page(&self.schema, filter, order, page);
        tracing::debug!(target: "api_kit::store", sql = %q.sql, params = ?q.params, "query");
        let rows = scalar_query::<Value>(&q).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let q = sql::count(&self.schema, filter);
        tracing::debug!(target: "api_kit::store", sql = %q.sql, params = ?q.params, "query");
        let n = scalar_query::<i64>(&q).fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn upsert(&self, record: &Record) -> Result<Record, StoreError> {
        if record.id().is_empty() {
            return Err(StoreError::InvalidId {
                target: vec![ID_FIELD.into()],
            });
        }
        let q = sql::upsert(&self.schema, record.fields());
        let row = fetch_optional_json(&self.pool, &q)
            .await?
            .ok_or_else(|| StoreError::NotFound(record.id()))?;
        Ok(into_record(row))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let q = sql::delete(&self.schema, id);
        tracing::debug!(target: "api_kit::store", sql = %q.sql, params = ?q.params, "query");
        scalar_query::<String>(&q)
            .fetch_optional(&self.pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction {
            tx,
            schema: self.schema.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    schema: Arc<ResourceSchema>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Record>, StoreError> {
        let q = sql::select_by_id(&self.schema, id);
        Ok(fetch_optional_json(&mut *self.tx, &q).await?.map(into_record))
    }

    async fn create(&mut self, mut data: Map<String, Value>) -> Result<Record, StoreError> {
        let pk = self.schema.primary_key.clone();
        if !data.contains_key(&pk) && generates_ids(&self.schema) {
            data.insert(pk, Value::String(generate_id()));
        }
        let q = sql::insert(&self.schema, &data);
        let row = fetch_optional_json(&mut *self.tx, &q)
            .await?
            .ok_or_else(|| StoreError::Other {
                code: None,
                message: "insert returned no row".into(),
            })?;
        Ok(into_record(row))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx, .. } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx, .. } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

/// Columns named in a Postgres key detail such as `Key (email, org)=(a, b) already exists.`
fn key_columns_from_detail(detail: &str) -> Vec<String> {
    detail
        .strip_prefix("Key (")
        .and_then(|rest| rest.split_once(")="))
        .map(|(cols, _)| cols.split(',').map(|c| c.trim().to_string()).collect())
        .unwrap_or_default()
}

/// Value named in a Postgres cast error such as `invalid input syntax for type uuid: "abc"`.
fn quoted_value(message: &str) -> String {
    message
        .split_once(": ")
        .map(|(_, v)| v.trim_matches('"').to_string())
        .unwrap_or_default()
}

fn from_database_error(db: &dyn sqlx::error::DatabaseError) -> StoreError {
    let code = db.code().map(|c| c.into_owned());
    let pg = db.try_downcast_ref::<PgDatabaseError>();
    let detail = pg.and_then(|e| e.detail()).unwrap_or_default();
    let column = pg.and_then(|e| e.column()).map(str::to_string);
    let table = db.table().unwrap_or_default().to_string();
    let mut target = key_columns_from_detail(detail);
    if target.is_empty() {
        target.extend(column.clone().or_else(|| db.constraint().map(str::to_string)));
    }
    match code.as_deref() {
        Some("23505") => StoreError::UniqueViolation { target },
        Some("23503") => StoreError::RelationExists {
            model: table,
            field: db
                .constraint()
                .map(str::to_string)
                .or(column)
                .unwrap_or_default(),
            target,
        },
        Some("22P02") if db.message().contains("uuid") => StoreError::InvalidId { target },
        Some("22P02" | "22003" | "22007" | "22008") => StoreError::InvalidValue {
            model: table,
            field: column.unwrap_or_default(),
            value: quoted_value(db.message()),
            target,
        },
        _ => StoreError::Other {
            code,
            message: db.message().to_string(),
        },
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StoreError::ConnectionTimeout,
            sqlx::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
                StoreError::ConnectionTimeout
            }
            sqlx::Error::Database(ref db) => from_database_error(db.as_ref()),
            other => StoreError::Other {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_columns_are_parsed_from_detail() {
        assert_eq!(
            key_columns_from_detail("Key (email)=(a@b.c) already exists."),
            vec!["email".to_string()]
        );
        assert_eq!(
            key_columns_from_detail("Key (org_id, slug)=(1, x) already exists."),
            vec!["org_id".to_string(), "slug".to_string()]
        );
        assert!(key_columns_from_detail("something else").is_empty());
    }

    #[test]
    fn cast_error_value() {
        assert_eq!(
            quoted_value("invalid input syntax for type uuid: \"abc\""),
            "abc"
        );
    }

    #[test]
    fn pool_timeout_is_a_connection_timeout() {
        assert_eq!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::ConnectionTimeout
        );
    }

    #[test]
    fn generated_ids_only_for_textual_keys() {
        assert!(generates_ids(&ResourceSchema::new("a")));
        assert!(generates_ids(&ResourceSchema::new("a").typed_column("id", "uuid")));
        assert!(!generates_ids(&ResourceSchema::new("a").typed_column("id", "bigint")));
    }
}
