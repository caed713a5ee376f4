//! Generic resource handlers: get one, get many, upsert, delete.

use crate::error::AppError;
use crate::model::{validation, Model, ModelAdapter};
use crate::paging::{PageDescriptor, PAGE_PARAM};
use crate::response;
use crate::state::{RequestContext, ResourceState};
use crate::store::ID_FIELD;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

type Params = Option<Path<HashMap<String, String>>>;

fn params_of(params: Params) -> HashMap<String, String> {
    params.map(|Path(p)| p).unwrap_or_default()
}

fn id_param(params: &HashMap<String, String>) -> Result<String, AppError> {
    params
        .get(ID_FIELD)
        .cloned()
        .ok_or_else(|| AppError::Internal("route has no :id parameter".into()))
}

fn body_object(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    let Json(body) = body?;
    match body {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadJson("request body must be a JSON object".into())),
    }
}

pub async fn get_one<M: Model>(
    State(state): State<ResourceState<M>>,
    params: Params,
) -> Result<Response, AppError> {
    let id = id_param(&params_of(params))?;
    let Some(record) = state.repo.find_by_id(&id).await? else {
        tracing::debug!(target: "api_kit::router", resource = %state.name, %id, "record not found");
        return Ok(response::not_found(&id));
    };
    let mut adapter = state.adapter(record)?;
    Ok(response::projection(adapter.to_json_object().await?))
}

pub async fn get_many<M: Model>(
    State(state): State<ResourceState<M>>,
    params: Params,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let page = PageDescriptor::from_query(query.get(PAGE_PARAM).map(String::as_str));
    let ctx = RequestContext {
        params: params_of(params),
        query,
        headers,
    };
    let mut filter = state.repo.schema().filter_from_params(&ctx.params);
    if let Some(refine) = &state.refine {
        filter = refine(&ctx, filter);
    }
    let (records, total) = tokio::try_join!(
        state.repo.find_page(&filter, &state.order, page),
        state.repo.count(&filter),
    )?;
    tracing::debug!(
        target: "api_kit::router",
        resource = %state.name,
        returned = records.len(),
        total,
        "collection query"
    );
    let mut data = Vec::with_capacity(records.len());
    for record in records {
        data.push(state.adapter(record)?.to_json_object().await?);
    }
    Ok(response::page(data, total))
}

/// Create a record inside one transaction: initializer, field validation, insert, before-insert guard.
/// Any failure or veto rolls the transaction back.
async fn create<M: Model>(
    state: &ResourceState<M>,
    ctx: &RequestContext,
    body: &Map<String, Value>,
) -> Result<ModelAdapter<M>, AppError> {
    let mut tx = state.repo.begin().await?;
    let staged = async {
        let mut data = body.clone();
        if let Some(init) = &state.initializer {
            data.extend(init.initialize(ctx, tx.as_mut(), body).await?);
        }
        let mut violations = validation::validate_required(&state.fields, &data);
        for v in validation::validate_present(&state.fields, &data) {
            if !violations.contains(&v) {
                violations.push(v);
            }
        }
        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }
        let record = tx.create(data).await?;
        let adapter = state.adapter(record)?;
        if let Some(guard) = adapter.model().insert_guard() {
            if !guard.before_insert().await? {
                return Err(AppError::Aborted("Failed to create record.".into()));
            }
        }
        Ok(adapter)
    }
    .await;
    match staged {
        Ok(adapter) => {
            tx.commit().await?;
            tracing::info!(target: "api_kit::router", resource = %state.name, id = %adapter.id(), "record created");
            Ok(adapter)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!(target: "api_kit::router", resource = %state.name, error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

pub async fn upsert<M: Model>(
    State(state): State<ResourceState<M>>,
    params: Params,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = body_object(body)?;
    let existing = match body.get(ID_FIELD).and_then(Value::as_str) {
        Some(id) if !id.is_empty() => state.repo.find_by_id(id).await?,
        _ => None,
    };
    let mut adapter = match existing {
        Some(record) => state.adapter(record)?,
        None => {
            let ctx = RequestContext {
                params: params_of(params),
                query,
                headers,
            };
            create(&state, &ctx, &body).await?
        }
    };
    if !adapter.apply(&body).await? {
        tracing::debug!(target: "api_kit::router", resource = %state.name, id = %adapter.id(), "update skipped by guard");
    }
    adapter.save().await?;
    Ok(response::projection(adapter.to_json_object().await?))
}

pub async fn delete<M: Model>(
    State(state): State<ResourceState<M>>,
    params: Params,
) -> Result<Response, AppError> {
    let id = id_param(&params_of(params))?;
    let record = state
        .repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(&id))?;
    let adapter = state.adapter(record)?;
    if let Some(guard) = adapter.model().delete_guard() {
        if !guard.before_delete().await? {
            return Err(AppError::Aborted("Failed to delete record.".into()));
        }
    }
    state.repo.delete(&id).await?;
    tracing::info!(target: "api_kit::router", resource = %state.name, %id, "record deleted");
    Ok(response::deleted())
}
