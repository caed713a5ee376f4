//! Generated resource routes, driven in-process with `oneshot`.

mod support;

use api_kit::middleware::trace_id;
use api_kit::store::Transaction;
use api_kit::{
    refine, route_middleware, AppError, Initializer, MemoryRepository, OrderBy, Record, Repository, RequestContext,
    TRACE_HEADER,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use support::{app, user, users_repo, users_router, User};
use tower::ServiceExt;

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

#[tokio::test]
async fn missing_record_is_404_with_its_id() {
    let app = app(&users_repo());
    let (status, _, body) = call(&app, Method::GET, "/users/nope-42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "Record with id nope-42 not found." }));
}

#[tokio::test]
async fn save_then_get_round_trip() {
    let repo = users_repo();
    let app = app(&repo);
    let (status, _, created) = call(
        &app,
        Method::POST,
        "/users",
        Some(json!({ "name": "Ada", "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["name"], "Ada");

    let (status, _, fetched) = call(&app, Method::GET, &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
    let keys: Vec<&str> = fetched.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name", "email", "shelfId", "locked"]);
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn upsert_with_existing_id_updates_in_place() {
    let repo = users_repo().with_records([user("u1", "Old")]);
    let app = app(&repo);
    let (status, _, body) = call(&app, Method::POST, "/users", Some(json!({ "id": "u1", "name": "New" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "New");
    let records = repo.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("name"), Some("New"));
}

#[tokio::test]
async fn unknown_id_in_body_creates_with_that_id() {
    let repo = users_repo();
    let app = app(&repo);
    let (status, _, body) = call(&app, Method::POST, "/users", Some(json!({ "id": "chosen", "name": "Bo" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "chosen");
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn before_insert_veto_creates_nothing() {
    let repo = users_repo();
    let app = app(&repo);
    let (status, _, body) = call(&app, Method::POST, "/users", Some(json!({ "name": "blocked" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["type"], "Error");
    assert_eq!(body["error"], "Failed to create record.");
    assert!(repo.is_empty());
}

#[tokio::test]
async fn before_delete_veto_keeps_the_record() {
    let mut locked: Record = user("u1", "Lock");
    locked.set("locked", json!(true));
    let repo = users_repo().with_records([locked, user("u2", "Free")]);
    let app = app(&repo);

    let (status, _, body) = call(&app, Method::DELETE, "/users/u1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to delete record.");
    assert_eq!(repo.len(), 2);

    let (status, _, body) = call(&app, Method::DELETE, "/users/u2", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, Value::Null);
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn guard_errors_abort_like_vetoes() {
    let repo = users_repo().with_records([user("u1", "explode")]);
    let app = app(&repo);

    let (status, _, body) = call(&app, Method::POST, "/users", Some(json!({ "name": "explode" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "insert guard failed");
    assert_eq!(repo.len(), 1);

    let (status, _, body) = call(&app, Method::DELETE, "/users/u1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "delete guard failed");
    assert_eq!(repo.len(), 1);
}

/// Files new users on the shelf named by the path; stages a side record first and fails for `name: "fail"`.
struct ShelfAssigner;

#[async_trait]
impl Initializer for ShelfAssigner {
    async fn initialize(
        &self,
        ctx: &RequestContext,
        tx: &mut dyn Transaction,
        body: &Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        let side = json!({ "id": "side", "name": "side" }).as_object().cloned().unwrap_or_default();
        tx.create(side).await?;
        if body.get("name") == Some(&json!("fail")) {
            return Err(AppError::http(StatusCode::CONFLICT, "shelf is full"));
        }
        let shelf = ctx.params.get("shelfId").cloned().unwrap_or_default();
        let mut out = Map::new();
        out.insert("shelfId".into(), json!(shelf));
        Ok(out)
    }
}

#[tokio::test]
async fn initializer_overrides_body_and_rolls_back_on_error() {
    let repo = users_repo();
    let users = api_kit::ApiRouter::<User>::new("users", Arc::new(repo.clone()))
        .get_one(&[])
        .update(Some(Arc::new(ShelfAssigner)), &[])
        .build();
    let app = Router::new().nest("/shelves/:shelfId/users", users);

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/shelves/s9/users",
        Some(json!({ "id": "u1", "name": "Ann", "shelfId": "from-body" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shelfId"], "s9");
    let stored = repo.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(stored.get_str("shelfId"), Some("s9"));
    assert_eq!(repo.len(), 2);

    let repo = users_repo();
    let users = api_kit::ApiRouter::<User>::new("users", Arc::new(repo.clone()))
        .update(Some(Arc::new(ShelfAssigner)), &[])
        .build();
    let app = Router::new().nest("/shelves/:shelfId/users", users);
    let (status, _, body) = call(&app, Method::POST, "/shelves/s9/users", Some(json!({ "name": "fail" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "shelf is full");
    assert!(repo.is_empty());
}

#[tokio::test]
async fn deleting_a_missing_record_is_404() {
    let app = app(&users_repo());
    let (status, _, body) = call(&app, Method::DELETE, "/users/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "HttpError");
    assert_eq!(body["error"], "Record with id ghost not found.");
}

#[tokio::test]
async fn duplicate_email_is_a_validation_error_on_email() {
    let mut existing = user("u1", "Ann");
    existing.set("email", json!("ann@example.com"));
    let repo = users_repo().with_records([existing]);
    let app = app(&repo);
    let (status, _, body) = call(
        &app,
        Method::POST,
        "/users",
        Some(json!({ "name": "Other", "email": "ann@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
    assert_eq!(body["data"][0]["path"], "email");
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn field_rules_reject_bad_input() {
    let repo = users_repo();
    let app = app(&repo);
    let (status, _, body) = call(&app, Method::POST, "/users", Some(json!({ "email": "nope" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
    let paths: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["name", "email"]);
    assert!(repo.is_empty());
}

#[tokio::test]
async fn malformed_and_non_object_bodies_are_rejected() {
    let app = app(&users_repo());
    let req = Request::builder()
        .method(Method::POST)
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (status, _, body) = call(&app, Method::POST, "/users", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
}

#[tokio::test]
async fn trace_id_is_echoed_in_header_and_error_body() {
    let app = app(&users_repo());
    let (_, headers, _) = call(&app, Method::GET, "/users/x", None).await;
    assert!(headers.contains_key(&TRACE_HEADER));

    let (_, headers, body) = call(&app, Method::DELETE, "/users/x", None).await;
    let header = headers.get(&TRACE_HEADER).unwrap().to_str().unwrap();
    assert_eq!(body["traceId"], header);
}

fn numbered(n: usize) -> Vec<Record> {
    (0..n).map(|i| user(&format!("u{i}"), &format!("user-{i:03}"))).collect()
}

#[tokio::test]
async fn collection_pages_by_hundred() {
    let repo = users_repo().with_records(numbered(150));
    let app = app(&repo);

    let (_, _, page1) = call(&app, Method::GET, "/users?page=1", None).await;
    assert_eq!(page1["total"], 150);
    assert_eq!(page1["data"].as_array().unwrap().len(), 100);
    assert_eq!(page1["data"][0]["name"], "user-000");

    let (_, _, page2) = call(&app, Method::GET, "/users?page=2", None).await;
    assert_eq!(page2["data"].as_array().unwrap().len(), 50);
    assert_eq!(page2["data"][0]["name"], "user-100");

    for unpaged in ["/users", "/users?page=abc", "/users?page=0"] {
        let (_, _, all) = call(&app, Method::GET, unpaged, None).await;
        assert_eq!(all["data"].as_array().unwrap().len(), 150, "{unpaged}");
    }
}

#[tokio::test]
async fn ordering_and_refinement_apply() {
    let repo = users_repo().with_records([user("a", "Cy"), user("b", "Al"), user("c", "Bo")]);
    let refined = api_kit::ApiRouter::<User>::new("users", Arc::new(repo.clone()))
        .get_many(
            vec![OrderBy::desc("name")],
            Some(refine(|ctx: &RequestContext, filter| match ctx.query.get("name") {
                Some(name) => filter.eq("name", name.clone()),
                None => filter,
            })),
            &[],
        )
        .build();
    let app = Router::new().nest("/users", refined);

    let (_, _, all) = call(&app, Method::GET, "/users", None).await;
    let names: Vec<&str> = all["data"].as_array().unwrap().iter().map(|u| u["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Cy", "Bo", "Al"]);

    let (_, _, one) = call(&app, Method::GET, "/users?name=Bo", None).await;
    assert_eq!(one["total"], 1);
    assert_eq!(one["data"][0]["id"], "c");
}

#[tokio::test]
async fn parent_path_parameters_filter_nested_collections() {
    let mut records = Vec::new();
    for (id, shelf) in [("b1", "s1"), ("b2", "s2"), ("b3", "s1")] {
        let mut r = user(id, id);
        r.set("shelfId", json!(shelf));
        records.push(r);
    }
    let repo = users_repo().with_records(records);
    let app = Router::new().nest("/shelves/:shelfId/books", users_router(&repo).build());

    let (status, _, body) = call(&app, Method::GET, "/shelves/s1/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let (_, _, one) = call(&app, Method::GET, "/shelves/s2/books/b2", None).await;
    assert_eq!(one["id"], "b2");
}

async fn require_token(req: axum::extract::Request, next: Next) -> axum::response::Response {
    if req.headers().contains_key(header::AUTHORIZATION) {
        next.run(req).await
    } else {
        AppError::http(StatusCode::UNAUTHORIZED, "missing token").into_response()
    }
}

#[tokio::test]
async fn authed_guards_every_operation_and_sub_route() {
    let repo = users_repo().with_records([user("u1", "Ann")]);
    let stats = Router::new().route("/", get(|| async { "stats" }));
    let users = users_router(&repo)
        .sub_route("/stats", stats)
        .authed(route_middleware(require_token))
        .build();
    let app = Router::new().nest("/users", users).layer(from_fn(trace_id));

    for (method, uri) in [
        (Method::GET, "/users"),
        (Method::GET, "/users/u1"),
        (Method::DELETE, "/users/u1"),
        (Method::GET, "/users/stats"),
    ] {
        let (status, _, body) = call(&app, method.clone(), uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["type"], "HttpError");
    }

    let req = Request::builder()
        .uri("/users/stats")
        .header(header::AUTHORIZATION, "Bearer t")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn per_operation_middleware_only_wraps_its_operation() {
    let repo = users_repo().with_records([user("u1", "Ann")]);
    let users = api_kit::ApiRouter::<User>::new("users", Arc::new(repo.clone()))
        .get_one(&[])
        .delete(&[route_middleware(require_token)])
        .build();
    let app = Router::new().nest("/users", users);

    let (status, _, _) = call(&app, Method::GET, "/users/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = call(&app, Method::DELETE, "/users/u1", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn unmounted_operations_are_not_routed() {
    let repo: MemoryRepository = users_repo();
    let users = api_kit::ApiRouter::<User>::new("users", Arc::new(repo)).get_one(&[]).build();
    let app = Router::new().nest("/users", users);
    let (status, _, _) = call(&app, Method::DELETE, "/users/u1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
