//! Response bodies shared by the resource handlers.

use crate::paging::PageResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

/// `404 {message}` for a missing record.
pub fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(MessageBody {
            message: format!("Record with id {} not found.", id),
        }),
    )
        .into_response()
}

pub fn projection(obj: Map<String, Value>) -> Response {
    (StatusCode::OK, Json(obj)).into_response()
}

pub fn page(data: Vec<Map<String, Value>>, total: u64) -> Response {
    (StatusCode::OK, Json(PageResponse { data, total })).into_response()
}

/// Successful delete: 201 with an empty body.
pub fn deleted() -> Response {
    StatusCode::CREATED.into_response()
}
