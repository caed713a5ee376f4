//! Typed errors and HTTP mapping.

use crate::model::Violation;
use crate::store::StoreError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{}", summarize(.0))]
    Validation(Vec<Violation>),
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("{0}")]
    BadJson(String),
    #[error("{0}")]
    Aborted(String),
    #[error("{0}")]
    Internal(String),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(id: &str) -> Self {
        AppError::Store(StoreError::NotFound(id.to_string()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadJson(rejection.body_text())
    }
}

/// Fixed HTTP shape of a storage failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub path: Option<String>,
}

const VALIDATION_ERROR: &str = "ValidationError";
const HTTP_ERROR: &str = "HttpError";
const GENERIC_ERROR: &str = "Error";

pub fn translate_store_error(err: &StoreError) -> KnownError {
    let message = err.to_string();
    let (status, kind, path) = match err {
        StoreError::ConnectionTimeout => (StatusCode::INTERNAL_SERVER_ERROR, HTTP_ERROR, None),
        StoreError::UniqueViolation { target }
        | StoreError::InvalidId { target }
        | StoreError::RelationExists { target, .. }
        | StoreError::InvalidValue { target, .. } => {
            (StatusCode::BAD_REQUEST, VALIDATION_ERROR, Some(target.join(".")))
        }
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, HTTP_ERROR, None),
        StoreError::Other { .. } => (StatusCode::INTERNAL_SERVER_ERROR, HTTP_ERROR, None),
    };
    KnownError {
        status,
        kind,
        message,
        path,
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub error: String,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(e) => translate_store_error(e).status,
            AppError::Validation(_) | AppError::BadJson(_) => StatusCode::BAD_REQUEST,
            AppError::Http { status, .. } => *status,
            AppError::Aborted(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope without the trace id. `production` withholds debug detail.
    pub fn envelope(&self, production: bool) -> ErrorEnvelope {
        let (kind, name, error, data) = match self {
            AppError::Store(e) => {
                let known = translate_store_error(e);
                let data = serde_json::json!([{ "message": known.message, "path": known.path }]);
                (known.kind, "StoreError", known.message, Some(data))
            }
            AppError::Validation(violations) => (
                VALIDATION_ERROR,
                VALIDATION_ERROR,
                self.to_string(),
                serde_json::to_value(violations).ok(),
            ),
            AppError::BadJson(msg) => (VALIDATION_ERROR, "JsonRejection", msg.clone(), None),
            AppError::Http { message, .. } => (HTTP_ERROR, HTTP_ERROR, message.clone(), None),
            AppError::Aborted(msg) | AppError::Internal(msg) => {
                let data = (!production).then(|| Value::String(format!("{self:?}")));
                (GENERIC_ERROR, GENERIC_ERROR, msg.clone(), data)
            }
        };
        ErrorEnvelope {
            kind,
            name,
            error,
            trace_id: None,
            data,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = self.envelope(crate::config::is_production());
        body.trace_id = crate::middleware::current_trace_id();
        if status.is_server_error() {
            tracing::error!(target: "api_kit::router", status = status.as_u16(), error = %body.error, "request failed");
        } else {
            tracing::debug!(target: "api_kit::router", status = status.as_u16(), error = %body.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
