//! Extract the trace id assigned by [`crate::middleware::trace_id`].

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Trace id of the current request. Empty when the trace middleware is not installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(pub String);

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TraceId>()
            .cloned()
            .unwrap_or_else(|| TraceId(String::new())))
    }
}
