//! Request-scoped trace ids, request logging, and CORS.

use crate::config::ServerConfig;
use crate::extractors::TraceId;
use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::Router;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::Instrument;

/// Response header carrying the trace id (`ApiTraceId`; header names are case-insensitive).
pub static TRACE_HEADER: HeaderName = HeaderName::from_static("apitraceid");

tokio::task_local! {
    static TRACE_ID: String;
}

/// Trace id of the request being handled on this task, if any.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(Clone::clone).ok()
}

/// Assign a fresh trace id: request extension, tracing span, task-local and response header.
pub async fn trace_id(mut req: Request, next: Next) -> Response {
    let id = uuid::Uuid::new_v4().to_string();
    req.extensions_mut().insert(TraceId(id.clone()));
    let span = tracing::info_span!("request", trace_id = %id);
    let mut response = TRACE_ID
        .scope(id.clone(), next.run(req).instrument(span))
        .await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(TRACE_HEADER.clone(), val);
    }
    response
}

/// One debug line per request once the response is ready.
pub async fn http_logger(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    tracing::debug!(
        target: "api_kit::http",
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "{} {} {} {}ms",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

/// CORS allowing the trace header in both directions. Empty `origins` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, TRACE_HEADER.clone()])
        .expose_headers([TRACE_HEADER.clone()])
}

/// Wrap an application router with body limit, request logging, trace ids and CORS (outermost).
pub fn with_api_layers(router: Router, config: &ServerConfig) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(config.body_limit))
        .layer(from_fn(http_logger))
        .layer(from_fn(trace_id))
        .layer(cors_layer(&config.cors_origins))
}
