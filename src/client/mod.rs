//! HTTP client helpers for resources mounted by [`crate::ApiRouter`].
//!
//! Non-success responses never surface as errors: they are read as text, offered to the
//! [`ErrorResponseHook`], and otherwise sent as a warning notification. `Err` is reserved for
//! transport and decoding failures.

mod collection;
pub mod lock;

pub use collection::{Collection, Identified, Mapper, RecordStore};
pub use lock::{Acquired, FetchLease, FetchRegistry, FetchWaiter};

use crate::notify::{NotificationType, Notifier};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Headers added to every request, e.g. a bearer token.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn headers(&self) -> HeaderMap;
}

/// Sees every non-success response first. Returning `true` claims it and suppresses the notification.
#[async_trait]
pub trait ErrorResponseHook: Send + Sync {
    async fn handle(&self, status: StatusCode, body: &str) -> bool;
}

/// Shared client state. Clones share the notifier and the fetch registry.
#[derive(Clone, Default)]
pub struct ApiClient {
    http: reqwest::Client,
    headers: Option<Arc<dyn HeaderProvider>>,
    on_error: Option<Arc<dyn ErrorResponseHook>>,
    notifier: Notifier,
    registry: FetchRegistry,
}

pub(crate) fn parse_url(url: &str) -> Result<Url, ClientError> {
    Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))
}

impl ApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    pub fn with_error_hook(mut self, hook: impl ErrorResponseHook + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn registry(&self) -> &FetchRegistry {
        &self.registry
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let req = match &self.headers {
            Some(provider) => req.headers(provider.headers().await),
            None => req,
        };
        Ok(req.send().await?)
    }

    pub(crate) async fn get(&self, url: Url) -> Result<Response, ClientError> {
        tracing::debug!(target: "api_kit::client", %url, "GET");
        self.send(self.http.get(url)).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Response, ClientError> {
        tracing::debug!(target: "api_kit::client", %url, "POST");
        self.send(self.http.post(url).json(body)).await
    }

    pub(crate) async fn delete(&self, url: Url) -> Result<Response, ClientError> {
        tracing::debug!(target: "api_kit::client", %url, "DELETE");
        self.send(self.http.delete(url)).await
    }

    /// Route a non-success response to the hook, or to a warning notification and the error log.
    pub async fn handle_error_response(&self, response: Response, context: &str) {
        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(target: "api_kit::client", error = %e, "could not read error body");
                String::new()
            }
        };
        if let Some(hook) = &self.on_error {
            if hook.handle(status, &text).await {
                return;
            }
        }
        self.notifier.send(NotificationType::Warning, text.as_str());
        tracing::error!(target: "api_kit::client", status = status.as_u16(), body = %text, "{}", context);
    }

    /// GET one JSON document. `Ok(None)` after a non-success response.
    pub async fn fetch_one<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, ClientError> {
        let resp = self.get(parse_url(url)?).await?;
        if !resp.status().is_success() {
            self.handle_error_response(resp, "Failed to fetch record").await;
            return Ok(None);
        }
        Ok(Some(resp.json().await?))
    }
}
