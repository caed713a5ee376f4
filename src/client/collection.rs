//! One remote collection: a shared record list plus fetch-all, save, validate and delete.

use super::lock::Acquired;
use super::{parse_url, ApiClient, ClientError};
use crate::paging::{PageResponse, PAGE_PARAM};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// A record with a string id.
pub trait Identified {
    fn id(&self) -> String;
}

/// Converts one JSON record into `T`.
pub type Mapper<T> = Arc<dyn Fn(Value) -> Result<T, ClientError> + Send + Sync>;

/// Shared, subscribable record list. Every change publishes a new snapshot.
pub struct RecordStore<T> {
    tx: Arc<watch::Sender<Arc<Vec<T>>>>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        RecordStore { tx: self.tx.clone() }
    }
}

impl<T> Default for RecordStore<T> {
    fn default() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        RecordStore { tx: Arc::new(tx) }
    }
}

impl<T> RecordStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.tx.subscribe()
    }

    pub fn replace(&self, records: Vec<T>) {
        self.tx.send_replace(Arc::new(records));
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> RecordStore<T> {
    pub fn append(&self, more: Vec<T>) {
        self.tx.send_modify(|list| Arc::make_mut(list).extend(more));
    }
}

/// Set `page=N`, keeping every other query pair.
fn with_page(url: &Url, page: u64) -> Url {
    let mut url = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != PAGE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(PAGE_PARAM, &page.to_string());
    url
}

/// `url/<id>` without the collection's query.
fn item_url(url: &Url, id: &str) -> Result<Url, ClientError> {
    let mut url = url.clone();
    url.set_query(None);
    let shown = url.to_string();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl(shown))?
        .pop_if_empty()
        .push(id);
    Ok(url)
}

pub struct Collection<T> {
    client: ApiClient,
    url: Url,
    records: RecordStore<T>,
    mapper: Mapper<T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Collection {
            client: self.client.clone(),
            url: self.url.clone(),
            records: self.records.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

impl<T> Collection<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Collection at `url`, decoding records with serde.
    pub fn new(client: ApiClient, url: &str) -> Result<Self, ClientError> {
        Ok(Collection {
            client,
            url: parse_url(url)?,
            records: RecordStore::new(),
            mapper: Arc::new(|v: Value| -> Result<T, ClientError> { Ok(serde_json::from_value(v)?) }),
        })
    }
}

impl<T> Collection<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn with_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Value) -> Result<T, ClientError> + Send + Sync + 'static,
    {
        self.mapper = Arc::new(mapper);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn records(&self) -> &RecordStore<T> {
        &self.records
    }

    /// Load every page into the record list.
    ///
    /// While a fetch of this URL is in flight, no request is issued: the call waits for it and
    /// returns the shared list. `Ok(None)` when a page came back non-success.
    pub async fn fetch_all(&self) -> Result<Option<Arc<Vec<T>>>, ClientError> {
        let lease = match self.client.registry().acquire(self.url.as_str()) {
            Acquired::Follower(waiter) => {
                if !waiter.wait().await {
                    tracing::debug!(target: "api_kit::client", url = %self.url, "leading fetch vanished");
                }
                return Ok(Some(self.records.snapshot()));
            }
            Acquired::Leader(lease) => lease,
        };
        let result = self.page_through().await;
        drop(lease);
        result
    }

    async fn page_through(&self) -> Result<Option<Arc<Vec<T>>>, ClientError> {
        let Some(first) = self.fetch_page(1).await? else {
            return Ok(None);
        };
        let total = first.total;
        self.records.replace(first.data);
        let mut page = 2;
        while (self.records.len() as u64) < total {
            let Some(next) = self.fetch_page(page).await? else {
                return Ok(None);
            };
            if next.data.is_empty() {
                break;
            }
            self.records.append(next.data);
            page += 1;
        }
        tracing::debug!(target: "api_kit::client", url = %self.url, pages = page - 1, total, "fetched all records");
        Ok(Some(self.records.snapshot()))
    }

    async fn fetch_page(&self, page: u64) -> Result<Option<PageResponse<T>>, ClientError> {
        let resp = self.client.get(with_page(&self.url, page)).await?;
        if !resp.status().is_success() {
            self.client.handle_error_response(resp, "Failed to fetch records").await;
            return Ok(None);
        }
        let body: PageResponse<Value> = resp.json().await?;
        let data = body
            .data
            .into_iter()
            .map(|v| (self.mapper)(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(PageResponse {
            data,
            total: body.total,
        }))
    }

    /// Reload after a write. Failures are logged; the write already succeeded.
    async fn refresh(&self) {
        if let Err(e) = self.fetch_all().await {
            tracing::warn!(target: "api_kit::client", url = %self.url, error = %e, "refresh failed");
        }
    }

    async fn post_record<B: Serialize + ?Sized>(&self, body: &B, context: &str) -> Result<Option<T>, ClientError> {
        let resp = self.client.post_json(self.url.clone(), body).await?;
        if !resp.status().is_success() {
            self.client.handle_error_response(resp, context).await;
            return Ok(None);
        }
        let saved: Value = resp.json().await?;
        self.refresh().await;
        Ok(Some((self.mapper)(saved)?))
    }

    /// POST a partial record (with `id` to update). Refreshes the list on success.
    pub async fn save<B: Serialize + ?Sized>(&self, record: &B) -> Result<Option<T>, ClientError> {
        self.post_record(record, "Failed to save record").await
    }

    /// GET `url/<id>`.
    pub async fn fetch_one(&self, id: &str) -> Result<Option<T>, ClientError> {
        let resp = self.client.get(item_url(&self.url, id)?).await?;
        if !resp.status().is_success() {
            self.client.handle_error_response(resp, "Failed to fetch record").await;
            return Ok(None);
        }
        let v: Value = resp.json().await?;
        Ok(Some((self.mapper)(v)?))
    }
}

impl<T> Collection<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    /// POST `{id, <key>: value}` so the server validates and stores one field.
    pub async fn validate(&self, record: &T, key: &str, value: Value) -> Result<Option<T>, ClientError> {
        let mut body = Map::new();
        body.insert("id".into(), Value::String(record.id()));
        body.insert(key.to_string(), value);
        self.post_record(&body, "Failed to validate record").await
    }

    /// DELETE `url/<id>`. Refreshes the list on success; returns whether the server accepted it.
    pub async fn delete(&self, record: &T) -> Result<bool, ClientError> {
        let resp = self.client.delete(item_url(&self.url, &record.id())?).await?;
        if !resp.status().is_success() {
            self.client.handle_error_response(resp, "Failed to delete record").await;
            return Ok(false);
        }
        self.refresh().await;
        Ok(true)
    }
}
