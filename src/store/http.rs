//! HTTP client for a remote durable store endpoint.
//!
//! Speaks a small JSON protocol: `POST {base}/api/{insert|patch|get|query}`
//! with the operation's fields in the body. The worker uses one instance
//! against the cloud store (`CONVEX_URL`) and one against the
//! session-local store (`LOCAL_CONVEX_URL`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StoreError;

use super::{DurableStore, QuerySpec};

/// Remote [`DurableStore`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct InsertResponse {
    id: String,
}

#[derive(Deserialize)]
struct GetResponse {
    record: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    records: Vec<Value>,
}

impl HttpStore {
    /// Create a client for the store at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// The configured endpoint base.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/api/{}", self.base_url, op)
    }

    async fn post(&self, op: &str, body: Value) -> Result<Value, StoreError> {
        let response = self.client.post(self.endpoint(op)).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(text));
        }
        if !status.is_success() {
            return Err(StoreError::Backend {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DurableStore for HttpStore {
    async fn insert(&self, table: &str, record: Value) -> Result<String, StoreError> {
        let body = json!({ "table": table, "record": record });
        let response: InsertResponse = serde_json::from_value(self.post("insert", body).await?)?;
        Ok(response.id)
    }

    async fn patch(&self, id: &str, partial: Value) -> Result<(), StoreError> {
        self.post("patch", json!({ "id": id, "patch": partial })).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let response: GetResponse =
            serde_json::from_value(self.post("get", json!({ "id": id })).await?)?;
        Ok(response.record)
    }

    async fn scan(&self, table: &str, spec: QuerySpec) -> Result<Vec<Value>, StoreError> {
        let body = json!({
            "table": table,
            "filters": spec.filters,
            "order": spec.order,
            "limit": spec.limit,
        });
        let response: QueryResponse = serde_json::from_value(self.post("query", body).await?)?;
        Ok(response.records)
    }
}
