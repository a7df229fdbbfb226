//! Durable store contract.
//!
//! Every component persists through this seam: the blackboard, the
//! task/plan store, tool telemetry, and the session manager's status
//! pushes. The store is an external collaborator; the crate ships an
//! in-memory implementation for tests and embedded use, and an HTTP
//! client for a remote endpoint.
//!
//! Records are JSON objects. The store stamps `_id` on insert and orders
//! scans by `_creationTime`.

pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Scan ordering over `_creationTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Oldest records first.
    #[default]
    Asc,
    /// Newest records first.
    Desc,
}

/// A fully described scan: equality filters, ordering, and an optional
/// row limit. Built through [`Query`], executed by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Top-level field equality filters, all of which must match.
    pub filters: Vec<(String, Value)>,
    /// Ordering over `_creationTime`.
    pub order: Order,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

/// The durable persistence collaborator.
///
/// Implementations must be safe to share across tasks behind an `Arc`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert a record into a table, returning its generated id.
    async fn insert(&self, table: &str, record: Value) -> Result<String, StoreError>;

    /// Shallow-merge `partial`'s top-level fields into the record with the
    /// given id. Unknown id yields [`StoreError::NotFound`].
    async fn patch(&self, id: &str, partial: Value) -> Result<(), StoreError>;

    /// Fetch a record by id, `None` if absent.
    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Execute a scan over one table.
    async fn scan(&self, table: &str, spec: QuerySpec) -> Result<Vec<Value>, StoreError>;
}

impl dyn DurableStore {
    /// Start a query against one table.
    pub fn query<'a>(&'a self, table: &str) -> Query<'a> {
        Query {
            store: self,
            table: table.to_string(),
            spec: QuerySpec::default(),
        }
    }
}

/// Builder for indexed scans: `store.query("agentTasks").eq("sessionId", sid).first()`.
pub struct Query<'a> {
    store: &'a dyn DurableStore,
    table: String,
    spec: QuerySpec,
}

impl<'a> Query<'a> {
    /// Require a top-level field to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.spec.filters.push((field.into(), value.into()));
        self
    }

    /// Set the scan ordering.
    pub fn order(mut self, order: Order) -> Self {
        self.spec.order = order;
        self
    }

    /// Limit the number of returned records.
    pub fn take(mut self, n: usize) -> Self {
        self.spec.limit = Some(n);
        self
    }

    /// Execute the scan and return all matching records.
    pub async fn collect(self) -> Result<Vec<Value>, StoreError> {
        self.store.scan(&self.table, self.spec).await
    }

    /// Execute the scan and return the first matching record, if any.
    pub async fn first(mut self) -> Result<Option<Value>, StoreError> {
        self.spec.limit = Some(1);
        let mut records = self.store.scan(&self.table, self.spec).await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }
}

/// Read a record's id field, stamped by the store on insert.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("_id").and_then(Value::as_str)
}
