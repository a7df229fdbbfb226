//! In-memory durable store.
//!
//! Backs tests and can serve as the session-local store when no remote
//! endpoint is configured. Semantics match the remote store: records are
//! JSON objects, ids are opaque strings, scans order by `_creationTime`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

use super::{DurableStore, Order, QuerySpec};

struct StoredRecord {
    table: String,
    sequence: u64,
    value: Value,
}

/// Process-local [`DurableStore`] over a concurrent map.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, StoredRecord>,
    sequence: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all tables.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records in one table.
    pub fn table_len(&self, table: &str) -> usize {
        self.records.iter().filter(|r| r.table == table).count()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn insert(&self, table: &str, record: Value) -> Result<String, StoreError> {
        let Value::Object(mut fields) = record else {
            return Err(StoreError::Backend {
                status: 400,
                body: "record must be a JSON object".to_string(),
            });
        };

        let id = Uuid::new_v4().to_string();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        fields.insert("_id".to_string(), Value::String(id.clone()));
        fields.insert(
            "_creationTime".to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );

        self.records.insert(
            id.clone(),
            StoredRecord {
                table: table.to_string(),
                sequence,
                value: Value::Object(fields),
            },
        );
        Ok(id)
    }

    async fn patch(&self, id: &str, partial: Value) -> Result<(), StoreError> {
        let Value::Object(updates) = partial else {
            return Err(StoreError::Backend {
                status: 400,
                body: "patch must be a JSON object".to_string(),
            });
        };

        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))?;
        if let Value::Object(fields) = &mut entry.value {
            for (key, value) in updates {
                fields.insert(key, value);
            }
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value.clone()))
    }

    async fn scan(&self, table: &str, spec: QuerySpec) -> Result<Vec<Value>, StoreError> {
        let mut matched: Vec<(u64, Value)> = self
            .records
            .iter()
            .filter(|r| r.table == table)
            .filter(|r| {
                spec.filters
                    .iter()
                    .all(|(field, expected)| r.value.get(field) == Some(expected))
            })
            .map(|r| (r.sequence, r.value.clone()))
            .collect();

        matched.sort_by_key(|(sequence, _)| *sequence);
        if spec.order == Order::Desc {
            matched.reverse();
        }
        if let Some(limit) = spec.limit {
            matched.truncate(limit);
        }
        Ok(matched.into_iter().map(|(_, value)| value).collect())
    }
}
