//! Session blackboard: namespaced key-value memory shared across agents.
//!
//! The blackboard is the coordination surface between the orchestrator and
//! its specialists: agents stage findings and artifacts under
//! `(sessionId, namespace, key)` and query each other's entries through
//! the `query_blackboard` tool. Entries are upserted, never hard-deleted;
//! two writers to the same key race with last-write-wins (there is no
//! version token).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::{record_id, DurableStore};

/// Store table holding blackboard entries.
pub const BLACKBOARD_TABLE: &str = "blackboardEntries";

/// Namespace harvested by the session manager during the completing phase.
pub const ARTIFACTS_NAMESPACE: &str = "artifacts";

/// One blackboard entry, unique per `(sessionId, namespace, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackboardEntry {
    pub session_id: String,
    pub namespace: String,
    pub key: String,
    /// Opaque payload; fully replaced on every write.
    pub value: Value,
    /// Agent that last claimed the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Free-form annotations; shallow-merged on write, never replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Millisecond timestamps.
    pub created_at: i64,
    pub updated_at: i64,
}

/// Handle over the durable store for one session-scoped blackboard.
#[derive(Clone)]
pub struct Blackboard {
    store: Arc<dyn DurableStore>,
}

impl Blackboard {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Upsert an entry keyed by `(session_id, namespace, key)`.
    ///
    /// When the entry exists its value is fully replaced, `agent_id` is
    /// replaced only if a new one is supplied, metadata is shallow-merged
    /// (new keys overwrite, others are retained), and `updatedAt` is
    /// refreshed. A new entry gets both timestamps set to now.
    pub async fn write(
        &self,
        session_id: &str,
        namespace: &str,
        key: &str,
        value: Value,
        agent_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<String, StoreError> {
        let existing = self
            .store
            .query(BLACKBOARD_TABLE)
            .eq("sessionId", session_id)
            .eq("namespace", namespace)
            .eq("key", key)
            .first()
            .await?;
        let now = chrono::Utc::now().timestamp_millis();

        if let Some(record) = existing {
            let id = record_id(&record)
                .ok_or_else(|| StoreError::NotFound("blackboard entry id".to_string()))?
                .to_string();

            let mut patch = Map::new();
            patch.insert("value".to_string(), value);
            patch.insert("updatedAt".to_string(), Value::from(now));
            if let Some(agent_id) = agent_id {
                patch.insert("agentId".to_string(), Value::from(agent_id));
            }
            if let Some(new_metadata) = metadata {
                patch.insert(
                    "metadata".to_string(),
                    merge_metadata(record.get("metadata"), new_metadata),
                );
            }

            self.store.patch(&id, Value::Object(patch)).await?;
            return Ok(id);
        }

        let entry = BlackboardEntry {
            session_id: session_id.to_string(),
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
            agent_id: agent_id.map(String::from),
            metadata,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert(BLACKBOARD_TABLE, serde_json::to_value(&entry)?)
            .await
    }

    /// Search the session's entries.
    ///
    /// `namespace` and `key` filter by exact match when present. `pattern`
    /// matches case-insensitively as a substring against string-typed
    /// values only; when a pattern is supplied, entries whose value is not
    /// a string are excluded outright, with no coercion or stringification.
    pub async fn search(
        &self,
        session_id: &str,
        namespace: Option<&str>,
        key: Option<&str>,
        pattern: Option<&str>,
    ) -> Result<Vec<BlackboardEntry>, StoreError> {
        let records = self
            .store
            .query(BLACKBOARD_TABLE)
            .eq("sessionId", session_id)
            .collect()
            .await?;

        let pattern_lower = pattern.map(str::to_lowercase);
        let mut entries = Vec::new();
        for record in records {
            let entry: BlackboardEntry = serde_json::from_value(record)?;
            if let Some(namespace) = namespace {
                if entry.namespace != namespace {
                    continue;
                }
            }
            if let Some(key) = key {
                if entry.key != key {
                    continue;
                }
            }
            if let Some(pattern) = &pattern_lower {
                match entry.value.as_str() {
                    Some(text) if text.to_lowercase().contains(pattern) => {}
                    _ => continue,
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Fetch every entry under one namespace, no pattern filtering.
    pub async fn get_namespace(
        &self,
        session_id: &str,
        namespace: &str,
    ) -> Result<Vec<BlackboardEntry>, StoreError> {
        let records = self
            .store
            .query(BLACKBOARD_TABLE)
            .eq("sessionId", session_id)
            .eq("namespace", namespace)
            .collect()
            .await?;
        records
            .into_iter()
            .map(|record| serde_json::from_value(record).map_err(StoreError::from))
            .collect()
    }
}

/// Shallow merge: new keys overwrite, existing keys are retained. A
/// non-object on either side resolves to the new value.
fn merge_metadata(existing: Option<&Value>, new: Value) -> Value {
    match (existing.and_then(Value::as_object), new) {
        (Some(existing), Value::Object(new)) => {
            let mut merged = existing.clone();
            for (key, value) in new {
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (_, new) => new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn blackboard() -> Blackboard {
        Blackboard::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_write_twice_is_idempotent_upsert() {
        let bb = blackboard();
        bb.write("s1", "research", "k", json!("v1"), Some("researcher"), None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        bb.write("s1", "research", "k", json!("v2"), None, None)
            .await
            .unwrap();

        let entries = bb.get_namespace("s1", "research").await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.value, json!("v2"));
        // agentId retained when the second write supplies none
        assert_eq!(entry.agent_id.as_deref(), Some("researcher"));
        assert!(entry.updated_at > entry.created_at);
    }

    #[tokio::test]
    async fn test_write_merges_metadata_shallowly() {
        let bb = blackboard();
        bb.write(
            "s1",
            "ns",
            "k",
            json!(1),
            None,
            Some(json!({"source": "web", "confidence": 0.4})),
        )
        .await
        .unwrap();
        bb.write(
            "s1",
            "ns",
            "k",
            json!(2),
            None,
            Some(json!({"confidence": 0.9})),
        )
        .await
        .unwrap();

        let entry = &bb.get_namespace("s1", "ns").await.unwrap()[0];
        let metadata = entry.metadata.as_ref().unwrap();
        assert_eq!(metadata["source"], "web");
        assert_eq!(metadata["confidence"], 0.9);
    }

    #[tokio::test]
    async fn test_same_key_in_different_namespaces_is_distinct() {
        let bb = blackboard();
        bb.write("s1", "a", "k", json!("in a"), None, None).await.unwrap();
        bb.write("s1", "b", "k", json!("in b"), None, None).await.unwrap();

        assert_eq!(bb.get_namespace("s1", "a").await.unwrap().len(), 1);
        assert_eq!(bb.get_namespace("s1", "b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_pattern_is_case_insensitive_substring() {
        let bb = blackboard();
        bb.write("s1", "notes", "a", json!("Advances in AI planning"), None, None)
            .await
            .unwrap();
        bb.write("s1", "notes", "b", json!("weather report"), None, None)
            .await
            .unwrap();

        let hits = bb.search("s1", None, None, Some("ai")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "a");
    }

    #[tokio::test]
    async fn test_search_pattern_excludes_non_string_values() {
        let bb = blackboard();
        bb.write("s1", "ns", "text", json!("AI summary"), None, None)
            .await
            .unwrap();
        bb.write("s1", "ns", "blob", json!({"topic": "AI"}), None, None)
            .await
            .unwrap();
        bb.write("s1", "ns", "num", json!(42), None, None).await.unwrap();

        let hits = bb.search("s1", None, None, Some("AI")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "text");
    }

    #[tokio::test]
    async fn test_search_namespace_and_key_are_exact() {
        let bb = blackboard();
        bb.write("s1", "research", "k1", json!("x"), None, None).await.unwrap();
        bb.write("s1", "research-extra", "k1", json!("y"), None, None)
            .await
            .unwrap();

        let hits = bb
            .search("s1", Some("research"), Some("k1"), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, json!("x"));
    }

    #[tokio::test]
    async fn test_search_is_session_scoped() {
        let bb = blackboard();
        bb.write("s1", "ns", "k", json!("mine"), None, None).await.unwrap();
        bb.write("s2", "ns", "k", json!("theirs"), None, None).await.unwrap();

        let hits = bb.search("s1", None, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, json!("mine"));
    }
}
