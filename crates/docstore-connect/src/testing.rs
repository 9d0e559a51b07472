//! Testing utilities
//!
//! In-memory and instrumented [`DocumentStore`] implementations for testing
//! sinks without an external database.
//!
//! # Example
//!
//! ```rust,ignore
//! use docstore_connect::prelude::*;
//! use docstore_connect::testing::{MemoryStore, RecordingStore};
//!
//! #[tokio::test]
//! async fn test_my_pipeline() {
//!     let store = RecordingStore::new(MemoryStore::new());
//!     let sink = DocumentSink::new(Arc::new(store.clone()));
//!
//!     let summary = sink
//!         .run(&DocumentSinkConfig::new("users"), my_intents())
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(summary.intents_acknowledged, store.completed());
//!     assert!(!store.overlap_detected());
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{DocumentStore, WriteAck};
use crate::error::{Result, SinkError};
use crate::intent::{Document, InsertOptions, WriteIntent};

// ============================================================================
// Filter and update evaluation
// ============================================================================

/// Check whether `document` matches `filter` by top-level field equality.
///
/// An empty filter matches every document. A non-object filter matches none.
pub fn matches_filter(document: &Document, filter: &Document) -> bool {
    let Some(criteria) = filter.as_object() else {
        return false;
    };
    let Some(fields) = document.as_object() else {
        return criteria.is_empty();
    };
    criteria.iter().all(|(key, value)| fields.get(key) == Some(value))
}

/// Apply an operator-style update (`$set`, `$unset`) to `document` in place.
///
/// Returns whether the document changed. Plain replacement documents are
/// rejected, matching the driver contract the sinks target.
pub fn apply_update(document: &mut Document, update: &Document) -> Result<bool> {
    let operators = update
        .as_object()
        .ok_or_else(|| SinkError::validation("update must be a document"))?;
    if operators.is_empty() {
        return Err(SinkError::validation("update document is empty"));
    }

    let mut changed = false;
    for (operator, fields) in operators {
        if !operator.starts_with('$') {
            return Err(SinkError::validation(
                "update document requires update operators",
            ));
        }
        let fields = fields
            .as_object()
            .ok_or_else(|| SinkError::validation(format!("{} expects a document", operator)))?;
        let target = document
            .as_object_mut()
            .ok_or_else(|| SinkError::validation("target document is not an object"))?;

        match operator.as_str() {
            "$set" => {
                for (key, value) in fields {
                    if target.get(key) != Some(value) {
                        target.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
            }
            "$unset" => {
                for key in fields.keys() {
                    if target.remove(key).is_some() {
                        changed = true;
                    }
                }
            }
            other => {
                return Err(SinkError::validation(format!(
                    "unsupported update operator '{}'",
                    other
                )))
            }
        }
    }

    Ok(changed)
}

// ============================================================================
// MemoryStore
// ============================================================================

/// An in-memory document store
///
/// Enforces `_id` uniqueness per collection: a duplicate `_id` is rejected as
/// a validation failure, which makes it the stock "intentionally invalid
/// document" for batch tests. Documents without an `_id` are stored as-is.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload documents into a collection, bypassing `_id` checks
    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    /// Snapshot the contents of a collection, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Check whether a collection is empty or absent
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn find_duplicate(existing: &[Document], candidate: &Document) -> Option<String> {
        let id = candidate.get("_id")?;
        existing
            .iter()
            .any(|doc| doc.get("_id") == Some(id))
            .then(|| id.to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<WriteAck> {
        if !document.is_object() {
            return Err(SinkError::validation("document must be an object"));
        }
        let mut collections = self.collections.lock();
        let coll = collections.entry(collection.to_string()).or_default();
        if let Some(id) = Self::find_duplicate(coll, &document) {
            return Err(SinkError::validation(format!(
                "duplicate _id {} in '{}'",
                id, collection
            )));
        }
        coll.push(document);
        Ok(WriteAck::inserted(1))
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: InsertOptions,
    ) -> Result<WriteAck> {
        let size = documents.len();
        let mut collections = self.collections.lock();
        let coll = collections.entry(collection.to_string()).or_default();

        let mut inserted = 0u64;
        let mut first_rejection: Option<String> = None;

        for (index, document) in documents.into_iter().enumerate() {
            let rejection = if !document.is_object() {
                Some(format!("document at index {} is not an object", index))
            } else {
                Self::find_duplicate(coll, &document)
                    .map(|id| format!("duplicate _id {} at index {}", id, index))
            };

            match rejection {
                // Ordered execution halts here; the inserted prefix stays applied
                Some(message) if options.ordered => {
                    return Err(SinkError::batch(size, message));
                }
                Some(message) => {
                    first_rejection.get_or_insert(message);
                }
                None => {
                    coll.push(document);
                    inserted += 1;
                }
            }
        }

        // Unordered: the remaining documents were applied, but the batch call
        // still resolves to a single failure
        match first_rejection {
            Some(message) => Err(SinkError::batch(size, message)),
            None => Ok(WriteAck::inserted(inserted)),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteAck> {
        if !filter.is_object() {
            return Err(SinkError::validation("filter must be a document"));
        }
        let mut collections = self.collections.lock();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(WriteAck::updated(0, 0));
        };
        match coll.iter_mut().find(|doc| matches_filter(doc, &filter)) {
            Some(doc) => {
                let changed = apply_update(doc, &update)?;
                Ok(WriteAck::updated(1, changed as u64))
            }
            None => Ok(WriteAck::updated(0, 0)),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteAck> {
        if !filter.is_object() {
            return Err(SinkError::validation("filter must be a document"));
        }
        let mut collections = self.collections.lock();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(WriteAck::updated(0, 0));
        };
        let mut matched = 0u64;
        let mut modified = 0u64;
        for doc in coll.iter_mut().filter(|doc| matches_filter(doc, &filter)) {
            matched += 1;
            if apply_update(doc, &update)? {
                modified += 1;
            }
        }
        Ok(WriteAck::updated(matched, modified))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<WriteAck> {
        if !filter.is_object() {
            return Err(SinkError::validation("filter must be a document"));
        }
        let mut collections = self.collections.lock();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(WriteAck::deleted(0));
        };
        match coll.iter().position(|doc| matches_filter(doc, &filter)) {
            Some(index) => {
                coll.remove(index);
                Ok(WriteAck::deleted(1))
            }
            None => Ok(WriteAck::deleted(0)),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<WriteAck> {
        if !filter.is_object() {
            return Err(SinkError::validation("filter must be a document"));
        }
        let mut collections = self.collections.lock();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(WriteAck::deleted(0));
        };
        let before = coll.len();
        coll.retain(|doc| !matches_filter(doc, &filter));
        Ok(WriteAck::deleted((before - coll.len()) as u64))
    }
}

// ============================================================================
// RecordingStore
// ============================================================================

/// An instrumented store wrapper for protocol assertions
///
/// Records the operation sequence, counts started and completed calls, and
/// flags any call that begins before the previous call's outcome resolved.
/// Optional per-call latency widens the in-flight window so overlap becomes
/// observable; `fail_after` injects a transport failure once `n` calls have
/// been acknowledged.
#[derive(Debug)]
pub struct RecordingStore<S> {
    inner: Arc<S>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    started: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    in_flight: Arc<AtomicBool>,
    overlap: Arc<AtomicBool>,
    latency: Option<Duration>,
    fail_after: Option<(u64, String)>,
}

impl<S> Clone for RecordingStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            calls: self.calls.clone(),
            started: self.started.clone(),
            completed: self.completed.clone(),
            in_flight: self.in_flight.clone(),
            overlap: self.overlap.clone(),
            latency: self.latency,
            fail_after: self.fail_after.clone(),
        }
    }
}

impl<S> RecordingStore<S> {
    /// Wrap a store
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            calls: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicBool::new(false)),
            overlap: Arc::new(AtomicBool::new(false)),
            latency: None,
            fail_after: None,
        }
    }

    /// Hold every call open for `latency` before delegating
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every call after `n` acknowledged calls
    pub fn fail_after(mut self, n: u64, message: impl Into<String>) -> Self {
        self.fail_after = Some((n, message.into()));
        self
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Number of calls that began
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of calls that resolved successfully
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Whether any call began before the previous one resolved
    pub fn overlap_detected(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    async fn begin(&self, op: &'static str) -> Result<()> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlap.store(true, Ordering::SeqCst);
        }
        self.calls.lock().push(op);
        self.started.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some((after, message)) = &self.fail_after {
            if self.completed.load(Ordering::SeqCst) >= *after {
                self.in_flight.store(false, Ordering::SeqCst);
                return Err(SinkError::transport(message.clone()));
            }
        }
        Ok(())
    }

    fn finish(&self, result: Result<WriteAck>) -> Result<WriteAck> {
        if result.is_ok() {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for RecordingStore<S> {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<WriteAck> {
        self.begin("insert_one").await?;
        self.finish(self.inner.insert_one(collection, document).await)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: InsertOptions,
    ) -> Result<WriteAck> {
        self.begin("insert_many").await?;
        self.finish(self.inner.insert_many(collection, documents, options).await)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteAck> {
        self.begin("update_one").await?;
        self.finish(self.inner.update_one(collection, filter, update).await)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteAck> {
        self.begin("update_many").await?;
        self.finish(self.inner.update_many(collection, filter, update).await)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<WriteAck> {
        self.begin("delete_one").await?;
        self.finish(self.inner.delete_one(collection, filter).await)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<WriteAck> {
        self.begin("delete_many").await?;
        self.finish(self.inner.delete_many(collection, filter).await)
    }
}

// ============================================================================
// Intent builders for tests
// ============================================================================

/// Create test documents and intents quickly
pub mod intents {
    use super::*;
    use serde_json::json;

    /// A sequence of documents with unique `_id` values
    pub fn docs(count: usize) -> Vec<Document> {
        (0..count)
            .map(|i| json!({"_id": i as u64, "name": format!("user-{}", i)}))
            .collect()
    }

    /// One insert-one intent per generated document
    pub fn inserts(count: usize) -> Vec<WriteIntent> {
        docs(count).into_iter().map(WriteIntent::insert_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_filter() {
        let doc = json!({"_id": 1, "status": "new"});
        assert!(matches_filter(&doc, &json!({})));
        assert!(matches_filter(&doc, &json!({"status": "new"})));
        assert!(matches_filter(&doc, &json!({"_id": 1, "status": "new"})));
        assert!(!matches_filter(&doc, &json!({"status": "done"})));
        assert!(!matches_filter(&doc, &json!({"missing": 1})));
        assert!(!matches_filter(&doc, &json!("not a filter")));
    }

    #[test]
    fn test_apply_update_set_and_unset() {
        let mut doc = json!({"_id": 1, "status": "new", "tmp": true});

        let changed = apply_update(&mut doc, &json!({"$set": {"status": "done"}})).unwrap();
        assert!(changed);
        assert_eq!(doc["status"], "done");

        // Setting the same value again is a no-op
        let changed = apply_update(&mut doc, &json!({"$set": {"status": "done"}})).unwrap();
        assert!(!changed);

        let changed = apply_update(&mut doc, &json!({"$unset": {"tmp": ""}})).unwrap();
        assert!(changed);
        assert!(doc.get("tmp").is_none());
    }

    #[test]
    fn test_apply_update_rejects_replacement_documents() {
        let mut doc = json!({"_id": 1});
        let err = apply_update(&mut doc, &json!({"status": "done"})).unwrap_err();
        assert!(err.is_validation());

        let err = apply_update(&mut doc, &json!({"$inc": {"n": 1}})).unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        store
            .insert_one("users", json!({"_id": 1}))
            .await
            .unwrap();

        let err = store
            .insert_one("users", json!({"_id": 1}))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.len("users"), 1);
    }

    #[tokio::test]
    async fn test_ordered_batch_halts_at_first_rejection() {
        let store = MemoryStore::new();
        store.seed("users", vec![json!({"_id": 2})]);

        let err = store
            .insert_many(
                "users",
                vec![json!({"_id": 1}), json!({"_id": 2}), json!({"_id": 3})],
                InsertOptions::ordered(),
            )
            .await
            .unwrap_err();

        assert!(err.is_batch());
        // Only the prefix before the rejected document was applied
        assert_eq!(store.len("users"), 2);
    }

    #[tokio::test]
    async fn test_unordered_batch_applies_remaining_documents() {
        let store = MemoryStore::new();
        store.seed("users", vec![json!({"_id": 2})]);

        let err = store
            .insert_many(
                "users",
                vec![json!({"_id": 1}), json!({"_id": 2}), json!({"_id": 3})],
                InsertOptions::unordered(),
            )
            .await
            .unwrap_err();

        assert!(err.is_batch());
        assert_eq!(store.len("users"), 3);
    }

    #[tokio::test]
    async fn test_update_one_touches_first_match_only() {
        let store = MemoryStore::new();
        store.seed(
            "users",
            vec![
                json!({"_id": 1, "status": "new"}),
                json!({"_id": 2, "status": "new"}),
            ],
        );

        let ack = store
            .update_one(
                "users",
                json!({"status": "new"}),
                json!({"$set": {"status": "done"}}),
            )
            .await
            .unwrap();

        assert_eq!(ack, WriteAck::updated(1, 1));
        let docs = store.documents("users");
        assert_eq!(docs[0]["status"], "done");
        assert_eq!(docs[1]["status"], "new");
    }

    #[tokio::test]
    async fn test_delete_many_on_missing_collection_is_noop() {
        let store = MemoryStore::new();
        let ack = store.delete_many("missing", json!({})).await.unwrap();
        assert_eq!(ack, WriteAck::deleted(0));
    }

    #[tokio::test]
    async fn test_recording_store_counts_and_injects_failures() {
        let store = RecordingStore::new(MemoryStore::new()).fail_after(1, "connection reset");

        store
            .insert_one("users", json!({"_id": 1}))
            .await
            .unwrap();
        let err = store
            .insert_one("users", json!({"_id": 2}))
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(store.started(), 2);
        assert_eq!(store.completed(), 1);
        assert_eq!(store.calls(), vec!["insert_one", "insert_one"]);
        assert!(!store.overlap_detected());
    }
}
