//! Document write sink
//!
//! [`DocumentSink`] drains an upstream sequence of [`WriteIntent`] values and
//! issues one storage call per intent, pulling the next intent only after the
//! in-flight call has resolved. That single-slot request loop is the whole
//! backpressure contract: the producer can never outpace the store's
//! acknowledgments.

use futures::{Stream, StreamExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use validator::Validate;

use crate::client::{DocumentStore, WriteAck};
use crate::error::{Result, SinkError};
use crate::intent::{Document, InsertOptions, WriteIntent};

/// Document sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct DocumentSinkConfig {
    /// Target collection name
    #[validate(length(min = 1))]
    pub collection: String,

    /// Default execution mode for batches built by [`DocumentSink::insert_many_from`].
    /// Intents carrying explicit [`InsertOptions`] are not affected.
    #[serde(default = "default_true")]
    pub ordered_inserts: bool,
}

fn default_true() -> bool {
    true
}

impl DocumentSinkConfig {
    /// Create a config targeting `collection` with ordered inserts
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ordered_inserts: true,
        }
    }

    /// Switch batch inserts to unordered execution
    pub fn with_unordered_inserts(mut self) -> Self {
        self.ordered_inserts = false;
        self
    }

    fn insert_options(&self) -> InsertOptions {
        if self.ordered_inserts {
            InsertOptions::ordered()
        } else {
            InsertOptions::unordered()
        }
    }
}

/// Terminal stats of a completed sink run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Number of intents acknowledged by the store
    pub intents_acknowledged: u64,
    /// Total documents the acknowledged intents touched
    pub documents_affected: u64,
}

impl WriteSummary {
    /// Fold one acknowledgment into the summary
    pub fn record(&mut self, ack: WriteAck) {
        self.intents_acknowledged += 1;
        self.documents_affected += ack.affected();
    }

    /// Check whether any intent was acknowledged
    pub fn is_empty(&self) -> bool {
        self.intents_acknowledged == 0
    }
}

/// Write sink over an injected document store
///
/// One sink instance keeps at most one storage call in flight. Intents are
/// applied in arrival order; the first failure aborts the run, remaining
/// intents are never pulled, and the cause is returned to the caller.
/// Dropping a run future drops the in-flight storage call with it, which is
/// how cancellation propagates.
#[derive(Clone)]
pub struct DocumentSink {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSink {
    /// Create a sink over the given store handle
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Drain `intents`, applying each against the store in order.
    ///
    /// Resolves to the run summary once the upstream is exhausted, or to the
    /// first failure encountered. An empty upstream completes immediately
    /// without touching the store.
    pub async fn run<S>(&self, config: &DocumentSinkConfig, intents: S) -> Result<WriteSummary>
    where
        S: Stream<Item = WriteIntent> + Send,
    {
        self.run_results(config, intents.map(Ok)).await
    }

    /// Like [`DocumentSink::run`], for upstreams that can fail.
    ///
    /// An `Err` item is treated exactly like a storage failure: the sink
    /// stops pulling and the run resolves to that cause.
    pub async fn run_results<S>(
        &self,
        config: &DocumentSinkConfig,
        intents: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = Result<WriteIntent>> + Send,
    {
        config
            .validate()
            .map_err(|e| SinkError::config(format!("invalid sink config: {}", e)))?;

        let mut summary = WriteSummary::default();
        futures::pin_mut!(intents);

        while let Some(next) = intents.next().await {
            let intent = next?;
            let kind = intent.kind();

            match self.apply(config, intent).await {
                Ok(ack) => {
                    summary.record(ack);
                    debug!(
                        collection = %config.collection,
                        op = kind.as_str(),
                        affected = ack.affected(),
                        "write acknowledged"
                    );
                }
                Err(e) => {
                    error!(
                        collection = %config.collection,
                        op = kind.as_str(),
                        error = %e,
                        "write failed, aborting sink run"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            collection = %config.collection,
            intents = summary.intents_acknowledged,
            documents = summary.documents_affected,
            "sink drained"
        );

        Ok(summary)
    }

    /// Insert each document from `documents` individually
    pub async fn insert_one_from<S>(
        &self,
        config: &DocumentSinkConfig,
        documents: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = Document> + Send,
    {
        self.run(config, documents.map(WriteIntent::insert_one)).await
    }

    /// Insert each batch from `batches` with the configured execution mode
    pub async fn insert_many_from<S>(
        &self,
        config: &DocumentSinkConfig,
        batches: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = Vec<Document>> + Send,
    {
        let options = config.insert_options();
        self.run(
            config,
            batches.map(move |documents| WriteIntent::insert_many(documents, options)),
        )
        .await
    }

    /// Apply each `(filter, update)` pair to the first matching document
    pub async fn update_one_from<S>(
        &self,
        config: &DocumentSinkConfig,
        updates: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = (Document, Document)> + Send,
    {
        self.run(
            config,
            updates.map(|(filter, update)| WriteIntent::update_one(filter, update)),
        )
        .await
    }

    /// Apply each `(filter, update)` pair to every matching document
    pub async fn update_many_from<S>(
        &self,
        config: &DocumentSinkConfig,
        updates: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = (Document, Document)> + Send,
    {
        self.run(
            config,
            updates.map(|(filter, update)| WriteIntent::update_many(filter, update)),
        )
        .await
    }

    /// Delete the first document matching each filter from `filters`
    pub async fn delete_one_from<S>(
        &self,
        config: &DocumentSinkConfig,
        filters: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = Document> + Send,
    {
        self.run(config, filters.map(WriteIntent::delete_one)).await
    }

    /// Delete every document matching each filter from `filters`
    pub async fn delete_many_from<S>(
        &self,
        config: &DocumentSinkConfig,
        filters: S,
    ) -> Result<WriteSummary>
    where
        S: Stream<Item = Document> + Send,
    {
        self.run(config, filters.map(WriteIntent::delete_many)).await
    }

    /// Dispatch one intent to the matching store operation
    async fn apply(&self, config: &DocumentSinkConfig, intent: WriteIntent) -> Result<WriteAck> {
        let collection = config.collection.as_str();

        match intent {
            WriteIntent::InsertOne { document } => {
                self.store.insert_one(collection, document).await
            }
            WriteIntent::InsertMany { documents, options } => {
                // An empty batch is a no-op success, never forwarded
                if documents.is_empty() {
                    return Ok(WriteAck::default());
                }
                self.store.insert_many(collection, documents, options).await
            }
            WriteIntent::UpdateOne { filter, update } => {
                self.store.update_one(collection, filter, update).await
            }
            WriteIntent::UpdateMany { filter, update } => {
                self.store.update_many(collection, filter, update).await
            }
            WriteIntent::DeleteOne { filter } => self.store.delete_one(collection, filter).await,
            WriteIntent::DeleteMany { filter } => self.store.delete_many(collection, filter).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, RecordingStore};
    use futures::stream;
    use serde_json::json;

    fn sink_over(store: RecordingStore<MemoryStore>) -> DocumentSink {
        DocumentSink::new(Arc::new(store))
    }

    #[test]
    fn test_config_defaults() {
        let config: DocumentSinkConfig =
            serde_json::from_str(r#"{"collection": "users"}"#).unwrap();
        assert_eq!(config.collection, "users");
        assert!(config.ordered_inserts);

        let config = DocumentSinkConfig::new("users").with_unordered_inserts();
        assert!(!config.insert_options().ordered);
    }

    #[tokio::test]
    async fn test_empty_upstream_completes_without_store_calls() {
        let store = RecordingStore::new(MemoryStore::new());
        let sink = sink_over(store.clone());
        let config = DocumentSinkConfig::new("users");

        let summary = sink
            .run(&config, stream::iter(Vec::<WriteIntent>::new()))
            .await
            .unwrap();

        assert!(summary.is_empty());
        assert_eq!(store.started(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_forwarded() {
        let store = RecordingStore::new(MemoryStore::new());
        let sink = sink_over(store.clone());
        let config = DocumentSinkConfig::new("users");

        let intents = vec![WriteIntent::insert_many(vec![], InsertOptions::ordered())];
        let summary = sink.run(&config, stream::iter(intents)).await.unwrap();

        // The empty batch still counts as one acknowledged intent
        assert_eq!(summary.intents_acknowledged, 1);
        assert_eq!(summary.documents_affected, 0);
        assert_eq!(store.started(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_pulling() {
        let store = RecordingStore::new(MemoryStore::new());
        let sink = sink_over(store.clone());
        let config = DocumentSinkConfig::new("");

        let intents = vec![WriteIntent::insert_one(json!({"_id": 1}))];
        let err = sink.run(&config, stream::iter(intents)).await.unwrap_err();

        assert!(matches!(err, SinkError::Config(_)));
        assert_eq!(store.started(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_routes_each_kind() {
        let store = RecordingStore::new(MemoryStore::new());
        let sink = sink_over(store.clone());
        let config = DocumentSinkConfig::new("users");

        let intents = vec![
            WriteIntent::insert_one(json!({"_id": 1, "status": "new"})),
            WriteIntent::insert_many(
                vec![json!({"_id": 2}), json!({"_id": 3})],
                InsertOptions::ordered(),
            ),
            WriteIntent::update_one(json!({"_id": 1}), json!({"$set": {"status": "done"}})),
            WriteIntent::update_many(json!({}), json!({"$set": {"seen": true}})),
            WriteIntent::delete_one(json!({"_id": 2})),
            WriteIntent::delete_many(json!({})),
        ];

        let summary = sink.run(&config, stream::iter(intents)).await.unwrap();

        assert_eq!(summary.intents_acknowledged, 6);
        assert_eq!(
            store.calls(),
            vec![
                "insert_one",
                "insert_many",
                "update_one",
                "update_many",
                "delete_one",
                "delete_many"
            ]
        );
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_run() {
        let store = RecordingStore::new(MemoryStore::new()).fail_after(2, "connection reset");
        let sink = sink_over(store.clone());
        let config = DocumentSinkConfig::new("users");

        let intents: Vec<WriteIntent> = (0..5)
            .map(|i| WriteIntent::insert_one(json!({"_id": i})))
            .collect();

        let err = sink.run(&config, stream::iter(intents)).await.unwrap_err();

        assert!(err.is_transport());
        // Two acknowledged writes, the third call failed, the rest never pulled
        assert_eq!(store.started(), 3);
        assert_eq!(store.completed(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_treated_like_storage_failure() {
        let store = RecordingStore::new(MemoryStore::new());
        let sink = sink_over(store.clone());
        let config = DocumentSinkConfig::new("users");

        let intents = vec![
            Ok(WriteIntent::insert_one(json!({"_id": 1}))),
            Err(SinkError::upstream("source disconnected")),
            Ok(WriteIntent::insert_one(json!({"_id": 2}))),
        ];

        let err = sink
            .run_results(&config, stream::iter(intents))
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::Upstream(_)));
        assert_eq!(store.completed(), 1);
    }
}
