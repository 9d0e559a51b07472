//! Storage-client capability interface
//!
//! [`DocumentStore`] is the closed set of asynchronous write operations a
//! sink can issue. Connection setup, authentication, codec registration, and
//! topology are entirely the implementor's concern; the sink treats the
//! store as a capability handle and nothing more.

use async_trait::async_trait;

use crate::error::Result;
use crate::intent::{Document, InsertOptions};

/// Asynchronous write operations against a document store
///
/// Every call returns a deferred outcome: an acknowledgment with optional
/// stats, or a failure with its cause. Implementations must tolerate the
/// caller dropping an in-flight future (cooperative cancellation).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a single document into `collection`
    async fn insert_one(&self, collection: &str, document: Document) -> Result<WriteAck>;

    /// Insert a batch of documents into `collection`, preserving the given
    /// order when handing them to the underlying bulk operation
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: InsertOptions,
    ) -> Result<WriteAck>;

    /// Update the first document in `collection` matching `filter`
    async fn update_one(&self, collection: &str, filter: Document, update: Document)
        -> Result<WriteAck>;

    /// Update every document in `collection` matching `filter`
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteAck>;

    /// Delete the first document in `collection` matching `filter`
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<WriteAck>;

    /// Delete every document in `collection` matching `filter`
    async fn delete_many(&self, collection: &str, filter: Document) -> Result<WriteAck>;
}

/// Acknowledgment of one write operation, with optional stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteAck {
    /// Number of documents inserted
    pub inserted: u64,
    /// Number of documents matched by an update filter
    pub matched: u64,
    /// Number of documents actually modified
    pub modified: u64,
    /// Number of documents deleted
    pub deleted: u64,
}

impl WriteAck {
    /// Acknowledge `n` inserted documents
    pub fn inserted(n: u64) -> Self {
        Self {
            inserted: n,
            ..Default::default()
        }
    }

    /// Acknowledge an update that matched and modified documents
    pub fn updated(matched: u64, modified: u64) -> Self {
        Self {
            matched,
            modified,
            ..Default::default()
        }
    }

    /// Acknowledge `n` deleted documents
    pub fn deleted(n: u64) -> Self {
        Self {
            deleted: n,
            ..Default::default()
        }
    }

    /// Total number of documents this acknowledgment touched
    pub fn affected(&self) -> u64 {
        self.inserted + self.modified + self.deleted
    }
}
