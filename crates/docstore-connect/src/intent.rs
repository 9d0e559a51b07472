//! Write-intent types
//!
//! A [`WriteIntent`] is a single requested mutation that has not yet been
//! applied to the store. Documents, filters, and updates are opaque
//! structural payloads; the sink never inspects their contents.

use serde::{Deserialize, Serialize};

/// An opaque structural document payload.
///
/// The storage client owns serialization; the sink only routes these values.
pub type Document = serde_json::Value;

/// Options for multi-document inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOptions {
    /// Ordered execution halts at the first failure and preserves document
    /// order of application; unordered lets the store keep applying the
    /// remaining documents after a failure.
    #[serde(default = "default_true")]
    pub ordered: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self { ordered: true }
    }
}

impl InsertOptions {
    /// Ordered execution (the default)
    pub fn ordered() -> Self {
        Self { ordered: true }
    }

    /// Unordered execution
    pub fn unordered() -> Self {
        Self { ordered: false }
    }
}

/// A single requested mutation against a document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteIntent {
    /// Insert a single document
    InsertOne {
        /// The document to insert
        document: Document,
    },
    /// Insert a batch of documents, preserving caller order within the batch
    InsertMany {
        /// The documents to insert, in caller order
        documents: Vec<Document>,
        /// Ordered vs unordered execution
        #[serde(default)]
        options: InsertOptions,
    },
    /// Update the first document matching the filter
    UpdateOne {
        /// Match criteria
        filter: Document,
        /// The update to apply
        update: Document,
    },
    /// Update every document matching the filter
    UpdateMany {
        /// Match criteria
        filter: Document,
        /// The update to apply
        update: Document,
    },
    /// Delete the first document matching the filter
    DeleteOne {
        /// Match criteria
        filter: Document,
    },
    /// Delete every document matching the filter
    DeleteMany {
        /// Match criteria
        filter: Document,
    },
}

impl WriteIntent {
    /// Create an insert-one intent
    pub fn insert_one(document: Document) -> Self {
        Self::InsertOne { document }
    }

    /// Create an insert-many intent
    pub fn insert_many(documents: Vec<Document>, options: InsertOptions) -> Self {
        Self::InsertMany { documents, options }
    }

    /// Create an update-one intent
    pub fn update_one(filter: Document, update: Document) -> Self {
        Self::UpdateOne { filter, update }
    }

    /// Create an update-many intent
    pub fn update_many(filter: Document, update: Document) -> Self {
        Self::UpdateMany { filter, update }
    }

    /// Create a delete-one intent
    pub fn delete_one(filter: Document) -> Self {
        Self::DeleteOne { filter }
    }

    /// Create a delete-many intent
    pub fn delete_many(filter: Document) -> Self {
        Self::DeleteMany { filter }
    }

    /// Get the operation kind of this intent
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::InsertOne { .. } => WriteKind::InsertOne,
            Self::InsertMany { .. } => WriteKind::InsertMany,
            Self::UpdateOne { .. } => WriteKind::UpdateOne,
            Self::UpdateMany { .. } => WriteKind::UpdateMany,
            Self::DeleteOne { .. } => WriteKind::DeleteOne,
            Self::DeleteMany { .. } => WriteKind::DeleteMany,
        }
    }
}

/// Kind of write operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    /// Single-document insert
    InsertOne,
    /// Multi-document insert
    InsertMany,
    /// Single-document update
    UpdateOne,
    /// Multi-document update
    UpdateMany,
    /// Single-document delete
    DeleteOne,
    /// Multi-document delete
    DeleteMany,
}

impl WriteKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsertOne => "insert_one",
            Self::InsertMany => "insert_many",
            Self::UpdateOne => "update_one",
            Self::UpdateMany => "update_many",
            Self::DeleteOne => "delete_one",
            Self::DeleteMany => "delete_many",
        }
    }

    /// Check if this is an insert operation
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::InsertOne | Self::InsertMany)
    }

    /// Check if this is an update operation
    pub fn is_update(&self) -> bool {
        matches!(self, Self::UpdateOne | Self::UpdateMany)
    }

    /// Check if this is a delete operation
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteOne | Self::DeleteMany)
    }

    /// Check if this operation can touch more than one document
    pub fn is_many(&self) -> bool {
        matches!(self, Self::InsertMany | Self::UpdateMany | Self::DeleteMany)
    }
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
