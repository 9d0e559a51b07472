//! docstore-connect - Document-store write sinks for streaming pipelines
//!
//! This crate adapts a document store's write operations (insert, update,
//! delete) into sink stages for pull-driven streaming pipelines. The store
//! itself is an injected [`DocumentStore`] capability handle; connection
//! bootstrap, codecs, and topology live with the driver, not here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     upstream intent stream                      │
//! │        WriteIntent: insert one/many, update, delete             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       DocumentSink::run                         │
//! │   pull one intent → dispatch → await acknowledgment → repeat    │
//! │          (at most one storage call in flight, ever)             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                  DocumentStore (injected driver)                │
//! │  insert_one │ insert_many │ update_one/many │ delete_one/many  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sink pulls exactly one intent at a time and never requests the next
//! before the in-flight write resolves, so the producer can never outpace
//! the store. The first failure ends the run with its cause; remaining
//! intents are left unpulled for the caller to resubmit.
//!
//! # Example
//!
//! ```rust,ignore
//! use docstore_connect::prelude::*;
//! use futures::stream;
//! use std::sync::Arc;
//!
//! let sink = DocumentSink::new(Arc::new(my_driver_handle));
//! let config = DocumentSinkConfig::new("users");
//!
//! let summary = sink
//!     .run(&config, stream::iter(vec![
//!         WriteIntent::insert_one(serde_json::json!({"_id": 1})),
//!         WriteIntent::delete_one(serde_json::json!({"_id": 7})),
//!     ]))
//!     .await?;
//!
//! println!("acknowledged {} intents", summary.intents_acknowledged);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Storage-client capability interface
pub mod client;

// Error types
pub mod error;

// Write-intent data model
pub mod intent;

// The write sink adapter and its variants
pub mod sink;

// In-memory and instrumented stores for tests
pub mod testing;

// Re-export core types at crate root for ergonomic use
pub use client::{DocumentStore, WriteAck};
pub use error::{Result, SinkError};
pub use intent::{Document, InsertOptions, WriteIntent, WriteKind};
pub use sink::{DocumentSink, DocumentSinkConfig, WriteSummary};

// Re-export commonly used dependencies for sink implementations
pub use async_trait::async_trait;
pub use futures::stream::BoxStream;
pub use serde_json::Value as JsonValue;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        async_trait, BoxStream, Document, DocumentSink, DocumentSinkConfig, DocumentStore,
        InsertOptions, JsonValue, Result, SinkError, WriteAck, WriteIntent, WriteKind,
        WriteSummary,
    };

    // Re-export validation and schema traits for config types
    pub use schemars::JsonSchema;
    pub use validator::Validate;
}
