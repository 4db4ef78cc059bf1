//! Document Store abstraction
//!
//! The tracker persists its entities through a generic document store that
//! offers per-document atomic writes and nothing more:
//! - create-if-absent, get, find-by-field, delete
//! - atomic compare-and-set keyed on a per-document version counter
//! - no multi-document transactions, no foreign keys, no cascades
//!
//! Referential integrity and cascading are layered on top by
//! [`crate::coordinator::ConsistencyCoordinator`].
//!
//! # Example
//!
//! ```rust
//! use moea_tracker::document::{CasOutcome, Collection, DocumentStore, MemoryDocumentStore};
//! use serde_json::json;
//!
//! # async fn example() -> moea_tracker::Result<()> {
//! let store = MemoryDocumentStore::new();
//!
//! assert!(store.insert(Collection::Experiments, "e-1", json!({"status": "PENDING"})).await?);
//! let doc = store.get(Collection::Experiments, "e-1").await?.unwrap();
//! assert_eq!(doc.version, 1);
//!
//! let outcome = store
//!     .compare_and_swap(Collection::Experiments, "e-1", 1, json!({"status": "RUNNING"}))
//!     .await?;
//! assert_eq!(outcome, CasOutcome::Applied { version: 2 });
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryDocumentStore;

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// Named collections of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// `Experiment` documents.
    Experiments,
    /// `ExperimentResult` documents.
    Results,
    /// Run-key index entries (canonical run key -> result id).
    RunKeys,
}

impl Collection {
    /// Collection name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Experiments => "experiments",
            Self::Results => "results",
            Self::RunKeys => "run_keys",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document together with its version counter.
///
/// Versions start at 1 on insert and increase by one on every applied
/// compare-and-swap.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document id, unique within its collection.
    pub id: String,
    /// Version counter used for conditional writes.
    pub version: u64,
    /// Document body.
    pub body: Value,
}

impl StoredDocument {
    /// Deserialize the body into a typed entity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.body)?)
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write was applied; the document now has `version`.
    Applied {
        /// New version counter.
        version: u64,
    },
    /// The document changed since it was read.
    VersionMismatch {
        /// Version currently stored.
        current: u64,
    },
    /// The document no longer exists.
    Missing,
}

/// Serialize an entity into a document body.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if `value` cannot be represented as JSON.
pub fn encode<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Document store client consumed by the tracker.
///
/// Every method is a single atomic round-trip against one document, except
/// the provided [`DocumentStore::delete_by_field`], which is a sequence of
/// single-document deletes.
pub trait DocumentStore: Send + Sync {
    /// Insert a document if no document with `id` exists.
    ///
    /// Returns `false` (and leaves the stored document untouched) if the id
    /// is already taken.
    fn insert(
        &self,
        collection: Collection,
        id: &str,
        body: Value,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Get a document by id.
    ///
    /// Returns `None` if the document doesn't exist.
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<Option<StoredDocument>>> + Send;

    /// Find every document whose top-level `field` equals `value`, in id order.
    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> impl Future<Output = Result<Vec<StoredDocument>>> + Send;

    /// Replace the document body if its version is still `expected_version`.
    fn compare_and_swap(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> impl Future<Output = Result<CasOutcome>> + Send;

    /// Delete a document.
    ///
    /// Returns `false` if the document didn't exist (not an error).
    fn delete(&self, collection: Collection, id: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Delete every document whose top-level `field` equals `value`.
    ///
    /// Returns the number of documents removed by this call. Not atomic:
    /// an interruption leaves a subset deleted, and repeating the call
    /// finishes the job.
    fn delete_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> impl Future<Output = Result<usize>> + Send {
        async move {
            let matches = self.find_by_field(collection, field, value).await?;
            let mut removed = 0;
            for doc in matches {
                if self.delete(collection, &doc.id).await? {
                    removed += 1;
                }
            }
            Ok(removed)
        }
    }
}
