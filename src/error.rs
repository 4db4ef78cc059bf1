//! Error types for moea-tracker
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

use crate::experiment::ExperimentStatus;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// moea-tracker error types
///
/// Domain errors (everything except [`Error::Storage`], [`Error::Serialization`]
/// and [`Error::Telemetry`]) are raised by the tracker itself and are never
/// produced by the document store.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed creation or update input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No document with this id
    #[error("{collection} document not found: {id}")]
    NotFound {
        /// Collection that was searched
        collection: &'static str,
        /// Requested id
        id: String,
    },

    /// Status move not permitted by the experiment state machine
    #[error("Illegal status transition {from} -> {to}\nOnly PENDING -> RUNNING -> FINISHED|FAILED is allowed")]
    IllegalStateTransition {
        /// Status the experiment was in
        from: ExperimentStatus,
        /// Requested status
        to: ExperimentStatus,
    },

    /// Result submitted for an experiment that does not exist
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// Result submitted for an experiment in a terminal state
    #[error("Experiment {id} is closed ({status}); results can no longer be appended")]
    ExperimentClosed {
        /// Experiment id
        id: String,
        /// Terminal status the experiment is in
        status: ExperimentStatus,
    },

    /// Non-duplicate iteration index below the last recorded one
    #[error("Out-of-order iteration {iteration}: last recorded iteration is {last}")]
    OutOfOrderIteration {
        /// Submitted iteration index
        iteration: u64,
        /// Last stored iteration index for the run key
        last: u64,
    },

    /// A conditional write lost a race
    #[error("Concurrent modification of {collection} document {id}\nRe-fetch the current state before retrying")]
    ConcurrentModification {
        /// Collection of the contended document
        collection: &'static str,
        /// Contended document id
        id: String,
    },

    /// Document store transport failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Document (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tracing subscriber could not be installed
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl Error {
    /// Whether the error came from the storage transport rather than the domain.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Whether repeating an idempotent operation (result submission, deletion)
    /// may succeed.
    ///
    /// Status updates are not idempotent; callers must re-fetch instead.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::ConcurrentModification { .. })
    }
}
