//! Result Store - append-only iteration history per run key
//!
//! ## Run-key uniqueness
//!
//! The document store only enforces uniqueness of document ids, so each run
//! key is claimed through an index document in [`Collection::RunKeys`] whose
//! id is the canonical run-key encoding and whose body names the result id.
//! The claim is written before the result document; a claim whose result is
//! missing (writer interrupted in between) is materialized by the next upsert.
//!
//! ## Per-key serialization
//!
//! Appends read the result with its version, apply the iteration rule, and
//! write back with compare-and-swap. A lost race re-reads and re-applies the
//! rule, so every writer observes a consistent "last iteration".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::{Applied, ExperimentResult, IterationResult, ResultId, RunKey};
use crate::document::{encode, CasOutcome, Collection, DocumentStore, StoredDocument};
use crate::experiment::ExperimentId;
use crate::id::IdAllocator;
use crate::{Error, Result};

/// Run-key index entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunKeyEntry {
    experiment_id: ExperimentId,
    result_id: ResultId,
}

/// Store for [`ExperimentResult`] documents.
///
/// Never checks that the referenced experiment exists; that is the job of
/// [`crate::coordinator::ConsistencyCoordinator`].
pub struct ResultStore<S> {
    documents: Arc<S>,
    ids: Arc<dyn IdAllocator>,
    conflict_retries: u32,
}

impl<S> Clone for ResultStore<S> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            ids: Arc::clone(&self.ids),
            conflict_retries: self.conflict_retries,
        }
    }
}

fn not_found(key: &RunKey) -> Error {
    Error::NotFound {
        collection: Collection::Results.as_str(),
        id: key.to_string(),
    }
}

fn contended(key: &RunKey) -> Error {
    Error::ConcurrentModification {
        collection: Collection::Results.as_str(),
        id: key.to_string(),
    }
}

impl<S: DocumentStore> ResultStore<S> {
    /// Create a store over a shared document store.
    ///
    /// `conflict_retries` bounds how many times a write re-reads after losing
    /// a compare-and-swap race (minimum 1 attempt).
    #[must_use]
    pub fn new(documents: Arc<S>, ids: Arc<dyn IdAllocator>, conflict_retries: u32) -> Self {
        Self {
            documents,
            ids,
            conflict_retries: conflict_retries.max(1),
        }
    }

    /// Record `iteration` for `key`.
    ///
    /// - no result for the key yet: create it with this iteration, run count 1
    /// - iteration past the last recorded one: append
    /// - iteration already recorded: return the stored state unchanged
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfOrderIteration`] for an unrecorded index below the last one
    /// - [`Error::Validation`] for non-finite metric values
    /// - [`Error::ConcurrentModification`] if every attempt lost a race
    #[instrument(skip(self, key, iteration), fields(run_key = %key, iteration = iteration.iteration()))]
    pub async fn upsert_iteration(
        &self,
        key: &RunKey,
        iteration: IterationResult,
    ) -> Result<ExperimentResult> {
        iteration.validate()?;
        let index_key = key.index_key()?;

        for attempt in 1..=self.conflict_retries {
            let Some(result_id) = self.indexed_id(&index_key).await? else {
                if let Some(created) = self.claim(key, &index_key, &iteration).await? {
                    return Ok(created);
                }
                debug!(attempt, "run key claimed concurrently");
                continue;
            };

            let Some(stored) = self.documents.get(Collection::Results, result_id.as_str()).await? else {
                if let Some(created) = self.materialize(result_id, key, &iteration).await? {
                    return Ok(created);
                }
                debug!(attempt, "result materialized concurrently");
                continue;
            };

            let mut result: ExperimentResult = stored.decode()?;
            if result.apply(iteration.clone())? == Applied::Duplicate {
                debug!("iteration already recorded");
                return Ok(result);
            }

            if self.write_back(&stored, &result, attempt).await? {
                return Ok(result);
            }
        }

        warn!(retries = self.conflict_retries, "giving up after repeated append conflicts");
        Err(contended(key))
    }

    /// Set the number of independent runs aggregated into the result for `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `run_count` is zero
    /// - [`Error::NotFound`] if nothing was recorded for `key`
    /// - [`Error::ConcurrentModification`] if every attempt lost a race
    #[instrument(skip(self, key), fields(run_key = %key))]
    pub async fn set_run_count(&self, key: &RunKey, run_count: u32) -> Result<ExperimentResult> {
        if run_count == 0 {
            return Err(Error::Validation("run count must be positive".into()));
        }
        let index_key = key.index_key()?;

        for attempt in 1..=self.conflict_retries {
            let stored = self.locate(&index_key).await?.ok_or_else(|| not_found(key))?;
            let mut result: ExperimentResult = stored.decode()?;
            if result.run_count() == run_count {
                return Ok(result);
            }
            result.set_run_count(run_count);

            if self.write_back(&stored, &result, attempt).await? {
                return Ok(result);
            }
        }

        Err(contended(key))
    }

    /// All results of an experiment, in id order.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn find_by_experiment(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentResult>> {
        self.find_where("experimentId", json!(experiment_id.as_str())).await
    }

    /// All results for an algorithm across experiments, in id order.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn find_by_algorithm(&self, algorithm: &str) -> Result<Vec<ExperimentResult>> {
        self.find_where("algorithm", json!(algorithm)).await
    }

    /// The result for one run key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing was recorded for `key`.
    pub async fn find_by_run_key(&self, key: &RunKey) -> Result<ExperimentResult> {
        self.locate(&key.index_key()?)
            .await?
            .ok_or_else(|| not_found(key))?
            .decode()
    }

    /// Remove every result of an experiment along with its run-key claims.
    ///
    /// Returns the number of result documents removed. Removing from an
    /// experiment with no results is a no-op.
    ///
    /// # Errors
    ///
    /// Returns transport errors; the call can be repeated to finish a
    /// partially applied delete.
    #[instrument(skip(self, experiment_id), fields(experiment_id = %experiment_id))]
    pub async fn delete_by_experiment(&self, experiment_id: &ExperimentId) -> Result<usize> {
        let owner = json!(experiment_id.as_str());
        let removed = self
            .documents
            .delete_by_field(Collection::Results, "experimentId", &owner)
            .await?;
        let released = self
            .documents
            .delete_by_field(Collection::RunKeys, "experimentId", &owner)
            .await?;

        debug!(removed, released, "results deleted");
        Ok(removed)
    }

    async fn find_where(&self, field: &str, value: serde_json::Value) -> Result<Vec<ExperimentResult>> {
        self.documents
            .find_by_field(Collection::Results, field, &value)
            .await?
            .iter()
            .map(StoredDocument::decode)
            .collect()
    }

    async fn indexed_id(&self, index_key: &str) -> Result<Option<ResultId>> {
        match self.documents.get(Collection::RunKeys, index_key).await? {
            Some(doc) => Ok(Some(doc.decode::<RunKeyEntry>()?.result_id)),
            None => Ok(None),
        }
    }

    async fn locate(&self, index_key: &str) -> Result<Option<StoredDocument>> {
        match self.indexed_id(index_key).await? {
            Some(result_id) => self.documents.get(Collection::Results, result_id.as_str()).await,
            None => Ok(None),
        }
    }

    /// Claim the run key for a fresh result id, then create the result.
    /// `None` if another writer claimed the key first.
    async fn claim(
        &self,
        key: &RunKey,
        index_key: &str,
        iteration: &IterationResult,
    ) -> Result<Option<ExperimentResult>> {
        let entry = RunKeyEntry {
            experiment_id: key.experiment_id().clone(),
            result_id: ResultId::new(self.ids.next_id()),
        };
        if !self
            .documents
            .insert(Collection::RunKeys, index_key, encode(&entry)?)
            .await?
        {
            return Ok(None);
        }
        self.materialize(entry.result_id, key, iteration).await
    }

    /// Create the result document for an already claimed id.
    /// `None` if it was created concurrently.
    async fn materialize(
        &self,
        result_id: ResultId,
        key: &RunKey,
        iteration: &IterationResult,
    ) -> Result<Option<ExperimentResult>> {
        let result = ExperimentResult::first(result_id, key, iteration.clone());
        let inserted = self
            .documents
            .insert(Collection::Results, result.id().as_str(), encode(&result)?)
            .await?;
        if inserted {
            info!(result_id = %result.id(), "result created");
            Ok(Some(result))
        } else {
            Ok(None)
        }
    }

    async fn write_back(&self, stored: &StoredDocument, result: &ExperimentResult, attempt: u32) -> Result<bool> {
        let outcome = self
            .documents
            .compare_and_swap(Collection::Results, &stored.id, stored.version, encode(result)?)
            .await?;
        match outcome {
            CasOutcome::Applied { .. } => Ok(true),
            CasOutcome::VersionMismatch { current } => {
                debug!(attempt, expected = stored.version, current, "lost result write race");
                Ok(false)
            }
            CasOutcome::Missing => {
                debug!(attempt, "result removed concurrently");
                Ok(false)
            }
        }
    }
}
