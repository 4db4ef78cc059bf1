//! Experiment Store - owns experiment documents and their lifecycle
//!
//! Every mutation is a single compare-and-swap against the version read
//! in the same call, so concurrent status updates on one experiment are
//! linearizable: at most one of two racing RUNNING -> terminal moves wins.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument};

use super::{Experiment, ExperimentId, ExperimentSpec, ExperimentStatus};
use crate::document::{encode, CasOutcome, Collection, DocumentStore};
use crate::id::IdAllocator;
use crate::{Error, Result};

/// Store for [`Experiment`] documents enforcing the status state machine.
pub struct ExperimentStore<S> {
    documents: Arc<S>,
    ids: Arc<dyn IdAllocator>,
}

impl<S> Clone for ExperimentStore<S> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            ids: Arc::clone(&self.ids),
        }
    }
}

fn not_found(id: &ExperimentId) -> Error {
    Error::NotFound {
        collection: Collection::Experiments.as_str(),
        id: id.to_string(),
    }
}

impl<S: DocumentStore> ExperimentStore<S> {
    /// Create a store over a shared document store.
    #[must_use]
    pub fn new(documents: Arc<S>, ids: Arc<dyn IdAllocator>) -> Self {
        Self { documents, ids }
    }

    /// Create a PENDING experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the budget is not positive.
    #[instrument(skip(self, spec), fields(budget = spec.budget()))]
    pub async fn create(&self, spec: ExperimentSpec) -> Result<Experiment> {
        let id = ExperimentId::new(self.ids.next_id());
        let experiment = Experiment::pending(id, spec, Utc::now())?;

        let inserted = self
            .documents
            .insert(
                Collection::Experiments,
                experiment.id().as_str(),
                encode(&experiment)?,
            )
            .await?;
        if !inserted {
            return Err(Error::Storage(format!(
                "identifier {} already allocated",
                experiment.id()
            )));
        }

        info!(experiment_id = %experiment.id(), "experiment created");
        Ok(experiment)
    }

    /// Get an experiment by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no experiment has this ID.
    pub async fn get(&self, id: &ExperimentId) -> Result<Experiment> {
        self.find(id).await?.ok_or_else(|| not_found(id))
    }

    /// Get an experiment by ID, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn find(&self, id: &ExperimentId) -> Result<Option<Experiment>> {
        Ok(self.load(id).await?.map(|(_, experiment)| experiment))
    }

    async fn load(&self, id: &ExperimentId) -> Result<Option<(u64, Experiment)>> {
        match self.documents.get(Collection::Experiments, id.as_str()).await? {
            Some(doc) => Ok(Some((doc.version, doc.decode()?))),
            None => Ok(None),
        }
    }

    /// Move an experiment to `status`.
    ///
    /// Entering FINISHED or FAILED sets the end time; entering FAILED records
    /// `error_message` (a default message if `None`).
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the experiment does not exist
    /// - [`Error::IllegalStateTransition`] if the move is not permitted
    /// - [`Error::Validation`] for an error message on a non-FAILED target, or
    ///   when starting an experiment without algorithms
    /// - [`Error::ConcurrentModification`] if the experiment changed between
    ///   read and write; re-fetch before deciding whether to retry
    #[instrument(skip(self, id, error_message), fields(experiment_id = %id))]
    pub async fn update_status(
        &self,
        id: &ExperimentId,
        status: ExperimentStatus,
        error_message: Option<String>,
    ) -> Result<Experiment> {
        let (version, current) = self.load(id).await?.ok_or_else(|| not_found(id))?;
        let next = current.transition(status, error_message, Utc::now())?;
        let next = self.replace(version, next).await?;

        info!(from = %current.status(), to = %status, "experiment status changed");
        Ok(next)
    }

    /// PENDING -> RUNNING.
    ///
    /// # Errors
    ///
    /// See [`ExperimentStore::update_status`].
    pub async fn start(&self, id: &ExperimentId) -> Result<Experiment> {
        self.update_status(id, ExperimentStatus::Running, None).await
    }

    /// RUNNING -> FINISHED.
    ///
    /// # Errors
    ///
    /// See [`ExperimentStore::update_status`].
    pub async fn finish(&self, id: &ExperimentId) -> Result<Experiment> {
        self.update_status(id, ExperimentStatus::Finished, None).await
    }

    /// RUNNING -> FAILED with a message.
    ///
    /// # Errors
    ///
    /// See [`ExperimentStore::update_status`].
    pub async fn fail(&self, id: &ExperimentId, message: impl Into<String>) -> Result<Experiment> {
        self.update_status(id, ExperimentStatus::Failed, Some(message.into()))
            .await
    }

    /// Replace the configuration of a PENDING experiment.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the experiment does not exist
    /// - [`Error::Validation`] if it already left PENDING or the budget is not positive
    /// - [`Error::ConcurrentModification`] on a lost race
    #[instrument(skip(self, id, spec), fields(experiment_id = %id))]
    pub async fn amend(&self, id: &ExperimentId, spec: ExperimentSpec) -> Result<Experiment> {
        let (version, current) = self.load(id).await?.ok_or_else(|| not_found(id))?;
        let next = current.amended(spec)?;
        self.replace(version, next).await
    }

    async fn replace(&self, expected_version: u64, next: Experiment) -> Result<Experiment> {
        let outcome = self
            .documents
            .compare_and_swap(
                Collection::Experiments,
                next.id().as_str(),
                expected_version,
                encode(&next)?,
            )
            .await?;

        match outcome {
            CasOutcome::Applied { .. } => Ok(next),
            CasOutcome::VersionMismatch { current } => {
                debug!(expected_version, current, "experiment changed concurrently");
                Err(Error::ConcurrentModification {
                    collection: Collection::Experiments.as_str(),
                    id: next.id().to_string(),
                })
            }
            CasOutcome::Missing => Err(not_found(next.id())),
        }
    }

    /// All experiments with `status`, in id order.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn list_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>> {
        self.documents
            .find_by_field(Collection::Experiments, "status", &json!(status.as_str()))
            .await?
            .iter()
            .map(|doc| doc.decode())
            .collect()
    }

    /// Delete the experiment document only.
    ///
    /// Results referencing it are left in place; use
    /// [`crate::coordinator::ConsistencyCoordinator::delete_experiment_and_results`]
    /// unless you know there are none. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns transport errors only.
    pub async fn delete(&self, id: &ExperimentId) -> Result<bool> {
        self.documents.delete(Collection::Experiments, id.as_str()).await
    }
}
