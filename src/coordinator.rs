//! Consistency Coordinator - cross-entity invariants
//!
//! The document store has no foreign keys and no cascades, so the two
//! cross-entity rules are enforced here:
//!
//! - **Referential integrity at write time**: a result is only written after
//!   the owning experiment was read back and found open, and the experiment is
//!   read again after the write. A submission that lost a race with a delete
//!   withdraws the results it left behind.
//! - **Cascading delete by ordering**: dependents are deleted before the owner,
//!   and swept once more after it. An interruption can then only leave an
//!   experiment without results, never results without an experiment, and
//!   repeating the call converges.
//!
//! The two sides cover each other: a result written before the experiment
//! document disappears is caught by the deleter's final sweep, one written
//! after it is caught by the submitter's re-read.

use tracing::{info, instrument, warn};

use crate::document::DocumentStore;
use crate::experiment::{Experiment, ExperimentId, ExperimentStore};
use crate::result::{ExperimentResult, IterationResult, ResultStore, RunKey};
use crate::{Error, Result};

/// What a cascading delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletionReport {
    /// Result documents removed by this call.
    pub results_removed: usize,
    /// Whether this call removed the experiment document.
    pub experiment_removed: bool,
}

impl DeletionReport {
    /// Whether the call found nothing left to delete.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.results_removed == 0 && !self.experiment_removed
    }
}

/// Routes writes that span experiments and results.
pub struct ConsistencyCoordinator<S> {
    experiments: ExperimentStore<S>,
    results: ResultStore<S>,
}

impl<S> Clone for ConsistencyCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            experiments: self.experiments.clone(),
            results: self.results.clone(),
        }
    }
}

impl<S: DocumentStore> ConsistencyCoordinator<S> {
    /// Create a coordinator over stores sharing one document store.
    #[must_use]
    pub const fn new(experiments: ExperimentStore<S>, results: ResultStore<S>) -> Self {
        Self {
            experiments,
            results,
        }
    }

    /// Record an iteration for a run key of an open experiment.
    ///
    /// PENDING and RUNNING experiments accept results.
    ///
    /// # Errors
    ///
    /// - [`Error::ExperimentNotFound`] if the experiment does not exist
    /// - [`Error::ExperimentClosed`] if it is FINISHED or FAILED
    /// - everything [`ResultStore::upsert_iteration`] returns
    ///
    /// If the experiment is deleted while the write is in flight, the results
    /// of that experiment are removed again and [`Error::ExperimentNotFound`]
    /// is returned. An experiment closed while the write is in flight keeps
    /// the iteration: the submission is ordered before the close.
    #[instrument(skip(self, key, iteration), fields(run_key = %key, iteration = iteration.iteration()))]
    pub async fn submit_result(
        &self,
        key: &RunKey,
        iteration: IterationResult,
    ) -> Result<ExperimentResult> {
        self.ensure_open(key.experiment_id()).await?;
        let result = self.results.upsert_iteration(key, iteration).await?;
        self.ensure_still_present(key.experiment_id()).await?;
        Ok(result)
    }

    /// Set the run count of a run key of an open experiment.
    ///
    /// # Errors
    ///
    /// Same experiment checks as [`ConsistencyCoordinator::submit_result`],
    /// then everything [`ResultStore::set_run_count`] returns.
    #[instrument(skip(self, key), fields(run_key = %key))]
    pub async fn record_run_count(&self, key: &RunKey, run_count: u32) -> Result<ExperimentResult> {
        self.ensure_open(key.experiment_id()).await?;
        let result = self.results.set_run_count(key, run_count).await?;
        self.ensure_still_present(key.experiment_id()).await?;
        Ok(result)
    }

    async fn ensure_open(&self, id: &ExperimentId) -> Result<Experiment> {
        let experiment = self
            .experiments
            .find(id)
            .await?
            .ok_or_else(|| Error::ExperimentNotFound(id.to_string()))?;

        if experiment.status().is_terminal() {
            return Err(Error::ExperimentClosed {
                id: id.to_string(),
                status: experiment.status(),
            });
        }
        Ok(experiment)
    }

    /// Withdraw results written for an experiment deleted after `ensure_open`.
    async fn ensure_still_present(&self, id: &ExperimentId) -> Result<()> {
        if self.experiments.find(id).await?.is_some() {
            return Ok(());
        }
        let withdrawn = self.results.delete_by_experiment(id).await?;
        warn!(withdrawn, "experiment deleted during submission; results withdrawn");
        Err(Error::ExperimentNotFound(id.to_string()))
    }

    /// Delete an experiment and every result referencing it.
    ///
    /// Results go first, then the experiment, then results written by
    /// submissions that were already past their existence check. After a
    /// successful return no result references the experiment. Calling this
    /// again after a success is a no-op returning an empty report.
    ///
    /// # Errors
    ///
    /// Returns transport errors from any step. If a step fails after results
    /// were removed, the call is safe to repeat.
    #[instrument(skip(self, id), fields(experiment_id = %id))]
    pub async fn delete_experiment_and_results(&self, id: &ExperimentId) -> Result<DeletionReport> {
        let results_removed = self.results.delete_by_experiment(id).await?;

        let experiment_removed = match self.experiments.delete(id).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(
                    results_removed,
                    error = %err,
                    "results deleted but experiment delete failed; retry to converge"
                );
                return Err(err);
            }
        };
        let stragglers = self.results.delete_by_experiment(id).await?;

        let report = DeletionReport {
            results_removed: results_removed + stragglers,
            experiment_removed,
        };
        if !report.is_noop() {
            info!(results_removed, experiment_removed, "experiment deleted with results");
        }
        Ok(report)
    }

    /// Get the experiment store.
    #[must_use]
    pub const fn experiments(&self) -> &ExperimentStore<S> {
        &self.experiments
    }

    /// Get the result store.
    #[must_use]
    pub const fn results(&self) -> &ResultStore<S> {
        &self.results
    }
}
