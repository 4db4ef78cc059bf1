//! Result Record - per run key iteration history

use serde::{Deserialize, Serialize};
use std::fmt;

use super::IterationResult;
use crate::experiment::ExperimentId;
use crate::{Error, Result};

/// Opaque result identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(String);

impl ResultId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one algorithm-vs-problem execution stream of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunKey {
    experiment_id: ExperimentId,
    algorithm: String,
    problem: String,
}

impl RunKey {
    /// Create a run key.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<ExperimentId>,
        algorithm: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            algorithm: algorithm.into(),
            problem: problem.into(),
        }
    }

    /// Get the experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> &ExperimentId {
        &self.experiment_id
    }

    /// Get the algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Get the problem name.
    #[must_use]
    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// Unambiguous encoding used as the run-key index document id.
    ///
    /// A JSON array, so names containing separators cannot collide.
    pub(crate) fn index_key(&self) -> Result<String> {
        Ok(serde_json::to_string(&[
            self.experiment_id.as_str(),
            self.algorithm.as_str(),
            self.problem.as_str(),
        ])?)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.experiment_id, self.algorithm, self.problem)
    }
}

/// What applying an iteration did to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    Appended,
    Duplicate,
}

/// Experiment Result holds the iteration history of one run key.
///
/// ## Invariants
///
/// - `iterations` is strictly increasing by iteration index
/// - `run_count` is positive and only changed by an explicit update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    id: ResultId,
    experiment_id: ExperimentId,
    algorithm: String,
    problem: String,
    iterations: Vec<IterationResult>,
    run_count: u32,
}

impl ExperimentResult {
    /// New result for `key` holding a single iteration, `run_count` 1.
    pub(crate) fn first(id: ResultId, key: &RunKey, iteration: IterationResult) -> Self {
        Self {
            id,
            experiment_id: key.experiment_id.clone(),
            algorithm: key.algorithm.clone(),
            problem: key.problem.clone(),
            iterations: vec![iteration],
            run_count: 1,
        }
    }

    /// Get the result ID.
    #[must_use]
    pub const fn id(&self) -> &ResultId {
        &self.id
    }

    /// Get the owning experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> &ExperimentId {
        &self.experiment_id
    }

    /// Get the algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Get the problem name.
    #[must_use]
    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// Get the iteration history, ascending by iteration index.
    #[must_use]
    pub fn iterations(&self) -> &[IterationResult] {
        &self.iterations
    }

    /// Get the number of independent runs aggregated into this record.
    #[must_use]
    pub const fn run_count(&self) -> u32 {
        self.run_count
    }

    /// Get the run key.
    #[must_use]
    pub fn run_key(&self) -> RunKey {
        RunKey::new(
            self.experiment_id.clone(),
            self.algorithm.clone(),
            self.problem.clone(),
        )
    }

    /// Get the highest recorded iteration index.
    #[must_use]
    pub fn last_iteration(&self) -> Option<u64> {
        self.iterations.last().map(IterationResult::iteration)
    }

    /// Get the checkpoint recorded for `iteration`.
    #[must_use]
    pub fn iteration(&self, iteration: u64) -> Option<&IterationResult> {
        self.iterations
            .binary_search_by_key(&iteration, IterationResult::iteration)
            .ok()
            .map(|idx| &self.iterations[idx])
    }

    /// Append `iteration` if it is past the end; leave the history untouched
    /// if that index is already recorded.
    pub(crate) fn apply(&mut self, iteration: IterationResult) -> Result<Applied> {
        match self.last_iteration() {
            Some(last) if iteration.iteration() <= last => {
                if self.iteration(iteration.iteration()).is_some() {
                    Ok(Applied::Duplicate)
                } else {
                    Err(Error::OutOfOrderIteration {
                        iteration: iteration.iteration(),
                        last,
                    })
                }
            }
            _ => {
                self.iterations.push(iteration);
                Ok(Applied::Appended)
            }
        }
    }

    pub(crate) fn set_run_count(&mut self, run_count: u32) {
        self.run_count = run_count;
    }
}
