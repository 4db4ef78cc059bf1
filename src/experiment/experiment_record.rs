//! Experiment Record - root entity for experiment tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::{ExperimentStatus, MetricKind};
use crate::{Error, Result};

/// Error message recorded when an experiment is failed without one.
pub const DEFAULT_FAILURE_MESSAGE: &str = "experiment failed";

/// Opaque, immutable experiment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

impl ExperimentId {
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

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExperimentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ExperimentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Caller-supplied configuration of an experiment.
///
/// Used for [`crate::experiment::ExperimentStore::create`] and, while the
/// experiment is still PENDING, [`crate::experiment::ExperimentStore::amend`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentSpec {
    algorithms: BTreeSet<String>,
    problems: BTreeSet<String>,
    metrics: BTreeSet<MetricKind>,
    budget: i64,
}

impl ExperimentSpec {
    /// Create a spec with the given evaluation budget and no algorithms,
    /// problems or metrics.
    #[must_use]
    pub fn new(budget: i64) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    /// Add an algorithm.
    #[must_use]
    pub fn algorithm(mut self, name: impl Into<String>) -> Self {
        self.algorithms.insert(name.into());
        self
    }

    /// Add a problem.
    #[must_use]
    pub fn problem(mut self, name: impl Into<String>) -> Self {
        self.problems.insert(name.into());
        self
    }

    /// Add a metric.
    #[must_use]
    pub fn metric(mut self, kind: MetricKind) -> Self {
        self.metrics.insert(kind);
        self
    }

    /// Get the evaluation budget.
    #[must_use]
    pub const fn budget(&self) -> i64 {
        self.budget
    }

    /// Get the algorithm names.
    #[must_use]
    pub const fn algorithms(&self) -> &BTreeSet<String> {
        &self.algorithms
    }

    /// Get the problem names.
    #[must_use]
    pub const fn problems(&self) -> &BTreeSet<String> {
        &self.problems
    }

    /// Get the metric kinds.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeSet<MetricKind> {
        &self.metrics
    }

    /// Check the budget and names, returning the budget as unsigned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the budget is not positive or a name is blank.
    pub fn validate(&self) -> Result<u64> {
        let budget = u64::try_from(self.budget)
            .ok()
            .filter(|budget| *budget > 0)
            .ok_or_else(|| Error::Validation(format!("budget must be positive, got {}", self.budget)))?;

        if let Some(blank) = self
            .algorithms
            .iter()
            .chain(&self.problems)
            .find(|name| name.trim().is_empty())
        {
            return Err(Error::Validation(format!("blank algorithm or problem name: {blank:?}")));
        }

        Ok(budget)
    }
}

/// Experiment Record represents a configured optimization study.
///
/// This is the root entity in the tracking schema. Each experiment owns
/// zero or more [`crate::result::ExperimentResult`]s by reference.
///
/// ## Invariants
///
/// - `end_time` is set iff the status is terminal
/// - `error_message` is set only if the status is FAILED
/// - `budget` is positive and frozen once the status leaves PENDING
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    id: ExperimentId,
    algorithms: BTreeSet<String>,
    problems: BTreeSet<String>,
    metrics: BTreeSet<MetricKind>,
    budget: u64,
    status: ExperimentStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl Experiment {
    /// Create a PENDING experiment from a validated spec.
    pub(crate) fn pending(id: ExperimentId, spec: ExperimentSpec, start_time: DateTime<Utc>) -> Result<Self> {
        let budget = spec.validate()?;
        Ok(Self {
            id,
            algorithms: spec.algorithms,
            problems: spec.problems,
            metrics: spec.metrics,
            budget,
            status: ExperimentStatus::Pending,
            start_time,
            end_time: None,
            error_message: None,
        })
    }

    /// Get the experiment ID.
    #[must_use]
    pub const fn id(&self) -> &ExperimentId {
        &self.id
    }

    /// Get the algorithm names.
    #[must_use]
    pub const fn algorithms(&self) -> &BTreeSet<String> {
        &self.algorithms
    }

    /// Get the problem names.
    #[must_use]
    pub const fn problems(&self) -> &BTreeSet<String> {
        &self.problems
    }

    /// Get the metric kinds to be computed.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeSet<MetricKind> {
        &self.metrics
    }

    /// Get the evaluation budget per run.
    #[must_use]
    pub const fn budget(&self) -> u64 {
        self.budget
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Get the end timestamp, if the experiment is finished or failed.
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Get the failure message, if the experiment failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Compute the record after moving to `to`.
    ///
    /// `error_message` is only accepted when `to` is FAILED, where a missing
    /// message is replaced by [`DEFAULT_FAILURE_MESSAGE`].
    pub(crate) fn transition(
        &self,
        to: ExperimentStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !self.status.can_transition_to(to) {
            return Err(Error::IllegalStateTransition {
                from: self.status,
                to,
            });
        }
        if to == ExperimentStatus::Running && self.algorithms.is_empty() {
            return Err(Error::Validation(format!(
                "experiment {} cannot start without algorithms",
                self.id
            )));
        }
        let error_message = match (to, error_message) {
            (ExperimentStatus::Failed, message) => {
                Some(message.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()))
            }
            (_, Some(_)) => {
                return Err(Error::Validation(format!(
                    "error message is only accepted when failing an experiment, not for {to}"
                )))
            }
            (_, None) => None,
        };

        Ok(Self {
            status: to,
            end_time: to.is_terminal().then_some(now),
            error_message,
            ..self.clone()
        })
    }

    /// Compute the record with its configuration replaced by `spec`.
    pub(crate) fn amended(&self, spec: ExperimentSpec) -> Result<Self> {
        if self.status != ExperimentStatus::Pending {
            return Err(Error::Validation(format!(
                "experiment {} is {}; configuration is frozen once it leaves PENDING",
                self.id, self.status
            )));
        }
        let budget = spec.validate()?;
        Ok(Self {
            algorithms: spec.algorithms,
            problems: spec.problems,
            metrics: spec.metrics,
            budget,
            ..self.clone()
        })
    }
}
