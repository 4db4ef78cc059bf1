//! Iteration Record - one checkpoint of metric values within a run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::experiment::MetricKind;
use crate::{Error, Result};

/// Metric values reported at one iteration of an algorithm/problem run.
///
/// Reporting is partial by design: a checkpoint may carry only some of the
/// experiment's declared metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    iteration: u64,
    metric_values: BTreeMap<MetricKind, f64>,
}

impl IterationResult {
    /// Create a checkpoint with no metric values.
    #[must_use]
    pub const fn new(iteration: u64) -> Self {
        Self {
            iteration,
            metric_values: BTreeMap::new(),
        }
    }

    /// Set the value of one metric, replacing any earlier value for it.
    #[must_use]
    pub fn with_metric(mut self, kind: MetricKind, value: f64) -> Self {
        self.metric_values.insert(kind, value);
        self
    }

    /// Get the iteration index.
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Get all metric values.
    #[must_use]
    pub const fn metric_values(&self) -> &BTreeMap<MetricKind, f64> {
        &self.metric_values
    }

    /// Get the value of one metric.
    #[must_use]
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.metric_values.get(&kind).copied()
    }

    /// Reject values that cannot be stored.
    ///
    /// JSON has no NaN or infinity, so a non-finite value would not survive
    /// a round-trip through the document store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first non-finite metric.
    pub fn validate(&self) -> Result<()> {
        match self.metric_values.iter().find(|(_, value)| !value.is_finite()) {
            Some((kind, value)) => Err(Error::Validation(format!(
                "metric {kind} at iteration {} is not finite: {value}",
                self.iteration
            ))),
            None => Ok(()),
        }
    }
}
