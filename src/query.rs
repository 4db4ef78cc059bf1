//! Query Facade - read-side access patterns over both stores

use serde::Serialize;

use crate::document::DocumentStore;
use crate::experiment::{Experiment, ExperimentId, ExperimentStatus, ExperimentStore};
use crate::result::{ExperimentResult, ResultStore, RunKey};
use crate::Result;

/// An experiment together with all of its results, for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentReport {
    /// The experiment.
    pub experiment: Experiment,
    /// Its results, in id order.
    pub results: Vec<ExperimentResult>,
}

/// Read-only composition of [`ExperimentStore`] and [`ResultStore`].
pub struct QueryFacade<S> {
    experiments: ExperimentStore<S>,
    results: ResultStore<S>,
}

impl<S> Clone for QueryFacade<S> {
    fn clone(&self) -> Self {
        Self {
            experiments: self.experiments.clone(),
            results: self.results.clone(),
        }
    }
}

impl<S: DocumentStore> QueryFacade<S> {
    /// Create a facade over stores sharing one document store.
    #[must_use]
    pub const fn new(experiments: ExperimentStore<S>, results: ResultStore<S>) -> Self {
        Self {
            experiments,
            results,
        }
    }

    /// Experiments with `status`, in id order.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn experiments_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>> {
        self.experiments.list_by_status(status).await
    }

    /// Results of one experiment, in id order.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn results_for_experiment(&self, id: &ExperimentId) -> Result<Vec<ExperimentResult>> {
        self.results.find_by_experiment(id).await
    }

    /// The result of one run key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if nothing was recorded for `key`.
    pub async fn results_for_run_key(&self, key: &RunKey) -> Result<ExperimentResult> {
        self.results.find_by_run_key(key).await
    }

    /// Results of one algorithm across all experiments, in id order.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding errors only.
    pub async fn results_for_algorithm(&self, algorithm: &str) -> Result<Vec<ExperimentResult>> {
        self.results.find_by_algorithm(algorithm).await
    }

    /// An experiment with its results.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the experiment does not exist.
    pub async fn experiment_report(&self, id: &ExperimentId) -> Result<ExperimentReport> {
        let experiment = self.experiments.get(id).await?;
        let results = self.results.find_by_experiment(id).await?;
        Ok(ExperimentReport {
            experiment,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExperimentSpec, MetricKind};
    use crate::result::IterationResult;
    use crate::Tracker;

    #[tokio::test]
    async fn test_report_combines_experiment_and_results() {
        let tracker = Tracker::builder().id_prefix("q").build_in_memory().unwrap();
        let experiment = tracker
            .experiments()
            .create(ExperimentSpec::new(100).algorithm("VEGA").problem("ZDT1"))
            .await
            .unwrap();
        let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
        tracker
            .coordinator()
            .submit_result(
                &key,
                IterationResult::new(1).with_metric(MetricKind::Hypervolume, 0.5),
            )
            .await
            .unwrap();

        let report = tracker.queries().experiment_report(experiment.id()).await.unwrap();
        assert_eq!(report.experiment, experiment);
        assert_eq!(report.results.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["algorithm"], "VEGA");
    }

    #[tokio::test]
    async fn test_report_for_missing_experiment() {
        let tracker = Tracker::builder().build_in_memory().unwrap();
        let err = tracker
            .queries()
            .experiment_report(&ExperimentId::new("none"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_results_for_algorithm_spans_experiments() {
        let tracker = Tracker::builder().build_in_memory().unwrap();
        let queries = tracker.queries();
        for _ in 0..2 {
            let experiment = tracker
                .experiments()
                .create(ExperimentSpec::new(10).algorithm("VEGA").algorithm("AMOSA"))
                .await
                .unwrap();
            for algorithm in ["VEGA", "AMOSA"] {
                let key = RunKey::new(experiment.id().clone(), algorithm, "ZDT1");
                tracker
                    .coordinator()
                    .submit_result(&key, IterationResult::new(0))
                    .await
                    .unwrap();
            }
        }

        let vega = queries.results_for_algorithm("VEGA").await.unwrap();
        assert_eq!(vega.len(), 2);
        assert!(vega.iter().all(|r| r.algorithm() == "VEGA"));
        assert!(queries.results_for_algorithm("NSGAII").await.unwrap().is_empty());
    }
}
