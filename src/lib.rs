//! # moea-tracker: Experiment Tracking for Multi-Objective Optimization
//!
//! **Version**: 0.1.0
//!
//! moea-tracker is the persistence and consistency layer behind
//! multi-objective optimization experiments: experiments run algorithms
//! against benchmark problems, and independent workers submit per-iteration
//! quality metrics concurrently.
//!
//! The underlying document store only offers per-document atomic writes, so
//! the invariants a relational schema would enforce are enforced here.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: Status moves go through a closed state machine with
//!   compare-and-swap, so two workers cannot both close an experiment
//! - **Jidoka**: Results are checked against their experiment before every
//!   write; closed experiments reject submissions immediately
//! - **Heijunka**: Retried submissions are idempotent, so at-least-once
//!   producers never need to coordinate
//!
//! ## Example Usage
//!
//! ```rust
//! use moea_tracker::experiment::{ExperimentSpec, MetricKind};
//! use moea_tracker::result::{IterationResult, RunKey};
//! use moea_tracker::Tracker;
//!
//! # async fn example() -> moea_tracker::Result<()> {
//! let tracker = Tracker::builder().conflict_retries(32).build_in_memory()?;
//!
//! let experiment = tracker
//!     .experiments()
//!     .create(ExperimentSpec::new(1000).algorithm("VEGA").problem("ZDT1"))
//!     .await?;
//! tracker.experiments().start(experiment.id()).await?;
//!
//! let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
//! let checkpoint = IterationResult::new(1).with_metric(MetricKind::GenerationalDistance, 0.12);
//! tracker.coordinator().submit_result(&key, checkpoint).await?;
//!
//! tracker.experiments().finish(experiment.id()).await?;
//! tracker.coordinator().delete_experiment_and_results(experiment.id()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod experiment;
pub mod id;
pub mod query;
pub mod result;
pub mod telemetry;

use std::sync::Arc;

pub use config::TrackerConfig;
pub use error::{Error, Result};

use coordinator::ConsistencyCoordinator;
use document::{DocumentStore, MemoryDocumentStore};
use experiment::ExperimentStore;
use id::IdAllocator;
use query::QueryFacade;
use result::ResultStore;

/// Tracker instance: every component wired onto one shared document store.
pub struct Tracker<S = MemoryDocumentStore> {
    documents: Arc<S>,
    experiments: ExperimentStore<S>,
    results: ResultStore<S>,
    coordinator: ConsistencyCoordinator<S>,
    queries: QueryFacade<S>,
}

impl Tracker {
    /// Create a new tracker builder
    #[must_use]
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::default()
    }
}

impl<S: DocumentStore> Tracker<S> {
    /// Experiment lifecycle operations.
    #[must_use]
    pub const fn experiments(&self) -> &ExperimentStore<S> {
        &self.experiments
    }

    /// Result operations without experiment checks.
    #[must_use]
    pub const fn results(&self) -> &ResultStore<S> {
        &self.results
    }

    /// Checked result submission and cascading delete.
    #[must_use]
    pub const fn coordinator(&self) -> &ConsistencyCoordinator<S> {
        &self.coordinator
    }

    /// Read-side queries.
    #[must_use]
    pub const fn queries(&self) -> &QueryFacade<S> {
        &self.queries
    }

    /// The shared document store.
    #[must_use]
    pub const fn documents(&self) -> &Arc<S> {
        &self.documents
    }
}

/// Tracker builder
#[derive(Default)]
pub struct TrackerBuilder {
    config: TrackerConfig,
    ids: Option<Arc<dyn IdAllocator>>,
}

impl TrackerBuilder {
    /// Replace the whole configuration
    #[must_use]
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set attempts for conditional writes under contention
    #[must_use]
    pub fn conflict_retries(mut self, retries: u32) -> Self {
        self.config.conflict_retries = retries;
        self
    }

    /// Set pre-allocated capacity of the in-memory store
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Use deterministic `<prefix>-<counter>` identifiers
    #[must_use]
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.id_prefix = Some(prefix.into());
        self
    }

    /// Use a custom identifier allocator (overrides `id_prefix`)
    #[must_use]
    pub fn id_allocator(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Build the tracker over an existing document store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the configuration is invalid
    pub fn build<S: DocumentStore>(self, documents: Arc<S>) -> Result<Tracker<S>> {
        self.config.validate()?;
        let ids = self.ids.unwrap_or_else(|| self.config.id_allocator());

        let experiments = ExperimentStore::new(Arc::clone(&documents), Arc::clone(&ids));
        let results = ResultStore::new(Arc::clone(&documents), ids, self.config.conflict_retries);

        Ok(Tracker {
            coordinator: ConsistencyCoordinator::new(experiments.clone(), results.clone()),
            queries: QueryFacade::new(experiments.clone(), results.clone()),
            documents,
            experiments,
            results,
        })
    }

    /// Build the tracker over a fresh in-memory document store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the configuration is invalid
    pub fn build_in_memory(self) -> Result<Tracker<MemoryDocumentStore>> {
        let documents = Arc::new(MemoryDocumentStore::with_capacity(self.config.initial_capacity));
        self.build(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Collection;
    use crate::experiment::{ExperimentSpec, ExperimentStatus};
    use crate::id::SequentialAllocator;

    #[test]
    fn test_builder_rejects_invalid_config() {
        let err = Tracker::builder().conflict_retries(0).build_in_memory().err();
        assert!(matches!(err, Some(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_components_share_store() {
        let tracker = Tracker::builder()
            .id_allocator(Arc::new(SequentialAllocator::new("t")))
            .build_in_memory()
            .unwrap();

        let experiment = tracker
            .experiments()
            .create(ExperimentSpec::new(1))
            .await
            .unwrap();
        assert_eq!(experiment.id().as_str(), "t-00000000000000000001");

        let listed = tracker
            .queries()
            .experiments_by_status(ExperimentStatus::Pending)
            .await
            .unwrap();
        assert_eq!(listed, vec![experiment]);
        assert_eq!(tracker.documents().len(Collection::Experiments), 1);
    }

    mod spans {
        use std::sync::{Arc, Mutex};

        use tracing::span;
        use tracing::Subscriber;
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

        use crate::experiment::{ExperimentSpec, ExperimentStatus};
        use crate::result::{IterationResult, RunKey};
        use crate::Tracker;

        type Recorded = Arc<Mutex<Vec<(&'static str, Vec<&'static str>)>>>;

        /// Records the declared field names of every new span.
        struct FieldNames(Recorded);

        impl<S: Subscriber> Layer<S> for FieldNames {
            fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
                let metadata = attrs.metadata();
                let names = metadata.fields().iter().map(|f| f.name()).collect();
                self.0.lock().unwrap().push((metadata.name(), names));
            }
        }

        #[tokio::test]
        async fn test_span_fields_are_recorded_once() {
            let recorded = Recorded::default();
            let subscriber = tracing_subscriber::registry().with(FieldNames(Arc::clone(&recorded)));
            let _guard = tracing::subscriber::set_default(subscriber);

            let tracker = Tracker::builder().id_prefix("s").build_in_memory().unwrap();
            let experiment = tracker
                .experiments()
                .create(ExperimentSpec::new(10).algorithm("VEGA"))
                .await
                .unwrap();
            let id = experiment.id();
            tracker.experiments().amend(id, ExperimentSpec::new(20).algorithm("VEGA")).await.unwrap();
            tracker
                .experiments()
                .update_status(id, ExperimentStatus::Running, None)
                .await
                .unwrap();
            let key = RunKey::new(id.clone(), "VEGA", "ZDT1");
            tracker.coordinator().submit_result(&key, IterationResult::new(1)).await.unwrap();
            tracker.coordinator().record_run_count(&key, 3).await.unwrap();
            tracker.coordinator().delete_experiment_and_results(id).await.unwrap();

            let recorded = recorded.lock().unwrap();
            for name in [
                "amend",
                "update_status",
                "submit_result",
                "upsert_iteration",
                "record_run_count",
                "set_run_count",
                "delete_experiment_and_results",
                "delete_by_experiment",
            ] {
                let (_, fields) = recorded
                    .iter()
                    .find(|(span, _)| *span == name)
                    .unwrap_or_else(|| panic!("no {name} span"));
                assert!(
                    fields.contains(&"run_key") || fields.contains(&"experiment_id"),
                    "{name}: {fields:?}"
                );
                for duplicate in ["key", "id"] {
                    assert!(!fields.contains(&duplicate), "{name} records {duplicate}: {fields:?}");
                }
            }
        }
    }
}
