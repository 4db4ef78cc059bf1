//! Experiment Results
//!
//! One [`ExperimentResult`] per run key `(experiment, algorithm, problem)`,
//! holding an append-only [`IterationResult`] history.
//!
//! ## Usage
//!
//! ```rust
//! use moea_tracker::experiment::MetricKind;
//! use moea_tracker::result::{IterationResult, RunKey};
//! use moea_tracker::Tracker;
//!
//! # async fn example() -> moea_tracker::Result<()> {
//! let tracker = Tracker::builder().build_in_memory()?;
//! let key = RunKey::new("exp-1", "VEGA", "ZDT1");
//!
//! let checkpoint = IterationResult::new(1).with_metric(MetricKind::GenerationalDistance, 0.12);
//! let result = tracker.results().upsert_iteration(&key, checkpoint.clone()).await?;
//!
//! // Retried submissions are no-ops
//! let retried = tracker.results().upsert_iteration(&key, checkpoint).await?;
//! assert_eq!(result, retried);
//! # Ok(())
//! # }
//! ```

mod iteration_record;
mod result_record;
mod store;

pub use iteration_record::IterationResult;
pub(crate) use result_record::Applied;
pub use result_record::{ExperimentResult, ResultId, RunKey};
pub use store::ResultStore;
