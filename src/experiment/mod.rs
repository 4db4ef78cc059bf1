//! Experiment Tracking Schema
//!
//! Experiments are the owning side of the schema:
//!
//! ```text
//! Experiment (1) ──< ExperimentResult (N)   [one per run key]
//!                        │
//!                        └──< IterationResult (N) [append-only, by iteration]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use moea_tracker::experiment::{ExperimentSpec, ExperimentStatus, MetricKind};
//! use moea_tracker::Tracker;
//!
//! # async fn example() -> moea_tracker::Result<()> {
//! let tracker = Tracker::builder().build_in_memory()?;
//!
//! let experiment = tracker
//!     .experiments()
//!     .create(
//!         ExperimentSpec::new(1000)
//!             .algorithm("VEGA")
//!             .problem("ZDT1")
//!             .metric(MetricKind::GenerationalDistance),
//!     )
//!     .await?;
//! assert_eq!(experiment.status(), ExperimentStatus::Pending);
//!
//! tracker.experiments().start(experiment.id()).await?;
//! # Ok(())
//! # }
//! ```

mod experiment_record;
mod metric_kind;
mod status;
mod store;

pub use experiment_record::{Experiment, ExperimentId, ExperimentSpec, DEFAULT_FAILURE_MESSAGE};
pub use metric_kind::MetricKind;
pub use status::ExperimentStatus;
pub use store::ExperimentStore;
