//! Experiment Lifecycle Example
//!
//! Walks one experiment through its whole life: creation, concurrent result
//! submission from several workers, closing, reporting and cascading delete.
//!
//! Run with: RUST_LOG=moea_tracker=debug cargo run --example experiment_lifecycle

use anyhow::Context;
use moea_tracker::experiment::{ExperimentSpec, ExperimentStatus, MetricKind};
use moea_tracker::result::{IterationResult, RunKey};
use moea_tracker::{telemetry, Error, Tracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("moea_tracker=info")?;

    println!("=== moea-tracker Experiment Lifecycle ===\n");

    let tracker = Tracker::builder()
        .conflict_retries(64)
        .id_prefix("demo")
        .build_in_memory()?;

    // -------------------------------------------------------------------------
    // 1. Create and start an experiment
    // -------------------------------------------------------------------------
    println!("1. Creating experiment...");

    let experiment = tracker
        .experiments()
        .create(
            ExperimentSpec::new(1000)
                .algorithm("VEGA")
                .algorithm("NSGAII")
                .problem("ZDT1")
                .problem("ZDT2")
                .metric(MetricKind::GenerationalDistance)
                .metric(MetricKind::Hypervolume),
        )
        .await?;
    println!("   Experiment ID: {}", experiment.id());
    println!("   Status: {}", experiment.status());

    let experiment = tracker.experiments().start(experiment.id()).await?;
    println!("   Status: {}\n", experiment.status());

    // -------------------------------------------------------------------------
    // 2. Workers submit iterations concurrently
    // -------------------------------------------------------------------------
    println!("2. Submitting results from 4 workers...");

    let mut workers = Vec::new();
    for algorithm in ["VEGA", "NSGAII"] {
        for problem in ["ZDT1", "ZDT2"] {
            let coordinator = tracker.coordinator().clone();
            let key = RunKey::new(experiment.id().clone(), algorithm, problem);
            workers.push(tokio::spawn(async move {
                for iteration in 1..=5u32 {
                    let distance = 1.0 / f64::from(iteration);
                    let checkpoint = IterationResult::new(u64::from(iteration))
                        .with_metric(MetricKind::GenerationalDistance, distance)
                        .with_metric(MetricKind::Hypervolume, 1.0 - distance / 2.0);
                    coordinator.submit_result(&key, checkpoint).await?;
                }
                coordinator.record_run_count(&key, 1).await
            }));
        }
    }
    for worker in workers {
        let result = worker.await.context("worker panicked")??;
        println!(
            "   {}/{}: {} iterations",
            result.algorithm(),
            result.problem(),
            result.iterations().len()
        );
    }

    // Retried delivery is harmless
    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
    let retried = tracker
        .coordinator()
        .submit_result(&key, IterationResult::new(3))
        .await?;
    println!("   Re-sent iteration 3 for {key}: still {} iterations\n", retried.iterations().len());

    // -------------------------------------------------------------------------
    // 3. Close the experiment
    // -------------------------------------------------------------------------
    println!("3. Finishing experiment...");

    let experiment = tracker.experiments().finish(experiment.id()).await?;
    println!("   Status: {}", experiment.status());
    if let Some(end_time) = experiment.end_time() {
        println!("   Ended: {end_time}");
    }

    match tracker
        .coordinator()
        .submit_result(&key, IterationResult::new(6))
        .await
    {
        Err(err @ Error::ExperimentClosed { .. }) => println!("   Late submission rejected: {err}\n"),
        other => anyhow::bail!("late submission should be rejected, got {other:?}"),
    }

    // -------------------------------------------------------------------------
    // 4. Reporting
    // -------------------------------------------------------------------------
    println!("4. Reporting...");

    let finished = tracker
        .queries()
        .experiments_by_status(ExperimentStatus::Finished)
        .await?;
    println!("   Finished experiments: {}", finished.len());

    for result in tracker.queries().results_for_algorithm("NSGAII").await? {
        let best = result
            .iterations()
            .last()
            .and_then(|it| it.value(MetricKind::GenerationalDistance));
        println!("   NSGAII/{} final GD: {best:?}", result.problem());
    }

    let report = tracker.queries().experiment_report(experiment.id()).await?;
    println!(
        "   Report JSON: {} bytes\n",
        serde_json::to_string(&report)?.len()
    );

    // -------------------------------------------------------------------------
    // 5. Cascading delete
    // -------------------------------------------------------------------------
    println!("5. Deleting experiment with its results...");

    let deleted = tracker
        .coordinator()
        .delete_experiment_and_results(experiment.id())
        .await?;
    println!("   Results removed: {}", deleted.results_removed);
    println!("   Experiment removed: {}", deleted.experiment_removed);

    let again = tracker
        .coordinator()
        .delete_experiment_and_results(experiment.id())
        .await?;
    println!("   Repeat delete is a no-op: {}", again.is_noop());

    println!("\n=== Done ===");
    Ok(())
}
