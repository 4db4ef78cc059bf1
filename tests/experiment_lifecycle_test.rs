//! Experiment Lifecycle Tests
//!
//! End-to-end scenarios through the public `Tracker` API.

use moea_tracker::experiment::{ExperimentSpec, ExperimentStatus, MetricKind};
use moea_tracker::result::{IterationResult, RunKey};
use moea_tracker::{Error, Tracker};

fn tracker() -> Tracker {
    Tracker::builder().build_in_memory().expect("default config is valid")
}

fn vega_zdt() -> ExperimentSpec {
    ExperimentSpec::new(1000)
        .algorithm("VEGA")
        .problem("ZDT1")
        .problem("ZDT2")
        .metric(MetricKind::GenerationalDistance)
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_created_experiment_is_pending_without_end_time() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();

    assert_eq!(experiment.status(), ExperimentStatus::Pending);
    assert!(experiment.end_time().is_none());
    assert!(experiment.error_message().is_none());
    assert_eq!(experiment.budget(), 1000);
    assert!(experiment.start_time().timestamp() > 0);

    let found = tracker.experiments().get(experiment.id()).await.unwrap();
    assert_eq!(found, experiment);
}

#[tokio::test]
async fn test_create_with_non_positive_budget_fails() {
    let tracker = tracker();
    for budget in [0, -500] {
        let err = tracker
            .experiments()
            .create(ExperimentSpec::new(budget).algorithm("VEGA"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "budget {budget}");
    }
}

#[tokio::test]
async fn test_ids_are_unique() {
    let tracker = tracker();
    let a = tracker.experiments().create(vega_zdt()).await.unwrap();
    let b = tracker.experiments().create(vega_zdt()).await.unwrap();
    assert_ne!(a.id(), b.id());
}

// =============================================================================
// Status transitions
// =============================================================================

#[tokio::test]
async fn test_every_status_pair() {
    use ExperimentStatus::{Failed, Finished, Pending, Running};

    let tracker = tracker();
    let allowed = [(Pending, Running), (Running, Finished), (Running, Failed)];

    for from in ExperimentStatus::ALL {
        for to in ExperimentStatus::ALL {
            // Drive a fresh experiment into `from` along a legal path
            let id = tracker.experiments().create(vega_zdt()).await.unwrap().id().clone();
            match from {
                Pending => {}
                Running => {
                    tracker.experiments().start(&id).await.unwrap();
                }
                Finished => {
                    tracker.experiments().start(&id).await.unwrap();
                    tracker.experiments().finish(&id).await.unwrap();
                }
                Failed => {
                    tracker.experiments().start(&id).await.unwrap();
                    tracker.experiments().fail(&id, "setup").await.unwrap();
                }
            }

            let message = (to == Failed).then(|| "boom".to_string());
            let outcome = tracker.experiments().update_status(&id, to, message).await;

            if allowed.contains(&(from, to)) {
                let updated = outcome.unwrap();
                assert_eq!(updated.status(), to);
            } else {
                let err = outcome.unwrap_err();
                assert!(
                    matches!(err, Error::IllegalStateTransition { from: f, to: t } if f == from && t == to),
                    "{from} -> {to} gave {err}"
                );
                assert_eq!(tracker.experiments().get(&id).await.unwrap().status(), from);
            }
        }
    }
}

#[tokio::test]
async fn test_terminal_states_set_end_time_and_message() {
    let tracker = tracker();

    let finished = tracker.experiments().create(vega_zdt()).await.unwrap();
    tracker.experiments().start(finished.id()).await.unwrap();
    let finished = tracker.experiments().finish(finished.id()).await.unwrap();
    assert!(finished.end_time().is_some());
    assert!(finished.error_message().is_none());
    assert!(finished.end_time().unwrap() >= finished.start_time());

    let failed = tracker.experiments().create(vega_zdt()).await.unwrap();
    tracker.experiments().start(failed.id()).await.unwrap();
    let failed = tracker
        .experiments()
        .update_status(failed.id(), ExperimentStatus::Failed, Some("worker crashed".into()))
        .await
        .unwrap();
    assert!(failed.end_time().is_some());
    assert_eq!(failed.error_message(), Some("worker crashed"));
}

#[tokio::test]
async fn test_running_keeps_end_time_null() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    let running = tracker.experiments().start(experiment.id()).await.unwrap();

    assert_eq!(running.status(), ExperimentStatus::Running);
    assert!(running.end_time().is_none());
}

// =============================================================================
// Result submission scenarios
// =============================================================================

#[tokio::test]
async fn test_first_submission_scenario() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    assert_eq!(experiment.status(), ExperimentStatus::Pending);

    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
    let checkpoint = IterationResult::new(1).with_metric(MetricKind::GenerationalDistance, 0.12);
    tracker.coordinator().submit_result(&key, checkpoint.clone()).await.unwrap();

    let result = tracker.results().find_by_run_key(&key).await.unwrap();
    assert_eq!(result.iterations(), &[checkpoint]);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.algorithm(), "VEGA");
    assert_eq!(result.problem(), "ZDT1");
    assert_eq!(result.experiment_id(), experiment.id());
}

#[tokio::test]
async fn test_submission_after_finish_is_closed() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    tracker.experiments().start(experiment.id()).await.unwrap();
    tracker.experiments().finish(experiment.id()).await.unwrap();

    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
    let err = tracker
        .coordinator()
        .submit_result(&key, IterationResult::new(1))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ExperimentClosed { .. }));
    assert!(tracker
        .queries()
        .results_for_experiment(experiment.id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_submission_after_failure_is_closed() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    tracker.experiments().start(experiment.id()).await.unwrap();
    tracker.experiments().fail(experiment.id(), "timeout").await.unwrap();

    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
    let err = tracker
        .coordinator()
        .submit_result(&key, IterationResult::new(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ExperimentClosed {
            status: ExperimentStatus::Failed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_duplicate_then_lower_iteration() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT2");
    let coordinator = tracker.coordinator();

    coordinator.submit_result(&key, IterationResult::new(4)).await.unwrap();
    let stored = coordinator.submit_result(&key, IterationResult::new(5)).await.unwrap();

    // Same index again: idempotent
    let again = coordinator.submit_result(&key, IterationResult::new(5)).await.unwrap();
    assert_eq!(again, stored);

    // N then N-1: out of order
    let err = coordinator
        .submit_result(&key, IterationResult::new(3))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OutOfOrderIteration { iteration: 3, last: 5 }));
    assert_eq!(tracker.results().find_by_run_key(&key).await.unwrap(), stored);
}

#[tokio::test]
async fn test_run_count_is_caller_managed() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");

    tracker.coordinator().submit_result(&key, IterationResult::new(1)).await.unwrap();
    let updated = tracker.coordinator().record_run_count(&key, 10).await.unwrap();
    assert_eq!(updated.run_count(), 10);

    let results = tracker.queries().results_for_experiment(experiment.id()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].run_count(), 10);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_list_by_status_returns_exactly_pending() {
    let tracker = tracker();
    let pending = tracker.experiments().create(vega_zdt()).await.unwrap();
    let finished = tracker.experiments().create(vega_zdt()).await.unwrap();
    tracker.experiments().start(finished.id()).await.unwrap();
    tracker.experiments().finish(finished.id()).await.unwrap();

    let listed = tracker
        .queries()
        .experiments_by_status(ExperimentStatus::Pending)
        .await
        .unwrap();
    assert_eq!(listed, vec![pending]);

    let listed = tracker
        .queries()
        .experiments_by_status(ExperimentStatus::Finished)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), finished.id());
}

#[tokio::test]
async fn test_results_for_run_key_missing() {
    let tracker = tracker();
    let err = tracker
        .queries()
        .results_for_run_key(&RunKey::new("e", "VEGA", "ZDT1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_experiment_and_results() {
    let tracker = tracker();
    let doomed = tracker.experiments().create(vega_zdt()).await.unwrap();
    let kept = tracker.experiments().create(vega_zdt()).await.unwrap();

    for experiment in [&doomed, &kept] {
        for problem in ["ZDT1", "ZDT2"] {
            let key = RunKey::new(experiment.id().clone(), "VEGA", problem);
            tracker
                .coordinator()
                .submit_result(&key, IterationResult::new(1))
                .await
                .unwrap();
        }
    }

    let report = tracker
        .coordinator()
        .delete_experiment_and_results(doomed.id())
        .await
        .unwrap();
    assert_eq!(report.results_removed, 2);
    assert!(report.experiment_removed);

    assert!(matches!(
        tracker.experiments().get(doomed.id()).await.unwrap_err(),
        Error::NotFound { .. }
    ));
    assert!(tracker.results().find_by_experiment(doomed.id()).await.unwrap().is_empty());
    assert_eq!(tracker.results().find_by_experiment(kept.id()).await.unwrap().len(), 2);

    // Second call is a no-op
    let again = tracker
        .coordinator()
        .delete_experiment_and_results(doomed.id())
        .await
        .unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn test_submission_after_delete_is_not_found() {
    let tracker = tracker();
    let experiment = tracker.experiments().create(vega_zdt()).await.unwrap();
    tracker
        .coordinator()
        .delete_experiment_and_results(experiment.id())
        .await
        .unwrap();

    let key = RunKey::new(experiment.id().clone(), "VEGA", "ZDT1");
    let err = tracker
        .coordinator()
        .submit_result(&key, IterationResult::new(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExperimentNotFound(_)));
}
