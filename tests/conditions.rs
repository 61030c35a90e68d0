use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procqueue::condition::{
    evaluate_conditions, BlockCondition, ConditionsOutcome, NegatedCondition,
    NoFailedDependenciesCondition,
};
use procqueue::{
    BoxFuture, Condition, ConditionResult, Operation, OperationError, ProcedureError,
    ProcedureQueue,
};
use procqueue_test_utils::{init_tracing, with_timeout, TestProcedure};

type TestResult = Result<(), Box<dyn Error>>;

/// Returns a fixed result and counts evaluations.
struct FixedCondition {
    result: ConditionResult,
    evaluations: Arc<AtomicUsize>,
}

impl FixedCondition {
    fn new(result: ConditionResult) -> (Self, Arc<AtomicUsize>) {
        let evaluations = Arc::new(AtomicUsize::new(0));
        (
            Self {
                result,
                evaluations: evaluations.clone(),
            },
            evaluations,
        )
    }
}

impl Condition for FixedCondition {
    fn name(&self) -> String {
        "Fixed".to_string()
    }

    fn evaluate<'a>(&'a self, _operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        })
    }
}

#[tokio::test]
async fn should_not_execute_finishes_cleanly_without_running() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("skipped"));
    let (condition, evaluations) = FixedCondition::new(ConditionResult::ShouldNotExecute);
    op.add_condition(condition)?;

    queue.add_operation(&op)?;
    with_timeout(op.wait_until_finished()).await;

    assert_eq!(op.work().executions(), 0);
    assert!(op.errors().is_empty());
    assert!(!op.is_cancelled());
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn failed_condition_cancels_with_its_error() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("rejected"));
    let (condition, _) = FixedCondition::new(ConditionResult::Failed(ProcedureError::message(
        "not today",
    )));
    op.add_condition(condition)?;

    queue.add_operation(&op)?;
    with_timeout(op.wait_until_finished()).await;

    assert_eq!(op.work().executions(), 0);
    assert!(op.is_cancelled());
    let errors = op.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("not today"));
    Ok(())
}

#[tokio::test]
async fn satisfied_conditions_let_the_body_run() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("allowed"));
    op.add_condition(BlockCondition::new("always", |_| true))?;
    op.add_condition(NegatedCondition::new(BlockCondition::new("never", |_| false)))?;

    queue.add_operation(&op)?;
    with_timeout(op.wait_until_finished()).await;

    assert_eq!(op.work().executions(), 1);
    assert!(!op.failed());
    Ok(())
}

#[tokio::test]
async fn block_condition_false_fails() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("blocked"));
    op.add_condition(BlockCondition::new("feature-flag", |_| false))?;

    queue.add_operation(&op)?;
    with_timeout(op.wait_until_finished()).await;

    assert!(matches!(
        &op.errors()[..],
        [ProcedureError::ConditionFailed { condition, .. }] if condition == "feature-flag"
    ));
    Ok(())
}

#[tokio::test]
async fn failure_wins_over_should_not_execute() {
    let op = Operation::new(TestProcedure::new("target"));
    let (skip, _) = FixedCondition::new(ConditionResult::ShouldNotExecute);
    let (fail, _) = FixedCondition::new(ConditionResult::Failed(ProcedureError::message("x")));
    let conditions: Vec<Arc<dyn Condition>> = vec![Arc::new(skip), Arc::new(fail)];

    let outcome = evaluate_conditions(&conditions, &op).await;

    assert!(matches!(outcome, ConditionsOutcome::Failed(ref errors) if errors.len() == 1));
}

#[tokio::test]
async fn no_failed_dependencies_blocks_after_upstream_failure() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let upstream = Operation::new(TestProcedure::new("upstream").failing_with("broken"));
    let downstream = Operation::new(TestProcedure::new("downstream"));
    downstream.add_dependency(&upstream)?;
    downstream.add_condition(NoFailedDependenciesCondition::new())?;

    queue.add_operations([upstream.operation(), downstream.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert_eq!(downstream.work().executions(), 0);
    assert!(downstream.is_cancelled());
    assert!(matches!(
        &downstream.errors()[..],
        [ProcedureError::DependenciesFailed { failed }] if failed == &vec!["upstream".to_string()]
    ));
    Ok(())
}

#[tokio::test]
async fn cancelled_dependency_fails_or_skips() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let upstream = Operation::new(TestProcedure::new("upstream"));
    let strict = Operation::new(TestProcedure::new("strict"));
    let lenient = Operation::new(TestProcedure::new("lenient"));
    for op in [&strict, &lenient] {
        op.add_dependency(&upstream)?;
    }
    strict.add_condition(NoFailedDependenciesCondition::new())?;
    lenient.add_condition(NoFailedDependenciesCondition::new().ignoring_cancellations())?;

    queue.add_operations([strict.operation(), lenient.operation()])?;
    queue.add_operation(&upstream)?;
    upstream.cancel(Vec::new());
    with_timeout(queue.wait_until_idle()).await;

    assert_eq!(strict.work().executions(), 0);
    assert!(matches!(
        &strict.errors()[..],
        [ProcedureError::DependenciesCancelled { .. }]
    ));

    assert_eq!(lenient.work().executions(), 0);
    assert!(lenient.errors().is_empty());
    assert!(!lenient.is_cancelled());
    Ok(())
}

/// Produces one dependency and checks it finished before evaluation.
/// Takes a while to decide, then fails.
struct SlowFailure;

impl Condition for SlowFailure {
    fn name(&self) -> String {
        "SlowFailure".to_string()
    }

    fn evaluate<'a>(&'a self, _operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            ConditionResult::Failed(ProcedureError::message("too slow"))
        })
    }
}

#[tokio::test]
async fn condition_failure_survives_cancel_during_evaluation() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("interrupted"));
    op.add_condition(SlowFailure)?;

    queue.add_operation(&op)?;
    tokio::time::sleep(Duration::from_millis(30)).await;
    op.cancel(Vec::new());
    with_timeout(op.wait_until_finished()).await;

    assert_eq!(op.work().executions(), 0);
    assert!(op.is_cancelled());
    let errors = op.errors();
    assert_eq!(errors.len(), 1, "errors: {errors:?}");
    assert!(errors[0].to_string().contains("too slow"));
    Ok(())
}

struct NeedsWarmup {
    produced: Mutex<Option<Operation>>,
    evaluations: Arc<AtomicUsize>,
}

impl Condition for NeedsWarmup {
    fn name(&self) -> String {
        "NeedsWarmup".to_string()
    }

    fn produce_dependencies(&self, _operation: &Operation) -> Vec<Operation> {
        let warmup = Operation::new(TestProcedure::new("warmup")).into_operation();
        *self.produced.lock().unwrap() = Some(warmup.clone());
        vec![warmup]
    }

    fn evaluate<'a>(&'a self, _operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            let finished = self
                .produced
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|warmup| warmup.is_finished());
            if finished {
                ConditionResult::Satisfied
            } else {
                ConditionResult::Failed(ProcedureError::message("warmup not finished"))
            }
        })
    }
}

#[tokio::test]
async fn condition_dependencies_run_before_evaluation() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let evaluations = Arc::new(AtomicUsize::new(0));
    let op = Operation::new(TestProcedure::new("main"));
    op.add_condition(NeedsWarmup {
        produced: Mutex::new(None),
        evaluations: evaluations.clone(),
    })?;

    queue.add_operation(&op)?;
    with_timeout(queue.wait_until_idle()).await;

    assert!(!op.failed(), "errors: {:?}", op.errors());
    assert_eq!(op.work().executions(), 1);
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn conditions_cannot_be_added_after_enqueue() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("late"));
    queue.add_operation(&op)?;

    let err = op.add_condition(BlockCondition::new("late", |_| true)).unwrap_err();
    assert!(matches!(err, OperationError::NotInitialized { .. }));

    with_timeout(queue.wait_until_idle()).await;
    Ok(())
}
