use std::error::Error;
use std::time::Duration;

use procqueue::procedure::{RequirementConsumer, ResultProducer};
use procqueue::procedures::TransformProcedure;
use procqueue::{Operation, ProcedureError, ProcedureQueue};
use procqueue_test_utils::{init_tracing, with_timeout, TestProcedure};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn result_reaches_consumer_before_it_executes() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(TestProcedure::new("producer").producing("v"));
    let consumer = Operation::new(TestProcedure::new("consumer"));
    consumer.inject_result(&producer)?;

    assert_eq!(consumer.dependency_ids(), vec![producer.id()]);

    queue.add_operations([consumer.operation(), producer.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert_eq!(consumer.work().executions(), 1);
    assert_eq!(consumer.work().requirement_at_start().as_deref(), Some("v"));
    Ok(())
}

#[tokio::test]
async fn producer_failure_cancels_consumer_with_all_errors() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(
        TestProcedure::new("producer")
            .failing_with("first")
            .failing_with("second"),
    );
    let consumer = Operation::new(TestProcedure::new("consumer"));
    consumer.inject_result(&producer)?;

    queue.add_operations([producer.operation(), consumer.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert_eq!(consumer.work().executions(), 0);
    assert!(consumer.is_cancelled());
    match &consumer.errors()[..] {
        [ProcedureError::DependencyFailed { dependency, errors }] => {
            assert_eq!(dependency, "producer");
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected one DependencyFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn cancelled_producer_cancels_consumer() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(
        TestProcedure::new("producer")
            .producing("partial")
            .with_delay(Duration::from_secs(30)),
    );
    let consumer = Operation::new(TestProcedure::new("consumer"));
    consumer.inject_result(&producer)?;

    queue.add_operations([producer.operation(), consumer.operation()])?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    producer.cancel(Vec::new());
    assert!(consumer.is_cancelled(), "did-cancel propagates immediately");

    with_timeout(queue.wait_until_idle()).await;
    assert_eq!(consumer.work().executions(), 0);
    assert!(matches!(
        &consumer.errors()[..],
        [ProcedureError::DependencyCancelled { .. }]
    ));
    Ok(())
}

#[tokio::test]
async fn missing_output_cancels_consumer() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(TestProcedure::new("producer"));
    let consumer = Operation::new(TestProcedure::new("consumer"));
    consumer.inject_result(&producer)?;

    queue.add_operations([producer.operation(), consumer.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert_eq!(consumer.work().executions(), 0);
    assert!(matches!(
        &consumer.errors()[..],
        [ProcedureError::RequirementNotSatisfied { dependency }] if dependency == "producer"
    ));
    Ok(())
}

#[tokio::test]
async fn manual_injection_sees_producer_errors() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(TestProcedure::new("producer").failing_with("meh"));
    let consumer = Operation::new(TestProcedure::new("consumer"));

    consumer.inject_result_with(&producer, |consumer, _producer, errors| {
        // Run anyway, with a fallback value.
        let value = if errors.is_empty() { "ok" } else { "fallback" };
        consumer.work().set_requirement(value.to_string());
    })?;

    queue.add_operations([producer.operation(), consumer.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert_eq!(consumer.work().executions(), 1);
    assert_eq!(
        consumer.work().requirement_at_start().as_deref(),
        Some("fallback")
    );
    Ok(())
}

#[tokio::test]
async fn mapped_injection_through_a_transform_chain() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(TestProcedure::new("producer").producing("21"));
    let double = Operation::new(
        TransformProcedure::new(|n: i64| Ok(n * 2)).named("double"),
    );
    double.inject_mapped_result(&producer, |text: String| {
        text.parse::<i64>().map_err(ProcedureError::execution)
    })?;

    queue.add_operations([producer.operation(), double.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert!(!double.failed(), "errors: {:?}", double.errors());
    assert_eq!(double.work().output(), Some(42));
    Ok(())
}

#[tokio::test]
async fn failed_mapping_cancels_consumer() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let producer = Operation::new(TestProcedure::new("producer").producing("not a number"));
    let double = Operation::new(TransformProcedure::new(|n: i64| Ok(n * 2)));
    double.inject_mapped_result(&producer, |text: String| {
        text.parse::<i64>().map_err(ProcedureError::execution)
    })?;

    queue.add_operations([producer.operation(), double.operation()])?;
    with_timeout(queue.wait_until_idle()).await;

    assert!(double.is_cancelled());
    assert!(matches!(&double.errors()[..], [ProcedureError::Execution(_)]));
    assert_eq!(double.work().output(), None);
    Ok(())
}

#[test]
fn injection_requires_an_initialized_consumer() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let queue = ProcedureQueue::new().unwrap();
        let producer = Operation::new(TestProcedure::new("producer").producing("v"));
        let consumer = Operation::new(TestProcedure::new("consumer"));
        queue.add_operation(&consumer).unwrap();

        assert!(consumer.inject_result(&producer).is_err());

        with_timeout(queue.wait_until_idle()).await;
    });
}
