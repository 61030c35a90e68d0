use std::error::Error;
use std::sync::Arc;

use procqueue::capability::{AuthorizedFor, GetAuthorizationStatusProcedure};
use procqueue::procedure::ResultProducer;
use procqueue::{Operation, ProcedureError, ProcedureQueue};
use procqueue_test_utils::{
    init_tracing, with_timeout, FakeLocationCapability, LocationStatus, LocationUsage,
    TestProcedure,
};

type TestResult = Result<(), Box<dyn Error>>;

async fn run_guarded(
    capability: &Arc<FakeLocationCapability>,
) -> Result<procqueue::TypedOperation<TestProcedure>, Box<dyn Error>> {
    let queue = ProcedureQueue::new()?;
    let op = Operation::new(TestProcedure::new("uses-location"));
    op.add_condition(AuthorizedFor::new(Arc::clone(capability)))?;

    queue.add_operation(&op)?;
    with_timeout(queue.wait_until_idle()).await;
    Ok(op)
}

#[tokio::test]
async fn undetermined_status_requests_then_runs() -> TestResult {
    init_tracing();
    let capability = Arc::new(FakeLocationCapability::new(
        LocationStatus::NotDetermined,
        LocationStatus::AuthorizedWhenInUse,
    ));

    let op = run_guarded(&capability).await?;

    assert_eq!(capability.request_count(), 1);
    assert_eq!(op.work().executions(), 1);
    assert!(!op.failed());
    Ok(())
}

#[tokio::test]
async fn denied_request_cancels_without_running() -> TestResult {
    init_tracing();
    let capability = Arc::new(FakeLocationCapability::new(
        LocationStatus::NotDetermined,
        LocationStatus::Denied,
    ));

    let op = run_guarded(&capability).await?;

    assert_eq!(capability.request_count(), 1);
    assert_eq!(op.work().executions(), 0);
    assert!(op.is_cancelled());
    assert!(matches!(
        &op.errors()[..],
        [ProcedureError::CapabilityUnauthorized { capability, status }]
            if capability == "Location" && status == "Denied"
    ));
    Ok(())
}

#[tokio::test]
async fn determined_status_is_not_requested_again() -> TestResult {
    init_tracing();
    let capability = Arc::new(FakeLocationCapability::new(
        LocationStatus::AuthorizedAlways,
        LocationStatus::Denied,
    ));

    let op = run_guarded(&capability).await?;

    assert_eq!(capability.request_count(), 0);
    assert_eq!(op.work().executions(), 1);
    Ok(())
}

#[tokio::test]
async fn insufficient_authorization_fails() -> TestResult {
    init_tracing();
    let capability = Arc::new(
        FakeLocationCapability::new(
            LocationStatus::AuthorizedWhenInUse,
            LocationStatus::AuthorizedWhenInUse,
        )
        .requiring(LocationUsage::Always),
    );

    let op = run_guarded(&capability).await?;

    assert_eq!(op.work().executions(), 0);
    assert!(matches!(
        &op.errors()[..],
        [ProcedureError::CapabilityUnauthorized { .. }]
    ));
    Ok(())
}

#[tokio::test]
async fn unavailable_capability_fails() -> TestResult {
    init_tracing();
    let capability = Arc::new(FakeLocationCapability::unavailable());

    let op = run_guarded(&capability).await?;

    assert_eq!(capability.request_count(), 0);
    assert_eq!(op.work().executions(), 0);
    assert!(matches!(
        &op.errors()[..],
        [ProcedureError::CapabilityUnavailable { .. }]
    ));
    Ok(())
}

#[tokio::test]
async fn status_procedure_reports_without_prompting() -> TestResult {
    init_tracing();
    let queue = ProcedureQueue::new()?;
    let capability = Arc::new(FakeLocationCapability::new(
        LocationStatus::Restricted,
        LocationStatus::AuthorizedAlways,
    ));
    let status = Operation::new(GetAuthorizationStatusProcedure::new(Arc::clone(&capability)));

    queue.add_operation(&status)?;
    with_timeout(status.wait_until_finished()).await;

    assert_eq!(status.work().output(), Some(LocationStatus::Restricted));
    assert_eq!(capability.request_count(), 0);
    Ok(())
}
