// src/queue/gate.rs

//! Per-procedure scheduling task.
//!
//! One gate runs for every procedure a queue accepts. It waits for the
//! optional start gate, submits condition-produced procedures, waits for
//! every dependency, evaluates conditions and finally reports the procedure
//! ready. Cancellation interrupts any of the waits and routes the procedure
//! straight to finish. The gate then holds its queue until the procedure
//! finishes so a dropped queue handle cannot strand running work.

use tracing::{debug, warn};

use crate::condition::{ConditionsOutcome, evaluate_conditions};
use crate::procedure::{Event, Operation, ProcedureState};
use crate::queue::ProcedureQueue;

pub(crate) async fn run_gate(queue: ProcedureQueue, operation: Operation, start: Option<Event>) {
    gate(&queue, &operation, start).await;
    operation.wait_until_finished().await;
}

async fn gate(queue: &ProcedureQueue, operation: &Operation, start: Option<Event>) {
    let cancelled = operation.cancelled_event();

    if let Some(start) = start {
        tokio::select! {
            _ = start.wait() => {}
            _ = cancelled.wait() => {}
        }
    }
    if operation.is_cancelled() {
        operation.finish(Vec::new());
        return;
    }

    let conditions = operation.pending_queue_start();

    let mut waits = operation.dependencies();
    for condition in &conditions {
        for dependency in condition.produce_dependencies(operation) {
            if dependency.state() == ProcedureState::Initialized {
                if let Err(err) = queue.submit(&dependency, Some(operation.id()), None) {
                    warn!(
                        queue = %queue.name(),
                        procedure = %operation.name(),
                        condition = %condition.name(),
                        error = %err,
                        "failed to submit condition dependency"
                    );
                }
            }
            waits.push(dependency);
        }
    }

    if !waits.is_empty() {
        debug!(
            queue = %queue.name(),
            procedure = %operation.name(),
            dependencies = waits.len(),
            "waiting for dependencies"
        );
        let all_finished = async {
            for dependency in &waits {
                dependency.wait_until_finished().await;
            }
        };
        tokio::select! {
            _ = all_finished => {}
            _ = cancelled.wait() => {}
        }
    }
    drop(waits);

    if operation.is_cancelled() {
        operation.finish(Vec::new());
        return;
    }

    if !conditions.is_empty() {
        match evaluate_conditions(&conditions, operation).await {
            ConditionsOutcome::Satisfied => {}
            ConditionsOutcome::ShouldNotExecute => {
                debug!(
                    queue = %queue.name(),
                    procedure = %operation.name(),
                    "conditions asked not to execute"
                );
                operation.finish(Vec::new());
                return;
            }
            ConditionsOutcome::Failed(errors) => {
                // Cancelled while evaluating: the failures go out with finish.
                let unrecorded = operation.try_cancel(errors).err().unwrap_or_default();
                operation.finish(unrecorded);
                return;
            }
        }
    }
    drop(conditions);

    if operation.is_cancelled() {
        operation.finish(Vec::new());
        return;
    }

    queue.operation_is_ready(operation);
}
