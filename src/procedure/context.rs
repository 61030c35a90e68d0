// src/procedure/context.rs

use crate::errors::{ProcedureError, QueueError};
use crate::procedure::event::Event;
use crate::procedure::operation::Operation;
use crate::procedure::state::ProcedureId;

/// What a running procedure body sees.
///
/// Cloneable so a body can hand it to a spawned task and finish from there.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    operation: Operation,
}

impl ExecutionContext {
    pub(crate) fn new(operation: Operation) -> Self {
        Self { operation }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn id(&self) -> ProcedureId {
        self.operation.id()
    }

    pub fn name(&self) -> &str {
        self.operation.name()
    }

    /// Bodies should poll this at convenient points and finish early.
    pub fn is_cancelled(&self) -> bool {
        self.operation.is_cancelled()
    }

    /// Resolves once the procedure is cancelled. Useful in `tokio::select!`.
    pub async fn cancelled(&self) {
        self.operation.cancelled_event().wait().await;
    }

    pub fn finish(&self, errors: Vec<ProcedureError>) {
        self.operation.finish(errors);
    }

    /// Finish with no errors on `Ok`, or with one execution error on `Err`.
    pub fn finish_with_result<E>(&self, result: Result<(), E>)
    where
        E: Into<anyhow::Error>,
    {
        match result {
            Ok(()) => self.finish(Vec::new()),
            Err(err) => self.finish(vec![ProcedureError::execution(err)]),
        }
    }

    pub fn produce(&self, operation: impl AsRef<Operation>) -> Result<(), QueueError> {
        self.operation.produce(operation)
    }

    pub fn produce_before(
        &self,
        operation: impl AsRef<Operation>,
        gate: Event,
    ) -> Result<(), QueueError> {
        self.operation.produce_before(operation, gate)
    }
}
