// src/queue/delegate.rs

use crate::errors::ProcedureError;
use crate::procedure::Operation;
use crate::queue::ProcedureQueue;

/// Queue-level hooks. Called synchronously with no queue lock held.
pub trait QueueDelegate: Send + Sync {
    /// Before `operation` is accepted. It is still `Initialized`.
    fn will_add_operation(&self, _queue: &ProcedureQueue, _operation: &Operation) {}

    fn did_add_operation(&self, _queue: &ProcedureQueue, _operation: &Operation) {}

    /// After `operation` finished and its did-finish observers ran.
    fn did_finish_operation(
        &self,
        _queue: &ProcedureQueue,
        _operation: &Operation,
        _errors: &[ProcedureError],
    ) {
    }
}
