// src/condition/no_failed_dependencies.rs

use crate::BoxFuture;
use crate::condition::{Condition, ConditionResult};
use crate::errors::ProcedureError;
use crate::procedure::Operation;

/// Refuses to run a procedure if anything upstream failed.
///
/// Dependencies that finished with errors fail the condition with
/// [`ProcedureError::DependenciesFailed`]. Dependencies that were cancelled
/// without errors fail it with [`ProcedureError::DependenciesCancelled`],
/// or, when built with [`ignoring_cancellations`](Self::ignoring_cancellations),
/// make the procedure quietly skip its body.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFailedDependenciesCondition {
    ignore_cancellations: bool,
}

impl NoFailedDependenciesCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignoring_cancellations(mut self) -> Self {
        self.ignore_cancellations = true;
        self
    }
}

impl Condition for NoFailedDependenciesCondition {
    fn name(&self) -> String {
        "NoFailedDependencies".to_string()
    }

    fn evaluate<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            let mut failed = Vec::new();
            let mut cancelled = Vec::new();

            for dependency in operation.dependencies() {
                if dependency.failed() {
                    failed.push(dependency.name().to_string());
                } else if dependency.is_cancelled() {
                    cancelled.push(dependency.name().to_string());
                }
            }

            if !failed.is_empty() {
                ConditionResult::Failed(ProcedureError::DependenciesFailed { failed })
            } else if cancelled.is_empty() {
                ConditionResult::Satisfied
            } else if self.ignore_cancellations {
                ConditionResult::ShouldNotExecute
            } else {
                ConditionResult::Failed(ProcedureError::DependenciesCancelled { cancelled })
            }
        })
    }
}
