// src/condition/mod.rs

//! Preconditions evaluated after a procedure's dependencies finish and
//! before its body runs.
//!
//! A condition may declare procedures of its own through
//! [`Condition::produce_dependencies`]. The queue submits them and waits
//! for them like ordinary dependencies before calling
//! [`Condition::evaluate`].

pub mod block;
pub mod no_failed_dependencies;

pub use block::{BlockCondition, NegatedCondition};
pub use no_failed_dependencies::NoFailedDependenciesCondition;

use std::sync::Arc;

use tracing::debug;

use crate::BoxFuture;
use crate::errors::ProcedureError;
use crate::procedure::Operation;

/// Outcome of a single condition.
#[derive(Debug, Clone)]
pub enum ConditionResult {
    Satisfied,
    Failed(ProcedureError),
    /// Nothing to do: finish without running and without errors.
    ShouldNotExecute,
}

pub trait Condition: Send + Sync {
    fn name(&self) -> String;

    /// Procedures that must finish before [`Condition::evaluate`] is called.
    ///
    /// Called once, when the owning procedure's scheduling checks begin.
    fn produce_dependencies(&self, _operation: &Operation) -> Vec<Operation> {
        Vec::new()
    }

    fn evaluate<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, ConditionResult>;
}

/// Aggregate of all conditions on one procedure.
#[derive(Debug, Clone)]
pub enum ConditionsOutcome {
    Satisfied,
    ShouldNotExecute,
    Failed(Vec<ProcedureError>),
}

/// Evaluate `conditions` in order, each exactly once.
///
/// Any failure wins over `ShouldNotExecute`, which wins over `Satisfied`.
pub async fn evaluate_conditions(
    conditions: &[Arc<dyn Condition>],
    operation: &Operation,
) -> ConditionsOutcome {
    let mut failures = Vec::new();
    let mut skip = false;

    for condition in conditions {
        let result = condition.evaluate(operation).await;
        debug!(
            procedure = %operation.name(),
            condition = %condition.name(),
            result = ?result,
            "condition evaluated"
        );
        match result {
            ConditionResult::Satisfied => {}
            ConditionResult::ShouldNotExecute => skip = true,
            ConditionResult::Failed(err) => failures.push(err),
        }
    }

    if !failures.is_empty() {
        ConditionsOutcome::Failed(failures)
    } else if skip {
        ConditionsOutcome::ShouldNotExecute
    } else {
        ConditionsOutcome::Satisfied
    }
}
