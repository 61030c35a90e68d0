// src/condition/block.rs

use std::fmt;

use crate::BoxFuture;
use crate::condition::{Condition, ConditionResult};
use crate::errors::ProcedureError;
use crate::procedure::Operation;

/// Condition backed by a synchronous predicate. `false` fails the condition.
pub struct BlockCondition {
    name: String,
    predicate: Box<dyn Fn(&Operation) -> bool + Send + Sync>,
}

impl BlockCondition {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Operation) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl Condition for BlockCondition {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn evaluate<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            if (self.predicate)(operation) {
                ConditionResult::Satisfied
            } else {
                ConditionResult::Failed(ProcedureError::ConditionFailed {
                    condition: self.name.clone(),
                    reason: "predicate returned false".to_string(),
                })
            }
        })
    }
}

impl fmt::Debug for BlockCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCondition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Inverts another condition. `ShouldNotExecute` passes through untouched.
#[derive(Debug)]
pub struct NegatedCondition<C> {
    inner: C,
}

impl<C: Condition> NegatedCondition<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Condition> Condition for NegatedCondition<C> {
    fn name(&self) -> String {
        format!("Not<{}>", self.inner.name())
    }

    fn produce_dependencies(&self, operation: &Operation) -> Vec<Operation> {
        self.inner.produce_dependencies(operation)
    }

    fn evaluate<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            match self.inner.evaluate(operation).await {
                ConditionResult::Satisfied => ConditionResult::Failed(ProcedureError::ConditionFailed {
                    condition: self.name(),
                    reason: "negated condition was satisfied".to_string(),
                }),
                ConditionResult::Failed(_) => ConditionResult::Satisfied,
                ConditionResult::ShouldNotExecute => ConditionResult::ShouldNotExecute,
            }
        })
    }
}
