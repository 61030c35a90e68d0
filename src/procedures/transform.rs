// src/procedures/transform.rs

use std::fmt;

use crate::BoxFuture;
use crate::errors::ProcedureError;
use crate::procedure::{ExecutionContext, Procedure, RequirementConsumer, ResultProducer, Slot};

type Transform<I, O> = Box<dyn Fn(I) -> anyhow::Result<O> + Send + Sync>;

/// Turns a requirement of type `I` into an output of type `O`.
///
/// Meant for injection chains: inject a producer's result into it, then
/// inject its output into the next consumer. Running without a requirement
/// finishes with [`ProcedureError::RequirementMissing`].
pub struct TransformProcedure<I, O> {
    name: Option<String>,
    transform: Transform<I, O>,
    requirement: Slot<I>,
    output: Slot<O>,
}

impl<I, O> TransformProcedure<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub fn new(transform: impl Fn(I) -> anyhow::Result<O> + Send + Sync + 'static) -> Self {
        Self {
            name: None,
            transform: Box::new(transform),
            requirement: Slot::new(),
            output: Slot::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_requirement(self, requirement: I) -> Self {
        self.requirement.set(requirement);
        self
    }
}

impl<I, O> Procedure for TransformProcedure<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| "TransformProcedure".to_string())
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let Some(input) = self.requirement.take() else {
                ctx.finish(vec![ProcedureError::RequirementMissing {
                    procedure: ctx.name().to_string(),
                }]);
                return;
            };

            match (self.transform)(input) {
                Ok(output) => {
                    self.output.set(output);
                    ctx.finish(Vec::new());
                }
                Err(err) => ctx.finish(vec![ProcedureError::execution(err)]),
            }
        })
    }
}

impl<I, O> ResultProducer for TransformProcedure<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    type Output = O;

    fn output(&self) -> Option<O> {
        self.output.get()
    }
}

impl<I, O> RequirementConsumer for TransformProcedure<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    type Requirement = I;

    fn set_requirement(&self, requirement: I) {
        self.requirement.set(requirement);
    }
}

impl<I, O> fmt::Debug for TransformProcedure<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformProcedure")
            .field("name", &self.name)
            .field("has_requirement", &self.requirement.is_set())
            .field("has_output", &self.output.is_set())
            .finish_non_exhaustive()
    }
}
