// src/procedures/group.rs

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::BoxFuture;
use crate::errors::ProcedureError;
use crate::procedure::{ExecutionContext, Operation, Procedure};
use crate::queue::ProcedureQueue;
use crate::sync::lock;
use crate::types::Limit;

/// Runs a set of child procedures as one unit.
///
/// Children run on a private queue created when the group executes, with
/// their parent id set to the group. Cancelling the group cancels every
/// child. The group finishes once all children have finished, with
/// [`ProcedureError::GroupChildrenFailed`] if any of them failed.
pub struct GroupProcedure {
    name: String,
    max_concurrent: Limit,
    /// `None` once the group has started.
    pending: Mutex<Option<Vec<Operation>>>,
    children: Mutex<Vec<Operation>>,
}

impl GroupProcedure {
    pub fn new<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<Operation>,
    {
        Self::named("GroupProcedure", children)
    }

    pub fn named<I>(name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<Operation>,
    {
        let children: Vec<Operation> = children
            .into_iter()
            .map(|child| child.as_ref().clone())
            .collect();
        Self {
            name: name.into(),
            max_concurrent: Limit::None,
            pending: Mutex::new(Some(children)),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Bound how many children run at once.
    pub fn with_max_concurrent(mut self, limit: impl Into<Limit>) -> Self {
        self.max_concurrent = limit.into();
        self
    }

    /// Add a child. Returns `false` once the group has started.
    pub fn add_child(&self, child: impl AsRef<Operation>) -> bool {
        match lock(&self.pending).as_mut() {
            Some(pending) => {
                pending.push(child.as_ref().clone());
                true
            }
            None => false,
        }
    }

    /// Children submitted so far.
    pub fn children(&self) -> Vec<Operation> {
        match lock(&self.pending).as_ref() {
            Some(pending) => pending.clone(),
            None => lock(&self.children).clone(),
        }
    }

    async fn run(&self, ctx: &ExecutionContext) -> Vec<ProcedureError> {
        let children = lock(&self.pending).take().unwrap_or_default();

        let queue = match ProcedureQueue::builder()
            .name(format!("{}-children", ctx.name()))
            .max_concurrent(self.max_concurrent)
            .build()
        {
            Ok(queue) => queue,
            Err(err) => return vec![ProcedureError::execution(err)],
        };

        let mut errors = Vec::new();
        let mut submitted = Vec::with_capacity(children.len());
        for child in children {
            if let Err(err) = child.set_parent(ctx.id()) {
                warn!(group = %ctx.name(), child = %child.name(), error = %err, "child not added");
                errors.push(ProcedureError::execution(err));
                continue;
            }
            if let Err(err) = queue.add_operation(&child) {
                errors.push(ProcedureError::execution(err));
                continue;
            }
            submitted.push(child);
        }
        lock(&self.children).clone_from(&submitted);

        debug!(group = %ctx.name(), children = submitted.len(), "group children submitted");

        let cancelled = tokio::select! {
            _ = queue.wait_until_idle() => false,
            _ = ctx.cancelled() => true,
        };
        if cancelled {
            debug!(group = %ctx.name(), "group cancelled; cancelling children");
            queue.cancel_all(Vec::new());
            queue.wait_until_idle().await;
        }

        let failed: Vec<String> = submitted
            .iter()
            .filter(|child| child.failed())
            .map(|child| child.name().to_string())
            .collect();
        if !failed.is_empty() {
            errors.push(ProcedureError::GroupChildrenFailed { failed });
        }
        errors
    }
}

impl Procedure for GroupProcedure {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let errors = self.run(&ctx).await;
            ctx.finish(errors);
        })
    }
}
