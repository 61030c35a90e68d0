// src/procedures/delay.rs

use std::time::Duration;

use crate::BoxFuture;
use crate::procedure::{ExecutionContext, Procedure};

/// Sleeps, then finishes. Cancellation cuts the sleep short.
#[derive(Debug, Clone, Copy)]
pub struct DelayProcedure {
    delay: Duration,
}

impl DelayProcedure {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Procedure for DelayProcedure {
    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = ctx.cancelled() => {}
            }
            ctx.finish(Vec::new());
        })
    }
}
