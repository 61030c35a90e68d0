// src/procedures/block.rs

use std::fmt;

use crate::BoxFuture;
use crate::procedure::{ExecutionContext, Procedure};

type Block = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Runs a synchronous closure. An `Err` becomes the procedure's only error.
pub struct BlockProcedure {
    name: String,
    block: Block,
}

impl BlockProcedure {
    pub fn new(block: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        Self::named("BlockProcedure", block)
    }

    pub fn named(
        name: impl Into<String>,
        block: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            block: Box::new(block),
        }
    }
}

impl Procedure for BlockProcedure {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            ctx.finish_with_result((self.block)());
        })
    }
}

impl fmt::Debug for BlockProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockProcedure")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
