// src/lib.rs

//! Procedures with explicit lifecycle state, dependencies, conditions,
//! observers and result injection, scheduled by a concurrency-limited
//! queue on tokio.

pub mod capability;
pub mod cli;
pub mod condition;
pub mod config;
pub mod errors;
pub mod logging;
pub mod procedure;
pub mod procedures;
pub mod queue;
pub mod runner;
pub mod types;

mod sync;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::{Result, bail};
use tracing::{info, warn};

pub use crate::condition::{Condition, ConditionResult};
pub use crate::errors::{OperationError, ProcedureError, QueueError};
pub use crate::procedure::{
    Event, ExecutionContext, Observer, Operation, Procedure, ProcedureId, ProcedureState,
    TypedOperation,
};
pub use crate::queue::ProcedureQueue;
pub use crate::types::Limit;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::runner::{RunSummary, build_operations, print_dry_run};

/// Boxed, sendable future returned by procedure bodies and conditions.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the procedure file, builds one command procedure per
/// entry, runs them on a queue until it is idle and prints a summary.
/// Ctrl-C cancels everything still tracked.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let limit = args
        .max_concurrent
        .map(Limit::from)
        .unwrap_or_else(|| cfg.queue().limit());

    let queue = ProcedureQueue::builder()
        .name(cfg.queue().effective_name())
        .max_concurrent(limit)
        .build()?;

    let operations = build_operations(&cfg)?;

    // Ctrl-C → cancel everything.
    {
        let queue = queue.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!(queue = %queue.name(), "Ctrl-C received; cancelling procedures");
            queue.cancel_all(Vec::new());
        });
    }

    info!(
        queue = %queue.name(),
        procedures = operations.len(),
        max_concurrent = ?queue.max_concurrent(),
        "submitting procedures"
    );
    queue.add_operations(operations.iter().map(|(_, operation)| operation))?;
    queue.wait_until_idle().await;

    let summary = RunSummary::from_operations(&operations);
    println!("{summary}");

    if !summary.is_success() {
        bail!(
            "{} of {} procedures did not succeed",
            operations.len() - summary.succeeded(),
            operations.len()
        );
    }
    Ok(())
}
