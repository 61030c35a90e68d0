// src/runner.rs

//! Turning a validated procedure file into queued procedures, and
//! reporting on them afterwards.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::condition::NoFailedDependenciesCondition;
use crate::config::ConfigFile;
use crate::errors::{ProcedureError, Result};
use crate::procedure::{Operation, TimeoutObserver};
use crate::procedures::CommandProcedure;

/// One [`CommandProcedure`] per configured procedure, dependencies wired,
/// in dependency order.
pub fn build_operations(cfg: &ConfigFile) -> Result<Vec<(String, Operation)>> {
    let mut built: HashMap<&str, Operation> = HashMap::new();
    let mut operations = Vec::with_capacity(cfg.order().len());

    for name in cfg.order() {
        let Some(procedure) = cfg.procedure(name) else {
            continue;
        };

        let operation = Operation::new(CommandProcedure::new(name.clone(), procedure.cmd.clone()))
            .into_operation();

        for dep in procedure.after.iter() {
            if let Some(dependency) = built.get(dep.as_str()) {
                operation.add_dependency(dependency)?;
            }
        }

        if procedure.skip_if_dependencies_failed && !procedure.after.is_empty() {
            operation.add_condition(NoFailedDependenciesCondition::new())?;
        }

        if let Some(timeout) = procedure.timeout_duration() {
            operation.add_observer(TimeoutObserver::new(timeout));
        }

        debug!(
            procedure = %name,
            after = ?procedure.after,
            "built procedure from config"
        );

        built.insert(name.as_str(), operation.clone());
        operations.push((name.clone(), operation));
    }

    Ok(operations)
}

/// How a procedure ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Succeeded,
    Failed(Vec<ProcedureError>),
    /// Cancelled without errors, e.g. by Ctrl-C.
    Cancelled,
    /// Not finished when the summary was taken.
    Unfinished,
}

impl RunOutcome {
    pub fn of(operation: &Operation) -> Self {
        if !operation.is_finished() {
            RunOutcome::Unfinished
        } else if operation.failed() {
            RunOutcome::Failed(operation.errors())
        } else if operation.is_cancelled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Succeeded
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    entries: Vec<(String, RunOutcome)>,
}

impl RunSummary {
    pub fn from_operations(operations: &[(String, Operation)]) -> Self {
        Self {
            entries: operations
                .iter()
                .map(|(name, operation)| (name.clone(), RunOutcome::of(operation)))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, RunOutcome)] {
        &self.entries
    }

    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, RunOutcome::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, RunOutcome::Failed(_)))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|outcome| matches!(outcome, RunOutcome::Cancelled | RunOutcome::Unfinished))
    }

    pub fn is_success(&self) -> bool {
        self.succeeded() == self.entries.len()
    }

    fn count(&self, pred: impl Fn(&RunOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, outcome)| pred(outcome)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.entries {
            match outcome {
                RunOutcome::Succeeded => writeln!(f, "  ok        {name}")?,
                RunOutcome::Cancelled => writeln!(f, "  cancelled {name}")?,
                RunOutcome::Unfinished => writeln!(f, "  unfinished {name}")?,
                RunOutcome::Failed(errors) => {
                    writeln!(f, "  failed    {name}")?;
                    for err in errors {
                        writeln!(f, "      {err}")?;
                    }
                }
            }
        }
        write!(
            f,
            "{} succeeded, {} failed, {} cancelled",
            self.succeeded(),
            self.failed(),
            self.cancelled()
        )
    }
}

/// Print procedures, dependencies and commands without running anything.
pub fn print_dry_run(cfg: &ConfigFile) {
    println!("procqueue dry-run");
    println!("  queue.name = {}", cfg.queue().effective_name());
    match cfg.queue().max_concurrent {
        Some(0) => println!("  queue.max_concurrent = unlimited"),
        Some(max) => println!("  queue.max_concurrent = {max}"),
        None => println!("  queue.max_concurrent = available parallelism"),
    }
    println!();

    println!("procedures ({}), in dependency order:", cfg.order().len());
    for name in cfg.order() {
        let Some(procedure) = cfg.procedure(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", procedure.cmd);
        if !procedure.after.is_empty() {
            println!("      after: {:?}", procedure.after);
            if !procedure.skip_if_dependencies_failed {
                println!("      skip_if_dependencies_failed: false");
            }
        }
        if let Some(ref timeout) = procedure.timeout {
            println!("      timeout: {timeout}");
        }
    }

    debug!("dry-run complete (no execution)");
}
