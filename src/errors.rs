// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ProcedureError`] is what ends up in a procedure's error list. It is
//!   cloneable because the same list is handed to every observer and copied
//!   into dependents during result injection.
//! - [`OperationError`] and [`QueueError`] report misuse of the handle and
//!   queue APIs.
//! - [`ProcqueueError`] covers the config-driven runner (IO, TOML, DAG shape).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::procedure::ProcedureState;

/// A failure recorded against a procedure.
#[derive(Error, Debug, Clone)]
pub enum ProcedureError {
    /// The procedure's own work reported a failure.
    #[error("execution failed: {0}")]
    Execution(Arc<anyhow::Error>),

    #[error("condition '{condition}' failed: {reason}")]
    ConditionFailed { condition: String, reason: String },

    /// Raised by `NoFailedDependenciesCondition`.
    #[error("dependencies failed: {}", .failed.join(", "))]
    DependenciesFailed { failed: Vec<String> },

    #[error("dependencies cancelled: {}", .cancelled.join(", "))]
    DependenciesCancelled { cancelled: Vec<String> },

    /// An injected dependency finished with errors; carries its full list.
    #[error("dependency '{dependency}' failed with {} error(s)", .errors.len())]
    DependencyFailed {
        dependency: String,
        errors: Vec<ProcedureError>,
    },

    #[error("dependency '{dependency}' was cancelled")]
    DependencyCancelled { dependency: String },

    /// An injected dependency finished cleanly but left no result behind.
    #[error("dependency '{dependency}' finished without producing a result")]
    RequirementNotSatisfied { dependency: String },

    /// A procedure started without its requirement being set.
    #[error("procedure '{procedure}' has no requirement set")]
    RequirementMissing { procedure: String },

    #[error("capability '{capability}' is not available")]
    CapabilityUnavailable { capability: String },

    #[error("capability '{capability}' is not authorized (status: {status})")]
    CapabilityUnauthorized { capability: String, status: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("child procedures failed: {}", .failed.join(", "))]
    GroupChildrenFailed { failed: Vec<String> },
}

impl ProcedureError {
    /// Wrap any error as an execution failure.
    pub fn execution<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        ProcedureError::Execution(Arc::new(err.into()))
    }

    /// Execution failure from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        ProcedureError::Execution(Arc::new(anyhow::Error::msg(msg.into())))
    }
}

/// Misuse of an [`Operation`](crate::procedure::Operation) handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error(
        "procedure '{procedure}' is {state}; dependencies, conditions and parent can only change before it is enqueued"
    )]
    NotInitialized {
        procedure: String,
        state: ProcedureState,
    },

    #[error("procedure '{procedure}' cannot depend on itself")]
    SelfDependency { procedure: String },
}

/// Errors from queue submission and queue-backed procedure operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("a procedure queue must be created inside a tokio runtime")]
    NoRuntime,

    #[error("procedure '{procedure}' has already been enqueued")]
    AlreadyEnqueued { procedure: String },

    /// `produce` was called on a procedure that no queue has accepted.
    #[error("procedure '{procedure}' is not attached to a queue")]
    UnknownQueue { procedure: String },

    #[error("the shared procedure queue has already been installed")]
    SharedAlreadyInstalled,

    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// Errors raised by the config-driven runner.
#[derive(Error, Debug)]
pub enum ProcqueueError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in procedure graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProcqueueError>;
