// src/procedure/observer.rs

//! Lifecycle callbacks.
//!
//! Observers are invoked synchronously, in attachment order, on whatever
//! thread drives the transition. No procedure lock is held during a
//! callback, so observers may call back into the procedure they observe.

use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::errors::ProcedureError;
use crate::procedure::operation::Operation;

/// Receives lifecycle notifications. Every method defaults to a no-op.
pub trait Observer: Send + Sync {
    /// The observer was attached.
    fn did_attach(&self, _operation: &Operation) {}

    /// The body is about to run. Cancelling here prevents it from running.
    fn will_execute(&self, _operation: &Operation) {}

    fn will_cancel(&self, _operation: &Operation, _errors: &[ProcedureError]) {}

    fn did_cancel(&self, _operation: &Operation, _errors: &[ProcedureError]) {}

    /// `operation` submitted `produced` to its queue.
    fn did_produce(&self, _operation: &Operation, _produced: &Operation) {}

    /// `errors` is the full list the procedure will finish with.
    fn will_finish(&self, _operation: &Operation, _errors: &[ProcedureError]) {}

    fn did_finish(&self, _operation: &Operation, _errors: &[ProcedureError]) {}
}

type OperationHook = Box<dyn Fn(&Operation) + Send + Sync>;
type ErrorsHook = Box<dyn Fn(&Operation, &[ProcedureError]) + Send + Sync>;
type ProduceHook = Box<dyn Fn(&Operation, &Operation) + Send + Sync>;

/// Observer assembled from closures.
///
/// ```ignore
/// op.add_observer(BlockObserver::new().on_did_finish(|op, errors| {
///     println!("{} finished with {} errors", op.name(), errors.len());
/// }));
/// ```
#[derive(Default)]
pub struct BlockObserver {
    did_attach: Option<OperationHook>,
    will_execute: Option<OperationHook>,
    will_cancel: Option<ErrorsHook>,
    did_cancel: Option<ErrorsHook>,
    did_produce: Option<ProduceHook>,
    will_finish: Option<ErrorsHook>,
    did_finish: Option<ErrorsHook>,
}

impl BlockObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_did_attach(mut self, f: impl Fn(&Operation) + Send + Sync + 'static) -> Self {
        self.did_attach = Some(Box::new(f));
        self
    }

    pub fn on_will_execute(mut self, f: impl Fn(&Operation) + Send + Sync + 'static) -> Self {
        self.will_execute = Some(Box::new(f));
        self
    }

    pub fn on_will_cancel(
        mut self,
        f: impl Fn(&Operation, &[ProcedureError]) + Send + Sync + 'static,
    ) -> Self {
        self.will_cancel = Some(Box::new(f));
        self
    }

    pub fn on_did_cancel(
        mut self,
        f: impl Fn(&Operation, &[ProcedureError]) + Send + Sync + 'static,
    ) -> Self {
        self.did_cancel = Some(Box::new(f));
        self
    }

    pub fn on_did_produce(
        mut self,
        f: impl Fn(&Operation, &Operation) + Send + Sync + 'static,
    ) -> Self {
        self.did_produce = Some(Box::new(f));
        self
    }

    pub fn on_will_finish(
        mut self,
        f: impl Fn(&Operation, &[ProcedureError]) + Send + Sync + 'static,
    ) -> Self {
        self.will_finish = Some(Box::new(f));
        self
    }

    pub fn on_did_finish(
        mut self,
        f: impl Fn(&Operation, &[ProcedureError]) + Send + Sync + 'static,
    ) -> Self {
        self.did_finish = Some(Box::new(f));
        self
    }
}

impl Observer for BlockObserver {
    fn did_attach(&self, operation: &Operation) {
        if let Some(f) = &self.did_attach {
            f(operation);
        }
    }

    fn will_execute(&self, operation: &Operation) {
        if let Some(f) = &self.will_execute {
            f(operation);
        }
    }

    fn will_cancel(&self, operation: &Operation, errors: &[ProcedureError]) {
        if let Some(f) = &self.will_cancel {
            f(operation, errors);
        }
    }

    fn did_cancel(&self, operation: &Operation, errors: &[ProcedureError]) {
        if let Some(f) = &self.did_cancel {
            f(operation, errors);
        }
    }

    fn did_produce(&self, operation: &Operation, produced: &Operation) {
        if let Some(f) = &self.did_produce {
            f(operation, produced);
        }
    }

    fn will_finish(&self, operation: &Operation, errors: &[ProcedureError]) {
        if let Some(f) = &self.will_finish {
            f(operation, errors);
        }
    }

    fn did_finish(&self, operation: &Operation, errors: &[ProcedureError]) {
        if let Some(f) = &self.did_finish {
            f(operation, errors);
        }
    }
}

impl fmt::Debug for BlockObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockObserver")
            .field("did_attach", &self.did_attach.is_some())
            .field("will_execute", &self.will_execute.is_some())
            .field("will_cancel", &self.will_cancel.is_some())
            .field("did_cancel", &self.did_cancel.is_some())
            .field("did_produce", &self.did_produce.is_some())
            .field("will_finish", &self.will_finish.is_some())
            .field("did_finish", &self.did_finish.is_some())
            .finish()
    }
}

/// Cancels a procedure with [`ProcedureError::TimedOut`] if it is still
/// running `timeout` after its body started.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutObserver {
    timeout: Duration,
}

impl TimeoutObserver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Observer for TimeoutObserver {
    fn will_execute(&self, operation: &Operation) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                procedure = %operation.name(),
                "no tokio runtime available; timeout will not be enforced"
            );
            return;
        };

        let timeout = self.timeout;
        let finished = operation.finished_event();
        let weak = operation.downgrade();

        runtime.spawn(async move {
            let timed_out = tokio::select! {
                _ = finished.wait() => false,
                _ = tokio::time::sleep(timeout) => true,
            };
            if !timed_out {
                return;
            }
            if let Some(operation) = weak.upgrade() {
                debug!(
                    procedure = %operation.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "procedure timed out"
                );
                operation.cancel(vec![ProcedureError::TimedOut(timeout)]);
            }
        });
    }
}
