// src/queue/procedure_queue.rs

//! Async shell around [`QueueCore`].
//!
//! The shell owns the tokio handle, spawns gate and body tasks, talks to the
//! delegate and wakes idle waiters. All ordering and concurrency decisions
//! are made by the core.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::errors::{ProcedureError, QueueError};
use crate::procedure::{Event, Operation, ProcedureId};
use crate::queue::core::QueueCore;
use crate::queue::delegate::QueueDelegate;
use crate::queue::gate::run_gate;
use crate::sync::lock;
use crate::types::Limit;

static SHARED: OnceLock<ProcedureQueue> = OnceLock::new();

struct QueueShared {
    name: String,
    runtime: Handle,
    core: Mutex<QueueCore<Operation>>,
    delegate: Option<Arc<dyn QueueDelegate>>,
    idle: Notify,
}

/// Schedules procedures: holds each one until its start gate, dependencies
/// and conditions allow it to run, then runs it within the concurrency
/// limit.
///
/// Handles are cheap clones. Procedures only keep a weak reference to their
/// queue, but every procedure that has not finished keeps the queue alive.
#[derive(Clone)]
pub struct ProcedureQueue {
    shared: Arc<QueueShared>,
}

#[derive(Clone)]
pub struct WeakProcedureQueue {
    shared: Weak<QueueShared>,
}

impl WeakProcedureQueue {
    pub fn upgrade(&self) -> Option<ProcedureQueue> {
        self.shared.upgrade().map(|shared| ProcedureQueue { shared })
    }
}

impl fmt::Debug for WeakProcedureQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakProcedureQueue")
    }
}

/// Builder for [`ProcedureQueue`].
#[derive(Default)]
pub struct ProcedureQueueBuilder {
    name: Option<String>,
    max_concurrent: Limit,
    delegate: Option<Arc<dyn QueueDelegate>>,
    runtime: Option<Handle>,
}

impl ProcedureQueueBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn max_concurrent(mut self, limit: impl Into<Limit>) -> Self {
        self.max_concurrent = limit.into();
        self
    }

    pub fn delegate(mut self, delegate: impl QueueDelegate + 'static) -> Self {
        self.delegate = Some(Arc::new(delegate));
        self
    }

    pub fn shared_delegate(mut self, delegate: Arc<dyn QueueDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Run on `runtime` instead of the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<ProcedureQueue, QueueError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| QueueError::NoRuntime)?,
        };
        let name = self.name.unwrap_or_else(|| "procedure-queue".to_string());
        let limit = self.max_concurrent.resolve();

        debug!(queue = %name, max_concurrent = ?limit, "procedure queue created");

        Ok(ProcedureQueue {
            shared: Arc::new(QueueShared {
                name,
                runtime,
                core: Mutex::new(QueueCore::new(limit)),
                delegate: self.delegate,
                idle: Notify::new(),
            }),
        })
    }
}

impl ProcedureQueue {
    pub fn builder() -> ProcedureQueueBuilder {
        ProcedureQueueBuilder::default()
    }

    /// Unlimited queue on the current tokio runtime.
    pub fn new() -> Result<Self, QueueError> {
        Self::builder().build()
    }

    /// Make `queue` the process-wide shared queue. Can only happen once.
    pub fn install_shared(queue: ProcedureQueue) -> Result<(), QueueError> {
        SHARED
            .set(queue)
            .map_err(|_| QueueError::SharedAlreadyInstalled)
    }

    /// The process-wide shared queue, if one was installed.
    pub fn shared() -> Option<&'static ProcedureQueue> {
        SHARED.get()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }

    pub fn downgrade(&self) -> WeakProcedureQueue {
        WeakProcedureQueue {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Accept `operation` for scheduling.
    ///
    /// The procedure moves to `Pending` and is tracked until it finishes.
    /// A procedure can only ever be enqueued once.
    pub fn add_operation(&self, operation: impl AsRef<Operation>) -> Result<(), QueueError> {
        self.submit(operation.as_ref(), None, None)
    }

    /// Accept several procedures, stopping at the first error.
    pub fn add_operations<I>(&self, operations: I) -> Result<(), QueueError>
    where
        I: IntoIterator,
        I::Item: AsRef<Operation>,
    {
        for operation in operations {
            self.add_operation(operation)?;
        }
        Ok(())
    }

    /// Make every operation depend on every one of `dependencies`, then
    /// accept the operations. The dependencies themselves are not submitted.
    pub fn add_operations_after<I, D>(&self, operations: I, dependencies: D) -> Result<(), QueueError>
    where
        I: IntoIterator,
        I::Item: AsRef<Operation>,
        D: IntoIterator,
        D::Item: AsRef<Operation>,
    {
        let dependencies: Vec<Operation> = dependencies
            .into_iter()
            .map(|dependency| dependency.as_ref().clone())
            .collect();
        let operations: Vec<Operation> = operations
            .into_iter()
            .map(|operation| operation.as_ref().clone())
            .collect();

        for operation in &operations {
            operation.add_dependencies(&dependencies)?;
        }
        self.add_operations(&operations)
    }

    /// Number of procedures accepted and not yet finishing.
    pub fn operation_count(&self) -> usize {
        self.core().tracked_count()
    }

    /// Tracked procedures, in submission order.
    pub fn operations(&self) -> Vec<Operation> {
        self.core().items()
    }

    pub fn executing_count(&self) -> usize {
        self.core().executing_count()
    }

    pub fn max_concurrent(&self) -> Option<usize> {
        self.core().limit()
    }

    pub fn set_max_concurrent(&self, limit: impl Into<Limit>) {
        let limit = limit.into().resolve();
        info!(queue = %self.name(), max_concurrent = ?limit, "concurrency limit changed");
        let startable = self.core().set_limit(limit);
        self.start(startable);
    }

    /// Stop starting procedures. Gating carries on; ready procedures wait.
    pub fn suspend(&self) {
        info!(queue = %self.name(), "queue suspended");
        self.core().suspend();
    }

    pub fn resume(&self) {
        info!(queue = %self.name(), "queue resumed");
        let startable = self.core().resume();
        self.start(startable);
    }

    pub fn is_suspended(&self) -> bool {
        self.core().is_suspended()
    }

    /// Cancel every tracked procedure with `errors`.
    pub fn cancel_all(&self, errors: Vec<ProcedureError>) {
        let operations = self.operations();
        info!(queue = %self.name(), count = operations.len(), "cancelling all procedures");
        for operation in operations {
            operation.cancel(errors.clone());
        }
    }

    /// No procedure is tracked and every finished one has been settled.
    pub fn is_idle(&self) -> bool {
        self.core().is_idle()
    }

    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }

            notified.await;
        }
    }

    pub(crate) fn add_produced_operation(
        &self,
        operation: &Operation,
        producer: &Operation,
        gate: Option<Event>,
    ) -> Result<(), QueueError> {
        self.submit(operation, Some(producer.id()), gate)
    }

    pub(crate) fn submit(
        &self,
        operation: &Operation,
        producer: Option<ProcedureId>,
        gate: Option<Event>,
    ) -> Result<(), QueueError> {
        if let Some(delegate) = &self.shared.delegate {
            delegate.will_add_operation(self, operation);
        }

        {
            // Held across `will_enqueue` so a finish racing the submission
            // cannot detach before the entry exists.
            let mut core = self.core();
            operation.will_enqueue(self.downgrade())?;
            core.track(operation.id(), operation.clone(), producer);
        }

        debug!(
            queue = %self.name(),
            procedure = %operation.name(),
            id = %operation.id(),
            gated = gate.is_some(),
            "procedure enqueued"
        );

        self.shared
            .runtime
            .spawn(run_gate(self.clone(), operation.clone(), gate));

        if let Some(delegate) = &self.shared.delegate {
            delegate.did_add_operation(self, operation);
        }
        Ok(())
    }

    pub(crate) fn operation_is_ready(&self, operation: &Operation) {
        let startable = self.core().mark_ready(operation.id());
        self.start(startable);

        // Cancelled between the gate's last check and `mark_ready`.
        if operation.is_cancelled() && self.core().withdraw(operation.id()) {
            operation.finish(Vec::new());
        }
    }

    pub(crate) fn operation_did_cancel(&self, operation: &Operation) {
        let withdrawn = self.core().withdraw(operation.id());
        if withdrawn {
            debug!(
                queue = %self.name(),
                procedure = %operation.name(),
                "cancelled while waiting for a slot; finishing"
            );
            operation.finish(Vec::new());
        }
    }

    pub(crate) fn operation_will_finish(&self, operation: &Operation) {
        let startable = self.core().detach(operation.id());
        self.start(startable);
    }

    pub(crate) fn operation_did_finish(&self, operation: &Operation, errors: &[ProcedureError]) {
        if let Some(delegate) = &self.shared.delegate {
            delegate.did_finish_operation(self, operation, errors);
        }

        let idle = self.core().settle(operation.id());
        if idle {
            debug!(queue = %self.name(), "queue idle");
            self.shared.idle.notify_waiters();
        }
    }

    fn start(&self, operations: Vec<Operation>) {
        for operation in operations {
            let runtime = self.shared.runtime.clone();
            self.shared.runtime.spawn(async move {
                operation.execute(&runtime);
            });
        }
    }

    fn core(&self) -> MutexGuard<'_, QueueCore<Operation>> {
        lock(&self.shared.core)
    }
}

impl fmt::Debug for ProcedureQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core();
        f.debug_struct("ProcedureQueue")
            .field("name", &self.shared.name)
            .field("tracked", &core.tracked_count())
            .field("executing", &core.executing_count())
            .field("max_concurrent", &core.limit())
            .field("suspended", &core.is_suspended())
            .finish()
    }
}
