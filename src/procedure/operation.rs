// src/procedure/operation.rs

//! Shared procedure handle and its cancel/finish protocol.
//!
//! An [`Operation`] is a cheap, cloneable handle onto one procedure. All
//! clones see the same state. [`TypedOperation<W>`] additionally remembers
//! the concrete work type so result injection can be checked at compile
//! time; it derefs to [`Operation`].
//!
//! Locking: the mutable state (status, cancelled flag, errors, dependency
//! handles, queue back-reference) lives behind one mutex. Observers and
//! conditions have their own. No lock is ever held while calling an
//! observer, a condition or the queue, so callbacks are free to call back
//! into any procedure, including this one.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::condition::Condition;
use crate::errors::{OperationError, ProcedureError, QueueError};
use crate::procedure::context::ExecutionContext;
use crate::procedure::event::Event;
use crate::procedure::observer::Observer;
use crate::procedure::state::{ProcedureId, ProcedureState};
use crate::procedure::Procedure;
use crate::queue::{ProcedureQueue, WeakProcedureQueue};
use crate::sync::lock;

struct OperationCore {
    id: ProcedureId,
    name: String,
    work: Arc<dyn Procedure>,
    state: Mutex<OperationState>,
    observers: Mutex<Vec<Arc<dyn Observer>>>,
    conditions: Mutex<Vec<Arc<dyn Condition>>>,
    finished: Event,
    cancelled: Event,
}

struct OperationState {
    status: ProcedureState,
    cancelled: bool,
    /// Set by the first `finish`; every later call is discarded.
    finish_claimed: bool,
    errors: Vec<ProcedureError>,
    /// Handles are released on finish; ids are kept for inspection.
    dependencies: Vec<Operation>,
    dependency_ids: Vec<ProcedureId>,
    produced: Vec<ProcedureId>,
    parent: Option<ProcedureId>,
    queue: Option<WeakProcedureQueue>,
}

/// Type-erased handle onto a procedure.
#[derive(Clone)]
pub struct Operation {
    core: Arc<OperationCore>,
}

/// Non-owning handle, used wherever one procedure refers to another through
/// an observer so producer/consumer pairs never keep each other alive.
#[derive(Clone)]
pub struct WeakOperation {
    core: Weak<OperationCore>,
}

impl WeakOperation {
    pub fn upgrade(&self) -> Option<Operation> {
        self.core.upgrade().map(|core| Operation { core })
    }
}

impl fmt::Debug for WeakOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(op) => f.debug_tuple("WeakOperation").field(&op).finish(),
            None => f.write_str("WeakOperation(<dropped>)"),
        }
    }
}

impl Operation {
    /// Wrap `work` into a new procedure in the `Initialized` state.
    pub fn new<W: Procedure>(work: W) -> TypedOperation<W> {
        TypedOperation::new(work)
    }

    fn from_work(work: Arc<dyn Procedure>) -> Self {
        let name = work.name();
        Self {
            core: Arc::new(OperationCore {
                id: ProcedureId::new(),
                name,
                work,
                state: Mutex::new(OperationState {
                    status: ProcedureState::Initialized,
                    cancelled: false,
                    finish_claimed: false,
                    errors: Vec::new(),
                    dependencies: Vec::new(),
                    dependency_ids: Vec::new(),
                    produced: Vec::new(),
                    parent: None,
                    queue: None,
                }),
                observers: Mutex::new(Vec::new()),
                conditions: Mutex::new(Vec::new()),
                finished: Event::new(),
                cancelled: Event::new(),
            }),
        }
    }

    pub fn id(&self) -> ProcedureId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn state(&self) -> ProcedureState {
        self.lock_state().status
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ProcedureState::Pending
    }

    pub fn is_executing(&self) -> bool {
        self.state() == ProcedureState::Executing
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_state().cancelled
    }

    /// `true` iff the error list is non-empty.
    pub fn failed(&self) -> bool {
        !self.lock_state().errors.is_empty()
    }

    /// Accumulated errors, in the order they were recorded.
    pub fn errors(&self) -> Vec<ProcedureError> {
        self.lock_state().errors.clone()
    }

    /// Identifier of the group procedure this one runs inside, if any.
    pub fn parent_id(&self) -> Option<ProcedureId> {
        self.lock_state().parent
    }

    pub fn set_parent(&self, parent: ProcedureId) -> Result<(), OperationError> {
        let mut state = self.lock_state();
        self.ensure_initialized(&state)?;
        state.parent = Some(parent);
        Ok(())
    }

    pub fn dependency_ids(&self) -> Vec<ProcedureId> {
        self.lock_state().dependency_ids.clone()
    }

    /// Dependency handles. Empty once the procedure has finished.
    pub fn dependencies(&self) -> Vec<Operation> {
        self.lock_state().dependencies.clone()
    }

    /// Procedures submitted through [`Operation::produce`].
    pub fn produced_ids(&self) -> Vec<ProcedureId> {
        self.lock_state().produced.clone()
    }

    /// Make this procedure wait for `dependency` to finish.
    ///
    /// Only allowed while `Initialized`. Adding the same dependency twice is
    /// a no-op.
    pub fn add_dependency(&self, dependency: impl AsRef<Operation>) -> Result<(), OperationError> {
        let dependency = dependency.as_ref();
        if dependency.id() == self.id() {
            return Err(OperationError::SelfDependency {
                procedure: self.name().to_string(),
            });
        }

        let mut state = self.lock_state();
        self.ensure_initialized(&state)?;
        if !state.dependency_ids.contains(&dependency.id()) {
            state.dependency_ids.push(dependency.id());
            state.dependencies.push(dependency.clone());
        }
        Ok(())
    }

    pub fn add_dependencies<I>(&self, dependencies: I) -> Result<(), OperationError>
    where
        I: IntoIterator,
        I::Item: AsRef<Operation>,
    {
        for dependency in dependencies {
            self.add_dependency(dependency)?;
        }
        Ok(())
    }

    pub fn remove_dependency(&self, dependency: impl AsRef<Operation>) -> Result<(), OperationError> {
        let id = dependency.as_ref().id();
        let mut state = self.lock_state();
        self.ensure_initialized(&state)?;
        state.dependency_ids.retain(|dep| *dep != id);
        state.dependencies.retain(|dep| dep.id() != id);
        Ok(())
    }

    /// Attach a precondition. Only allowed while `Initialized`.
    pub fn add_condition(&self, condition: impl Condition + 'static) -> Result<(), OperationError> {
        let state = self.lock_state();
        self.ensure_initialized(&state)?;
        lock(&self.core.conditions).push(Arc::new(condition));
        Ok(())
    }

    /// Attach an observer.
    ///
    /// Observers fire in attachment order, and only for lifecycle points
    /// reached after they were attached. Attaching to a finished procedure
    /// does nothing.
    pub fn add_observer(&self, observer: impl Observer + 'static) {
        self.add_shared_observer(Arc::new(observer));
    }

    pub fn add_shared_observer(&self, observer: Arc<dyn Observer>) {
        {
            let mut observers = lock(&self.core.observers);
            if self.is_finished() {
                debug!(
                    procedure = %self.name(),
                    "observer attached after finish; it will never fire"
                );
                return;
            }
            observers.push(Arc::clone(&observer));
        }
        observer.did_attach(self);
    }

    pub fn downgrade(&self) -> WeakOperation {
        WeakOperation {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Resolves once the procedure reaches `Finished`.
    pub async fn wait_until_finished(&self) {
        self.core.finished.wait().await;
    }

    /// Blocking variant of [`Operation::wait_until_finished`].
    pub fn wait_until_finished_blocking(&self) {
        self.core.finished.wait_blocking();
    }

    /// Event signaled when the procedure reaches `Finished`.
    ///
    /// Handy as the gate for [`Operation::produce_before`].
    pub fn finished_event(&self) -> Event {
        self.core.finished.clone()
    }

    pub(crate) fn cancelled_event(&self) -> Event {
        self.core.cancelled.clone()
    }

    /// Cancel the procedure.
    ///
    /// Only the first call has an effect: it sets the cancelled flag and
    /// records `errors`, then notifies will-cancel and did-cancel observers.
    /// Cancelling does not finish the procedure: a procedure that has not
    /// started yet is routed through `finish` by its queue; a running body
    /// is expected to notice and finish on its own. Cancelling a procedure
    /// that is finishing or finished is a no-op.
    pub fn cancel(&self, errors: Vec<ProcedureError>) {
        let _ = self.try_cancel(errors);
    }

    /// Like [`Operation::cancel`], but hands `errors` back when the call had
    /// no effect so the caller can still report them.
    pub(crate) fn try_cancel(
        &self,
        errors: Vec<ProcedureError>,
    ) -> Result<(), Vec<ProcedureError>> {
        let queue = {
            let mut state = self.lock_state();
            if state.cancelled || state.finish_claimed {
                return Err(errors);
            }
            state.cancelled = true;
            state.errors.extend(errors.iter().cloned());
            state.queue.clone()
        };

        info!(
            procedure = %self.name(),
            id = %self.id(),
            errors = errors.len(),
            "procedure cancelled"
        );

        let observers = self.observers();
        for observer in &observers {
            observer.will_cancel(self, &errors);
        }
        for observer in &observers {
            observer.did_cancel(self, &errors);
        }

        self.core.cancelled.signal();

        if let Some(queue) = queue.and_then(|q| q.upgrade()) {
            queue.operation_did_cancel(self);
        }
        Ok(())
    }

    /// Finish the procedure.
    ///
    /// The first call wins; any later call is logged and discarded along
    /// with its errors. Errors recorded by `cancel` come first in the final
    /// list. Sequence: will-finish observers, `Finishing`, teardown
    /// (conditions and dependency handles released, queue slot returned),
    /// `Finished`, did-finish observers.
    pub fn finish(&self, errors: Vec<ProcedureError>) {
        let errors = {
            let mut state = self.lock_state();
            if state.status == ProcedureState::Initialized {
                warn!(
                    procedure = %self.name(),
                    "finish called before the procedure was enqueued; ignoring"
                );
                return;
            }
            if state.finish_claimed {
                debug!(
                    procedure = %self.name(),
                    discarded = errors.len(),
                    "procedure already finishing; ignoring duplicate finish"
                );
                return;
            }
            state.finish_claimed = true;
            state.errors.extend(errors);
            state.errors.clone()
        };

        debug!(
            procedure = %self.name(),
            errors = errors.len(),
            cancelled = self.is_cancelled(),
            "procedure will finish"
        );

        for observer in self.observers() {
            observer.will_finish(self, &errors);
        }

        let queue = {
            let mut state = self.lock_state();
            self.transition(&mut state, ProcedureState::Finishing);
            state.dependencies.clear();
            state.queue.clone()
        };
        lock(&self.core.conditions).clear();

        let queue = queue.and_then(|q| q.upgrade());
        if let Some(queue) = &queue {
            queue.operation_will_finish(self);
        }

        {
            let mut state = self.lock_state();
            self.transition(&mut state, ProcedureState::Finished);
        }
        self.core.finished.signal();

        if errors.is_empty() {
            info!(procedure = %self.name(), id = %self.id(), "procedure finished");
        } else {
            warn!(
                procedure = %self.name(),
                id = %self.id(),
                errors = errors.len(),
                first_error = %errors[0],
                "procedure finished with errors"
            );
        }

        let observers = std::mem::take(&mut *lock(&self.core.observers));
        for observer in &observers {
            observer.did_finish(self, &errors);
        }

        if let Some(queue) = queue {
            queue.operation_did_finish(self, &errors);
        }
    }

    /// Submit `operation` to the queue running this procedure.
    ///
    /// Fails with [`QueueError::UnknownQueue`] if this procedure was never
    /// enqueued (or its queue is gone).
    pub fn produce(&self, operation: impl AsRef<Operation>) -> Result<(), QueueError> {
        self.produce_inner(operation.as_ref(), None)
    }

    /// Like [`Operation::produce`], but the produced procedure does not start
    /// its scheduling checks until `gate` is signaled. It is tracked by the
    /// queue immediately.
    pub fn produce_before(
        &self,
        operation: impl AsRef<Operation>,
        gate: Event,
    ) -> Result<(), QueueError> {
        self.produce_inner(operation.as_ref(), Some(gate))
    }

    fn produce_inner(&self, operation: &Operation, gate: Option<Event>) -> Result<(), QueueError> {
        let queue = self.queue().ok_or_else(|| QueueError::UnknownQueue {
            procedure: self.name().to_string(),
        })?;

        queue.add_produced_operation(operation, self, gate)?;
        self.lock_state().produced.push(operation.id());

        debug!(
            procedure = %self.name(),
            produced = %operation.name(),
            "procedure produced operation"
        );

        for observer in self.observers() {
            observer.did_produce(self, operation);
        }
        Ok(())
    }

    /// Queue-side hook: capture the queue and move to `Pending`.
    pub(crate) fn will_enqueue(&self, queue: WeakProcedureQueue) -> Result<(), QueueError> {
        let mut state = self.lock_state();
        if state.status != ProcedureState::Initialized {
            return Err(QueueError::AlreadyEnqueued {
                procedure: self.name().to_string(),
            });
        }
        state.queue = Some(queue);
        self.transition(&mut state, ProcedureState::Pending);
        Ok(())
    }

    /// Queue-side hook: scheduling checks are starting. Returns the
    /// conditions to evaluate, frozen at this point.
    pub(crate) fn pending_queue_start(&self) -> Vec<Arc<dyn Condition>> {
        debug!(procedure = %self.name(), "pending queue start");
        lock(&self.core.conditions).clone()
    }

    /// Queue-side hook: dependencies and conditions are satisfied, run the
    /// body on `runtime`.
    pub(crate) fn execute(&self, runtime: &Handle) {
        if self.state() != ProcedureState::Pending {
            warn!(
                procedure = %self.name(),
                state = %self.state(),
                "execute requested outside of pending state; ignoring"
            );
            return;
        }

        for observer in self.observers() {
            observer.will_execute(self);
        }

        // A will-execute observer may have cancelled us.
        if self.is_cancelled() {
            self.finish(Vec::new());
            return;
        }

        {
            let mut state = self.lock_state();
            if !self.transition(&mut state, ProcedureState::Executing) {
                return;
            }
        }

        let ctx = ExecutionContext::new(self.clone());
        let work = Arc::clone(&self.core.work);
        let body = runtime.spawn(async move {
            work.execute(ctx).await;
        });

        // A panicking body would otherwise never finish.
        let operation = self.clone();
        runtime.spawn(async move {
            if let Err(err) = body.await {
                if err.is_panic() {
                    warn!(procedure = %operation.name(), "procedure body panicked");
                    operation.finish(vec![ProcedureError::message(format!(
                        "procedure '{}' panicked",
                        operation.name()
                    ))]);
                }
            }
        });
    }

    pub(crate) fn queue(&self) -> Option<ProcedureQueue> {
        self.lock_state().queue.as_ref().and_then(WeakProcedureQueue::upgrade)
    }

    fn observers(&self) -> Vec<Arc<dyn Observer>> {
        lock(&self.core.observers).clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, OperationState> {
        lock(&self.core.state)
    }

    fn ensure_initialized(&self, state: &OperationState) -> Result<(), OperationError> {
        if state.status == ProcedureState::Initialized {
            Ok(())
        } else {
            Err(OperationError::NotInitialized {
                procedure: self.name().to_string(),
                state: state.status,
            })
        }
    }

    fn transition(&self, state: &mut OperationState, next: ProcedureState) -> bool {
        if !state.status.can_transition_to(next) {
            warn!(
                procedure = %self.name(),
                from = %state.status,
                to = %next,
                "illegal state transition ignored"
            );
            return false;
        }
        debug!(procedure = %self.name(), from = %state.status, to = %next, "state transition");
        state.status = next;
        true
    }
}

impl AsRef<Operation> for Operation {
    fn as_ref(&self) -> &Operation {
        self
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Operation {}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Operation")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("state", &state.status)
            .field("cancelled", &state.cancelled)
            .field("errors", &state.errors.len())
            .finish()
    }
}

/// Handle that also knows the concrete work type `W`.
pub struct TypedOperation<W> {
    operation: Operation,
    work: Arc<W>,
}

impl<W: Procedure> TypedOperation<W> {
    pub fn new(work: W) -> Self {
        let work = Arc::new(work);
        let erased: Arc<dyn Procedure> = work.clone();
        Self {
            operation: Operation::from_work(erased),
            work,
        }
    }
}

impl<W> TypedOperation<W> {
    pub fn work(&self) -> &Arc<W> {
        &self.work
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }

    pub(crate) fn downgrade_typed(&self) -> WeakTypedOperation<W> {
        WeakTypedOperation {
            operation: self.operation.downgrade(),
            work: Arc::downgrade(&self.work),
        }
    }
}

impl<W> Clone for TypedOperation<W> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            work: Arc::clone(&self.work),
        }
    }
}

impl<W> Deref for TypedOperation<W> {
    type Target = Operation;

    fn deref(&self) -> &Operation {
        &self.operation
    }
}

impl<W> AsRef<Operation> for TypedOperation<W> {
    fn as_ref(&self) -> &Operation {
        &self.operation
    }
}

impl<W> fmt::Debug for TypedOperation<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.operation, f)
    }
}

pub(crate) struct WeakTypedOperation<W> {
    operation: WeakOperation,
    work: Weak<W>,
}

impl<W> WeakTypedOperation<W> {
    pub(crate) fn upgrade(&self) -> Option<TypedOperation<W>> {
        Some(TypedOperation {
            operation: self.operation.upgrade()?,
            work: self.work.upgrade()?,
        })
    }
}
