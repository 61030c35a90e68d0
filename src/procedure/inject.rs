// src/procedure/inject.rs

//! Result injection between procedures.
//!
//! A producer exposes its result through [`ResultProducer`]; a consumer
//! accepts a requirement through [`RequirementConsumer`]. Injecting makes
//! the producer a dependency of the consumer and attaches an observer to
//! the producer that:
//!
//! - runs on the producer's will-finish, before the producer is marked
//!   finished and therefore before the consumer's dependency gate opens;
//! - cancels the consumer with [`ProcedureError::DependencyCancelled`] as
//!   soon as the producer is cancelled.
//!
//! The pairing is checked at compile time: automatic injection requires
//! `Consumer::Requirement == Producer::Output`.

use std::fmt;
use std::sync::Mutex;

use tracing::debug;

use crate::errors::{OperationError, ProcedureError};
use crate::procedure::observer::Observer;
use crate::procedure::operation::{Operation, TypedOperation, WeakTypedOperation};
use crate::procedure::Procedure;
use crate::sync::lock;

/// A procedure that leaves a result behind when it finishes.
pub trait ResultProducer: Procedure {
    type Output: Clone + Send + Sync + 'static;

    /// The result, or `None` if none was produced.
    fn output(&self) -> Option<Self::Output>;
}

/// A procedure that needs a value before it executes.
pub trait RequirementConsumer: Procedure {
    type Requirement: Send + 'static;

    fn set_requirement(&self, requirement: Self::Requirement);
}

/// Thread-safe optional value, used for result and requirement fields.
pub struct Slot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
        }
    }

    /// Store `value`, returning the previous one.
    pub fn set(&self, value: T) -> Option<T> {
        lock(&self.value).replace(value)
    }

    pub fn take(&self) -> Option<T> {
        lock(&self.value).take()
    }

    pub fn is_set(&self) -> bool {
        lock(&self.value).is_some()
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> Option<T> {
        lock(&self.value).clone()
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&*lock(&self.value)).finish()
    }
}

type InjectBlock<C, P> =
    Box<dyn Fn(&TypedOperation<C>, &TypedOperation<P>, &[ProcedureError]) + Send + Sync>;

/// Attached to the producer; holds only weak references to both ends.
struct InjectionObserver<C, P> {
    consumer: WeakTypedOperation<C>,
    producer: WeakTypedOperation<P>,
    block: InjectBlock<C, P>,
}

impl<C, P> InjectionObserver<C, P> {
    fn cancel_consumer(&self, producer: &Operation) {
        if let Some(consumer) = self.consumer.upgrade() {
            debug!(
                procedure = %consumer.name(),
                dependency = %producer.name(),
                "injected dependency cancelled; cancelling consumer"
            );
            consumer.cancel(vec![ProcedureError::DependencyCancelled {
                dependency: producer.name().to_string(),
            }]);
        }
    }
}

impl<C, P> Observer for InjectionObserver<C, P>
where
    C: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn did_cancel(&self, operation: &Operation, _errors: &[ProcedureError]) {
        self.cancel_consumer(operation);
    }

    fn will_finish(&self, operation: &Operation, errors: &[ProcedureError]) {
        if operation.is_cancelled() {
            self.cancel_consumer(operation);
            return;
        }

        let (Some(consumer), Some(producer)) = (self.consumer.upgrade(), self.producer.upgrade())
        else {
            return;
        };
        (self.block)(&consumer, &producer, errors);
    }
}

impl<C: Procedure> TypedOperation<C> {
    /// Manual injection: `block` runs on the producer's will-finish unless
    /// the producer was cancelled, in which case the consumer is cancelled.
    pub fn inject_result_with<P, F>(
        &self,
        producer: &TypedOperation<P>,
        block: F,
    ) -> Result<(), OperationError>
    where
        P: Procedure,
        F: Fn(&TypedOperation<C>, &TypedOperation<P>, &[ProcedureError]) + Send + Sync + 'static,
    {
        self.add_dependency(producer)?;
        producer.add_observer(InjectionObserver {
            consumer: self.downgrade_typed(),
            producer: producer.downgrade_typed(),
            block: Box::new(block),
        });
        Ok(())
    }
}

impl<C: RequirementConsumer> TypedOperation<C> {
    /// Automatic injection of `producer`'s output as this procedure's
    /// requirement.
    ///
    /// If the producer finishes with errors, this procedure is cancelled with
    /// one [`ProcedureError::DependencyFailed`] carrying the whole list. If it
    /// finishes cleanly without an output, this procedure is cancelled with
    /// [`ProcedureError::RequirementNotSatisfied`].
    pub fn inject_result<P>(&self, producer: &TypedOperation<P>) -> Result<(), OperationError>
    where
        P: ResultProducer<Output = C::Requirement>,
    {
        self.inject_mapped_result(producer, Ok)
    }

    /// Automatic injection through a fallible conversion. A conversion error
    /// cancels this procedure with that error.
    pub fn inject_mapped_result<P, F>(
        &self,
        producer: &TypedOperation<P>,
        map: F,
    ) -> Result<(), OperationError>
    where
        P: ResultProducer,
        F: Fn(P::Output) -> Result<C::Requirement, ProcedureError> + Send + Sync + 'static,
    {
        self.inject_result_with(producer, move |consumer, producer, errors| {
            if !errors.is_empty() {
                consumer.cancel(vec![ProcedureError::DependencyFailed {
                    dependency: producer.name().to_string(),
                    errors: errors.to_vec(),
                }]);
                return;
            }

            match producer.work().output() {
                None => consumer.cancel(vec![ProcedureError::RequirementNotSatisfied {
                    dependency: producer.name().to_string(),
                }]),
                Some(output) => match map(output) {
                    Ok(requirement) => consumer.work().set_requirement(requirement),
                    Err(err) => consumer.cancel(vec![err]),
                },
            }
        })
    }
}
