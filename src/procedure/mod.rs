// src/procedure/mod.rs

//! The procedure state machine and everything that hangs off it.
//!
//! - [`event`] holds the one-shot [`Event`] signal used for finish/cancel
//!   notifications and `produce_before` gates.
//! - [`state`] defines identifiers and the monotonic [`ProcedureState`].
//! - [`operation`] is the shared handle ([`Operation`], [`TypedOperation`])
//!   carrying state, dependencies, conditions, observers and the
//!   cancel/finish protocol.
//! - [`context`] is what a running body sees ([`ExecutionContext`]).
//! - [`observer`] defines lifecycle callbacks.
//! - [`inject`] wires a producer's result into a consumer's requirement.

pub mod context;
pub mod event;
pub mod inject;
pub mod observer;
pub mod operation;
pub mod state;

pub use context::ExecutionContext;
pub use event::Event;
pub use inject::{RequirementConsumer, ResultProducer, Slot};
pub use observer::{BlockObserver, Observer, TimeoutObserver};
pub use operation::{Operation, TypedOperation, WeakOperation};
pub use state::{ProcedureId, ProcedureState};

use crate::BoxFuture;

/// The unit of work a procedure runs.
///
/// Implementors supply the body through [`Procedure::execute`]. The body is
/// started by the queue once every dependency has finished and every
/// condition passed, and it **must** eventually call
/// [`ExecutionContext::finish`], either before returning or later from
/// another task. A body that never finishes keeps its queue slot forever.
pub trait Procedure: Send + Sync + 'static {
    /// Human-readable name used in logs and error messages.
    fn name(&self) -> String {
        short_type_name::<Self>()
    }

    /// Run the work. The default body finishes immediately without errors.
    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            ctx.finish(Vec::new());
        })
    }
}

/// `procqueue::procedures::transform::TransformProcedure<i32, u8>` -> `TransformProcedure`.
fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
