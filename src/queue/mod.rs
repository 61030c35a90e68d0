// src/queue/mod.rs

//! Procedure scheduling.
//!
//! - [`core`] is the pure, synchronous bookkeeping: tracked set, ready order
//!   and concurrency limit.
//! - [`procedure_queue`] is the async shell that owns the tokio handle.
//! - [`gate`] is the per-procedure task that waits on dependencies and
//!   evaluates conditions.
//! - [`delegate`] defines queue-level hooks.

pub mod core;
pub mod delegate;
mod gate;
pub mod procedure_queue;

pub use self::core::QueueCore;
pub use delegate::QueueDelegate;
pub use procedure_queue::{ProcedureQueue, ProcedureQueueBuilder, WeakProcedureQueue};
