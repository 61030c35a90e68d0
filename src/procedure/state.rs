// src/procedure/state.rs

use std::fmt;

use uuid::Uuid;

/// Unique identifier of a procedure, generated at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcedureId(Uuid);

impl ProcedureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcedureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a procedure.
///
/// States only move forward:
///
/// ```text
/// Initialized -> Pending -> Executing -> Finishing -> Finished
///                   \_____________________/
///                   (never executed: cancelled, or conditions
///                    failed / asked not to execute)
/// ```
///
/// Cancellation is tracked separately as a flag and does not have a state
/// of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcedureState {
    /// Created; dependencies and conditions may still be changed.
    Initialized,
    /// Accepted by a queue; waiting on dependencies and conditions.
    Pending,
    /// The body is running.
    Executing,
    /// `finish` has been accepted and teardown is in progress.
    Finishing,
    /// Terminal.
    Finished,
}

impl ProcedureState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ProcedureState) -> bool {
        use ProcedureState::*;
        matches!(
            (self, next),
            (Initialized, Pending)
                | (Pending, Executing)
                | (Pending, Finishing)
                | (Executing, Finishing)
                | (Finishing, Finished)
        )
    }

    pub fn is_finished(self) -> bool {
        self == ProcedureState::Finished
    }
}

impl fmt::Display for ProcedureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcedureState::Initialized => "initialized",
            ProcedureState::Pending => "pending",
            ProcedureState::Executing => "executing",
            ProcedureState::Finishing => "finishing",
            ProcedureState::Finished => "finished",
        };
        f.write_str(s)
    }
}
