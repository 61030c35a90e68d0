// src/capability/condition.rs

use std::sync::Arc;

use crate::BoxFuture;
use crate::capability::{AuthorizationStatus, AuthorizeCapabilityProcedure, Capability};
use crate::condition::{Condition, ConditionResult};
use crate::errors::ProcedureError;
use crate::procedure::Operation;

/// Requires a capability to be available and authorized.
///
/// Produces an [`AuthorizeCapabilityProcedure`] as a dependency, so an
/// undetermined status is resolved by prompting before the condition is
/// evaluated.
pub struct AuthorizedFor<C: Capability> {
    capability: Arc<C>,
}

impl<C: Capability> AuthorizedFor<C> {
    pub fn new(capability: Arc<C>) -> Self {
        Self { capability }
    }
}

impl<C: Capability> Condition for AuthorizedFor<C> {
    fn name(&self) -> String {
        format!("AuthorizedFor<{}>", self.capability.name())
    }

    fn produce_dependencies(&self, _operation: &Operation) -> Vec<Operation> {
        let authorize = Operation::new(AuthorizeCapabilityProcedure::new(Arc::clone(
            &self.capability,
        )));
        vec![authorize.into_operation()]
    }

    fn evaluate<'a>(&'a self, _operation: &'a Operation) -> BoxFuture<'a, ConditionResult> {
        Box::pin(async move {
            if !self.capability.is_available() {
                return ConditionResult::Failed(ProcedureError::CapabilityUnavailable {
                    capability: self.capability.name(),
                });
            }

            let status = self.capability.authorization_status();
            if status.meets(&self.capability.requirement()) {
                ConditionResult::Satisfied
            } else {
                ConditionResult::Failed(ProcedureError::CapabilityUnauthorized {
                    capability: self.capability.name(),
                    status: format!("{status:?}"),
                })
            }
        })
    }
}
