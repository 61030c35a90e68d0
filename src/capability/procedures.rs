// src/capability/procedures.rs

use std::sync::Arc;

use tracing::debug;

use crate::BoxFuture;
use crate::capability::{AuthorizationStatus, Capability};
use crate::procedure::{ExecutionContext, Procedure, ResultProducer, Slot};

/// Reads the current status without prompting.
pub struct GetAuthorizationStatusProcedure<C: Capability> {
    capability: Arc<C>,
    status: Slot<C::Status>,
}

impl<C: Capability> GetAuthorizationStatusProcedure<C> {
    pub fn new(capability: Arc<C>) -> Self {
        Self {
            capability,
            status: Slot::new(),
        }
    }

    pub fn status(&self) -> Option<C::Status> {
        self.status.get()
    }
}

impl<C: Capability> Procedure for GetAuthorizationStatusProcedure<C> {
    fn name(&self) -> String {
        format!("GetAuthorizationStatus<{}>", self.capability.name())
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.capability.is_available() {
                self.status.set(self.capability.authorization_status());
            }
            ctx.finish(Vec::new());
        })
    }
}

impl<C: Capability> ResultProducer for GetAuthorizationStatusProcedure<C> {
    type Output = C::Status;

    fn output(&self) -> Option<C::Status> {
        self.status()
    }
}

/// Prompts for authorization if the status is still undetermined.
///
/// Does nothing when the capability is unavailable or the user has already
/// answered. The resulting status is available as the procedure's output.
pub struct AuthorizeCapabilityProcedure<C: Capability> {
    capability: Arc<C>,
    status: Slot<C::Status>,
}

impl<C: Capability> AuthorizeCapabilityProcedure<C> {
    pub fn new(capability: Arc<C>) -> Self {
        Self {
            capability,
            status: Slot::new(),
        }
    }

    pub fn status(&self) -> Option<C::Status> {
        self.status.get()
    }
}

impl<C: Capability> Procedure for AuthorizeCapabilityProcedure<C> {
    fn name(&self) -> String {
        format!("AuthorizeCapability<{}>", self.capability.name())
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if !self.capability.is_available() {
                ctx.finish(Vec::new());
                return;
            }

            let current = self.capability.authorization_status();
            let status = if current.is_determined() {
                current
            } else {
                debug!(capability = %self.capability.name(), "requesting authorization");
                self.capability.request_authorization().await
            };
            debug!(
                capability = %self.capability.name(),
                status = ?status,
                "authorization status"
            );
            self.status.set(status);
            ctx.finish(Vec::new());
        })
    }
}

impl<C: Capability> ResultProducer for AuthorizeCapabilityProcedure<C> {
    type Output = C::Status;

    fn output(&self) -> Option<C::Status> {
        self.status()
    }
}
