// src/capability/mod.rs

//! Permission-style collaborators consumed through the condition and
//! procedure interfaces.
//!
//! A [`Capability`] wraps some external provider (location services, a
//! photo library, a calendar) that has an availability flag and an
//! authorization status. The crate only needs to read the status and to ask
//! for authorization; everything else stays with the provider.

pub mod condition;
pub mod procedures;

pub use condition::AuthorizedFor;
pub use procedures::{AuthorizeCapabilityProcedure, GetAuthorizationStatusProcedure};

use std::fmt;

use crate::BoxFuture;

/// Authorization state reported by a capability.
pub trait AuthorizationStatus: Clone + fmt::Debug + Send + Sync + 'static {
    /// What a caller needs, e.g. "when in use" vs "always" for location.
    type Requirement: Clone + fmt::Debug + Send + Sync + 'static;

    /// `false` while the user has not been asked yet.
    fn is_determined(&self) -> bool;

    fn meets(&self, requirement: &Self::Requirement) -> bool;
}

pub trait Capability: Send + Sync + 'static {
    type Status: AuthorizationStatus;

    fn name(&self) -> String;

    fn requirement(&self) -> <Self::Status as AuthorizationStatus>::Requirement;

    /// Whether the underlying service exists and is enabled at all.
    fn is_available(&self) -> bool;

    fn authorization_status(&self) -> Self::Status;

    /// Ask for authorization and resolve with the resulting status.
    fn request_authorization(&self) -> BoxFuture<'_, Self::Status>;
}
