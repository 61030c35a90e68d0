use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use procqueue::BoxFuture;
use procqueue::capability::{AuthorizationStatus, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationUsage {
    WhenInUse,
    Always,
}

impl AuthorizationStatus for LocationStatus {
    type Requirement = LocationUsage;

    fn is_determined(&self) -> bool {
        *self != LocationStatus::NotDetermined
    }

    fn meets(&self, requirement: &LocationUsage) -> bool {
        match (self, requirement) {
            (LocationStatus::AuthorizedAlways, _) => true,
            (LocationStatus::AuthorizedWhenInUse, LocationUsage::WhenInUse) => true,
            _ => false,
        }
    }
}

/// In-memory location provider. A request switches the status to the
/// configured response.
#[derive(Debug)]
pub struct FakeLocationCapability {
    available: bool,
    usage: LocationUsage,
    status: Mutex<LocationStatus>,
    response: LocationStatus,
    requests: AtomicUsize,
}

impl FakeLocationCapability {
    pub fn new(status: LocationStatus, response: LocationStatus) -> Self {
        Self {
            available: true,
            usage: LocationUsage::WhenInUse,
            status: Mutex::new(status),
            response,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(LocationStatus::NotDetermined, LocationStatus::NotDetermined)
        }
    }

    pub fn requiring(mut self, usage: LocationUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Capability for FakeLocationCapability {
    type Status = LocationStatus;

    fn name(&self) -> String {
        "Location".to_string()
    }

    fn requirement(&self) -> LocationUsage {
        self.usage
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn authorization_status(&self) -> LocationStatus {
        *self.status.lock().unwrap()
    }

    fn request_authorization(&self) -> BoxFuture<'_, LocationStatus> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.status.lock().unwrap() = self.response;
            self.response
        })
    }
}
