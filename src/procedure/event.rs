// src/procedure/event.rs

//! One-shot, thread-safe signal.
//!
//! An [`Event`] starts unsignaled and can be signaled exactly once; further
//! calls to [`Event::signal`] are no-ops. Waiters can block a thread
//! ([`Event::wait_blocking`]) or await it ([`Event::wait`]). Everything
//! written before `signal` returns is visible to a waiter once it wakes.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::sync::lock;

#[derive(Clone, Default)]
pub struct Event {
    inner: Arc<EventInner>,
}

#[derive(Default)]
struct EventInner {
    signaled: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the event complete and wake all waiters.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn signal(&self) -> bool {
        {
            let mut signaled = lock(&self.inner.signaled);
            if *signaled {
                return false;
            }
            *signaled = true;
        }

        self.inner.condvar.notify_all();
        self.inner.notify.notify_waiters();
        true
    }

    /// Non-blocking poll.
    pub fn is_signaled(&self) -> bool {
        *lock(&self.inner.signaled)
    }

    /// Wait asynchronously until signaled.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking the flag so a signal landing
            // between the check and the await is not lost.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_signaled() {
                return;
            }

            notified.await;
        }
    }

    /// Block the calling thread until signaled.
    ///
    /// Must not be called from inside an async task.
    pub fn wait_blocking(&self) {
        let mut signaled = lock(&self.inner.signaled);
        while !*signaled {
            signaled = self
                .inner
                .condvar
                .wait(signaled)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`. Returns whether the event was signaled.
    pub fn wait_blocking_timeout(&self, timeout: Duration) -> bool {
        let signaled = lock(&self.inner.signaled);
        let (signaled, _result) = self
            .inner
            .condvar
            .wait_timeout_while(signaled, timeout, |signaled| !*signaled)
            .unwrap_or_else(PoisonError::into_inner);
        *signaled
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
