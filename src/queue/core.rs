// src/queue/core.rs

//! Pure queue bookkeeping.
//!
//! [`QueueCore`] tracks every procedure a queue has accepted, orders the
//! ones that are ready to run and enforces the concurrency limit. It has no
//! tokio types and performs no IO: callers feed it transitions and get back
//! the items that should start now. The async shell in
//! [`crate::queue::ProcedureQueue`] owns one behind a mutex.
//!
//! An entry moves through three phases:
//!
//! - `Gating`: waiting on its start gate, dependencies and conditions;
//! - `Ready`: cleared to run, waiting for a free slot;
//! - `Started`: handed out by [`QueueCore::drain_startable`] and counted
//!   against the limit until it is detached.
//!
//! Ready entries start in the order they became ready. Each call to
//! [`QueueCore::mark_ready`] takes the next readiness stamp, so two entries
//! never tie; submission order only decides [`QueueCore::items`].

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::procedure::ProcedureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Gating,
    Ready { stamp: u64 },
    Started,
}

#[derive(Debug)]
struct Entry<T> {
    item: T,
    sequence: u64,
    phase: Phase,
    producer: Option<ProcedureId>,
}

#[derive(Debug)]
pub struct QueueCore<T> {
    entries: HashMap<ProcedureId, Entry<T>>,
    ready: BTreeMap<u64, ProcedureId>,
    /// Detached but not yet settled; keeps the queue non-idle until the
    /// did-finish side of a procedure has run.
    settling: HashSet<ProcedureId>,
    executing: usize,
    limit: Option<usize>,
    suspended: bool,
    next_sequence: u64,
    next_ready_stamp: u64,
}

impl<T: Clone> QueueCore<T> {
    /// `limit` of `None` means unbounded.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            ready: BTreeMap::new(),
            settling: HashSet::new(),
            executing: 0,
            limit,
            suspended: false,
            next_sequence: 0,
            next_ready_stamp: 0,
        }
    }

    /// Start tracking `item`. Returns its submission sequence number, or
    /// `None` if `id` is already tracked.
    pub fn track(&mut self, id: ProcedureId, item: T, producer: Option<ProcedureId>) -> Option<u64> {
        if self.entries.contains_key(&id) {
            return None;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            id,
            Entry {
                item,
                sequence,
                phase: Phase::Gating,
                producer,
            },
        );
        Some(sequence)
    }

    /// The entry cleared its gate. Returns what can start now.
    pub fn mark_ready(&mut self, id: ProcedureId) -> Vec<T> {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.phase == Phase::Gating {
                let stamp = self.next_ready_stamp;
                self.next_ready_stamp += 1;
                entry.phase = Phase::Ready { stamp };
                self.ready.insert(stamp, id);
            }
        }
        self.drain_startable()
    }

    /// Take a ready entry back out of line so its owner can finish it
    /// without running. Returns `false` if it is not waiting for a slot.
    pub fn withdraw(&mut self, id: ProcedureId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        let Phase::Ready { stamp } = entry.phase else {
            return false;
        };
        self.ready.remove(&stamp);
        entry.phase = Phase::Gating;
        true
    }

    /// Stop tracking `id` and free its slot. Returns what can start now.
    pub fn detach(&mut self, id: ProcedureId) -> Vec<T> {
        if let Some(entry) = self.entries.remove(&id) {
            match entry.phase {
                Phase::Started => self.executing = self.executing.saturating_sub(1),
                Phase::Ready { stamp } => {
                    self.ready.remove(&stamp);
                }
                Phase::Gating => {}
            }
            debug!(
                id = %id,
                produced_by = ?entry.producer.map(|producer| producer.to_string()),
                "queue core: entry detached"
            );
            self.settling.insert(id);
        }
        self.drain_startable()
    }

    /// The detached entry is completely done. Returns `true` if the queue
    /// became idle.
    pub fn settle(&mut self, id: ProcedureId) -> bool {
        self.settling.remove(&id) && self.is_idle()
    }

    /// Hand out ready entries while slots are free, in ready order.
    pub fn drain_startable(&mut self) -> Vec<T> {
        let mut started = Vec::new();
        if self.suspended {
            return started;
        }

        while self.limit.is_none_or(|limit| self.executing < limit) {
            let Some((_, id)) = self.ready.pop_first() else {
                break;
            };
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            entry.phase = Phase::Started;
            self.executing += 1;
            started.push(entry.item.clone());
        }

        if !started.is_empty() {
            debug!(
                started = started.len(),
                executing = self.executing,
                waiting = self.ready.len(),
                "queue core: starting ready procedures"
            );
        }
        started
    }

    pub fn set_limit(&mut self, limit: Option<usize>) -> Vec<T> {
        self.limit = limit;
        self.drain_startable()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) -> Vec<T> {
        self.suspended = false;
        self.drain_startable()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Number of tracked (not yet detached) entries.
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    pub fn executing_count(&self) -> usize {
        self.executing
    }

    /// Nothing tracked and nothing settling.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.settling.is_empty()
    }

    /// Tracked items in submission order.
    pub fn items(&self) -> Vec<T> {
        let mut entries: Vec<&Entry<T>> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries.into_iter().map(|entry| entry.item.clone()).collect()
    }
}
