use std::sync::{Arc, Mutex};

use procqueue::{Observer, Operation, ProcedureError};

/// Lifecycle point seen by a [`RecordingObserver`], with error counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    DidAttach,
    WillExecute,
    WillCancel(usize),
    DidCancel(usize),
    DidProduce(String),
    WillFinish(usize),
    DidFinish(usize),
}

/// Records every callback in order. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Recorded) -> bool) -> usize {
        self.events().iter().filter(|event| pred(event)).count()
    }

    pub fn did_finish_count(&self) -> usize {
        self.count(|event| matches!(event, Recorded::DidFinish(_)))
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl Observer for RecordingObserver {
    fn did_attach(&self, _operation: &Operation) {
        self.push(Recorded::DidAttach);
    }

    fn will_execute(&self, _operation: &Operation) {
        self.push(Recorded::WillExecute);
    }

    fn will_cancel(&self, _operation: &Operation, errors: &[ProcedureError]) {
        self.push(Recorded::WillCancel(errors.len()));
    }

    fn did_cancel(&self, _operation: &Operation, errors: &[ProcedureError]) {
        self.push(Recorded::DidCancel(errors.len()));
    }

    fn did_produce(&self, _operation: &Operation, produced: &Operation) {
        self.push(Recorded::DidProduce(produced.name().to_string()));
    }

    fn will_finish(&self, _operation: &Operation, errors: &[ProcedureError]) {
        self.push(Recorded::WillFinish(errors.len()));
    }

    fn did_finish(&self, _operation: &Operation, errors: &[ProcedureError]) {
        self.push(Recorded::DidFinish(errors.len()));
    }
}
