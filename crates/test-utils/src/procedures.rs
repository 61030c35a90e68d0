use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procqueue::procedure::{RequirementConsumer, ResultProducer, Slot};
use procqueue::{BoxFuture, Event, ExecutionContext, Procedure, ProcedureError};

/// Shared, ordered record of procedure names as they start executing.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str) {
        self.entries.lock().unwrap().push(name.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Position of `name` in the log, if it ran.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries().iter().position(|entry| entry == name)
    }
}

/// Tracks how many procedures sharing it are running at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Configurable procedure for tests.
///
/// Counts executions, optionally sleeps (cut short by cancellation), then
/// finishes with its configured errors or sets its configured output. It
/// produces and consumes `String`s for injection tests.
pub struct TestProcedure {
    name: String,
    executions: AtomicUsize,
    errors: Vec<ProcedureError>,
    configured_output: Option<String>,
    output: Slot<String>,
    requirement: Slot<String>,
    requirement_at_start: Slot<String>,
    delay: Option<Duration>,
    log: Option<ExecutionLog>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl TestProcedure {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executions: AtomicUsize::new(0),
            errors: Vec::new(),
            configured_output: None,
            output: Slot::new(),
            requirement: Slot::new(),
            requirement_at_start: Slot::new(),
            delay: None,
            log: None,
            gauge: None,
        }
    }

    pub fn failing_with(mut self, message: &str) -> Self {
        self.errors.push(ProcedureError::message(message));
        self
    }

    pub fn producing(mut self, output: &str) -> Self {
        self.configured_output = Some(output.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_log(mut self, log: &ExecutionLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn with_gauge(mut self, gauge: &Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(Arc::clone(gauge));
        self
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Requirement as it was when the body started.
    pub fn requirement_at_start(&self) -> Option<String> {
        self.requirement_at_start.get()
    }
}

impl Procedure for TestProcedure {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if let Some(requirement) = self.requirement.get() {
                self.requirement_at_start.set(requirement);
            }
            if let Some(log) = &self.log {
                log.record(&self.name);
            }
            if let Some(gauge) = &self.gauge {
                gauge.enter();
            }

            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancelled() => {}
                }
            }

            if let Some(gauge) = &self.gauge {
                gauge.exit();
            }

            if self.errors.is_empty() {
                if let Some(output) = &self.configured_output {
                    self.output.set(output.clone());
                }
                ctx.finish(Vec::new());
            } else {
                ctx.finish(self.errors.clone());
            }
        })
    }
}

impl ResultProducer for TestProcedure {
    type Output = String;

    fn output(&self) -> Option<String> {
        self.output.get()
    }
}

impl RequirementConsumer for TestProcedure {
    type Requirement = String;

    fn set_requirement(&self, requirement: String) {
        self.requirement.set(requirement);
    }
}

/// Procedure whose body only records that it started; the test decides
/// when and how it finishes.
pub struct ManualProcedure {
    name: String,
    started: Event,
    executions: AtomicUsize,
    context: Mutex<Option<ExecutionContext>>,
}

impl ManualProcedure {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: Event::new(),
            executions: AtomicUsize::new(0),
            context: Mutex::new(None),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn has_started(&self) -> bool {
        self.started.is_signaled()
    }

    pub async fn wait_started(&self) {
        self.started.wait().await;
    }

    /// The context handed to the body, once it started.
    pub fn context(&self) -> Option<ExecutionContext> {
        self.context.lock().unwrap().clone()
    }

    /// Finish through the stored context. Panics if the body never started.
    pub fn finish(&self, errors: Vec<ProcedureError>) {
        self.context()
            .expect("ManualProcedure::finish called before the body started")
            .finish(errors);
    }
}

impl Procedure for ManualProcedure {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.executions.fetch_add(1, Ordering::SeqCst);
            *self.context.lock().unwrap() = Some(ctx);
            self.started.signal();
        })
    }
}
