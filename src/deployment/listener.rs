// Package deployment provides the completion listener aggregating batch outcomes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::registry::{ServiceListener, ServiceName, StartError};

/// Outcome of one batch, handed to the batch callback.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Services of this batch that failed to start.
    pub failures: HashMap<ServiceName, StartError>,
    /// Services observed over every batch so far.
    pub service_count: usize,
    pub elapsed: Duration,
}

/// Cumulative outcome of the whole deployment, handed to the completion callback.
#[derive(Debug, Clone)]
pub struct Completion {
    pub failures: HashMap<ServiceName, StartError>,
    pub service_count: usize,
    pub elapsed: Duration,
}

pub type BatchCallback = Box<dyn FnOnce(BatchSummary) + Send>;
pub type CompletionCallback = Box<dyn FnOnce(Completion) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    BatchFinished,
    Done,
}

struct State {
    phase: Phase,
    pending: usize,
    batch_failures: HashMap<ServiceName, StartError>,
    batch_callback: Option<BatchCallback>,
    failures: HashMap<ServiceName, StartError>,
    service_count: usize,
    deployment_finished: bool,
    completion: Option<CompletionCallback>,
}

enum Fire {
    Batch(BatchCallback, BatchSummary),
    Completion(CompletionCallback, Completion),
}

/// DeploymentServiceListener tracks the services of a deployment's batches.
///
/// Each batch moves OPEN -> BATCH_FINISHED -> DONE: it is DONE once the submission was
/// acknowledged with `finish_batch` and every added service settled. The batch callback
/// fires when the batch is DONE; the completion callback fires when the current batch is
/// DONE and `finish_deployment` was called. Both fire outside the internal lock, at most once.
pub struct DeploymentServiceListener {
    started: Instant,
    state: Mutex<State>,
}

impl DeploymentServiceListener {
    pub fn new(completion: CompletionCallback) -> Self {
        Self {
            started: Instant::now(),
            state: Mutex::new(State {
                phase: Phase::Done,
                pending: 0,
                batch_failures: HashMap::new(),
                batch_callback: None,
                failures: HashMap::new(),
                service_count: 0,
                deployment_finished: false,
                completion: Some(completion),
            }),
        }
    }

    /// Opens a new batch. `callback` runs once the batch is DONE.
    pub fn start_batch(&self, callback: Option<BatchCallback>) {
        let mut state = self.state.lock();
        state.phase = Phase::Open;
        state.pending = 0;
        state.batch_failures.clear();
        state.batch_callback = callback;
    }

    /// Marks the current batch as submitted.
    pub fn finish_batch(&self) {
        let fired = {
            let mut state = self.state.lock();
            if state.phase == Phase::Open {
                state.phase = Phase::BatchFinished;
            }
            self.advance(&mut state)
        };
        run(fired);
    }

    /// Marks the deployment as having no more batches.
    pub fn finish_deployment(&self) {
        let fired = {
            let mut state = self.state.lock();
            state.deployment_finished = true;
            self.advance(&mut state)
        };
        run(fired);
    }

    /// Time since the listener was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Number of services added over every batch so far.
    pub fn service_count(&self) -> usize {
        self.state.lock().service_count
    }

    /// Cumulative failures over every batch so far.
    pub fn failures(&self) -> HashMap<ServiceName, StartError> {
        self.state.lock().failures.clone()
    }

    fn settle(&self, name: &ServiceName, cause: Option<&StartError>) {
        let fired = {
            let mut state = self.state.lock();
            state.pending = state.pending.saturating_sub(1);
            if let Some(cause) = cause {
                state.batch_failures.insert(name.clone(), cause.clone());
                state.failures.insert(name.clone(), cause.clone());
            }
            self.advance(&mut state)
        };
        run(fired);
    }

    // Computes the callbacks due in the current state. Only called under the lock.
    fn advance(&self, state: &mut State) -> Vec<Fire> {
        let mut fired = Vec::new();
        if state.phase == Phase::BatchFinished && state.pending == 0 {
            state.phase = Phase::Done;
            debug!(
                component = "deployment-listener",
                event = "batch_done",
                services = state.service_count,
                failures = state.batch_failures.len(),
                "batch done"
            );
            if let Some(callback) = state.batch_callback.take() {
                fired.push(Fire::Batch(
                    callback,
                    BatchSummary {
                        failures: std::mem::take(&mut state.batch_failures),
                        service_count: state.service_count,
                        elapsed: self.started.elapsed(),
                    },
                ));
            }
        }

        if state.phase == Phase::Done && state.deployment_finished {
            if let Some(callback) = state.completion.take() {
                fired.push(Fire::Completion(
                    callback,
                    Completion {
                        failures: state.failures.clone(),
                        service_count: state.service_count,
                        elapsed: self.started.elapsed(),
                    },
                ));
            }
        }
        fired
    }
}

fn run(fired: Vec<Fire>) {
    for fire in fired {
        match fire {
            Fire::Batch(callback, summary) => callback(summary),
            Fire::Completion(callback, completion) => callback(completion),
        }
    }
}

impl ServiceListener for DeploymentServiceListener {
    fn service_added(&self, _name: &ServiceName) {
        let mut state = self.state.lock();
        state.pending += 1;
        state.service_count += 1;
    }

    fn service_started(&self, name: &ServiceName) {
        self.settle(name, None);
    }

    fn service_failed(&self, name: &ServiceName, cause: &StartError) {
        self.settle(name, Some(cause));
    }

    fn service_passive(&self, name: &ServiceName) {
        self.settle(name, None);
    }
}
