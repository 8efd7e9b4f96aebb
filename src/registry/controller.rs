// Per-service lifecycle controller.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::api::ServiceHandle;
use super::batch::{Dependency, ServiceDescriptor};
use super::listener::ServiceListener;
use super::name::ServiceName;
use super::service::{Mode, Service, ServiceState, ServiceValue, StartError};

/// Controller owns one installed service and drives its state transitions.
pub(crate) struct Controller {
    name: ServiceName,
    service: Arc<dyn Service>,
    mode: Mode,
    dependencies: Vec<Dependency>,
    listeners: Vec<Arc<dyn ServiceListener>>,
    state: watch::Sender<ServiceState>,
    start_requested: AtomicBool,
    reported: AtomicBool,
}

impl Controller {
    pub(crate) fn new(descriptor: ServiceDescriptor, listeners: Vec<Arc<dyn ServiceListener>>) -> Arc<Self> {
        let (state, _) = watch::channel(ServiceState::Down);
        Arc::new(Self {
            name: descriptor.name,
            service: descriptor.service,
            mode: descriptor.mode,
            dependencies: descriptor.dependencies,
            listeners,
            state,
            start_requested: AtomicBool::new(false),
            reported: AtomicBool::new(false),
        })
    }

    pub(crate) fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub(crate) fn depends_on(&self, name: &ServiceName) -> bool {
        self.dependencies.iter().any(|d| &d.name == name)
    }

    /// Marks the start as requested. Returns false if it already was.
    pub(crate) fn request_start(&self) -> bool {
        !self.start_requested.swap(true, Ordering::AcqRel)
    }

    /// Waits until the service is up, failed or removed.
    pub(crate) async fn settled(&self) -> ServiceState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(ServiceState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => ServiceState::Removed,
        };
        state
    }

    /// Runs the start of the service once its dependencies are resolved.
    /// `dependencies` is the outcome of resolving and injecting every dependency edge.
    pub(crate) async fn start(&self, dependencies: Result<(), StartError>) {
        let result = match dependencies {
            Ok(()) => AssertUnwindSafe(self.service.start(&self.name))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(StartError::failed("service panicked while starting"))),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.state.send_replace(ServiceState::Up);
                debug!(component = "registry", event = "service_up", service = %self.name, "service started");
                self.report(|l| l.service_started(&self.name));
            }
            Err(e) => {
                warn!(component = "registry", event = "service_failed", service = %self.name, error = %e, "service failed to start");
                self.state.send_replace(ServiceState::Failed(e.clone()));
                self.report(|l| l.service_failed(&self.name, &e));
            }
        }
    }

    /// Moves Down -> Starting. Returns false if the service was removed in the meantime.
    pub(crate) fn begin_start(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ServiceState::Down {
                *state = ServiceState::Starting;
                true
            } else {
                false
            }
        })
    }

    /// Stops the service if it is up and marks it removed.
    /// A service removed before it started settles as failed for its listeners.
    pub(crate) async fn stop(&self) {
        let never_started = self.state.send_if_modified(|state| {
            if *state == ServiceState::Down {
                *state = ServiceState::Removed;
                true
            } else {
                false
            }
        });

        if never_started {
            let cause = StartError::Removed(self.name.clone());
            self.report(|l| l.service_failed(&self.name, &cause));
        } else {
            if self.settled().await == ServiceState::Up {
                self.service.stop(&self.name).await;
            }
            self.state.send_replace(ServiceState::Removed);
        }

        debug!(component = "registry", event = "service_removed", service = %self.name, "service removed");
        for listener in &self.listeners {
            listener.service_removed(&self.name);
        }
    }

    pub(crate) fn report_added(&self) {
        for listener in &self.listeners {
            listener.service_added(&self.name);
        }
    }

    pub(crate) fn report_passive(&self) {
        self.report(|l| l.service_passive(&self.name));
    }

    pub(crate) fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    // Each service settles exactly once from the listeners' point of view.
    fn report<F: Fn(&dyn ServiceListener)>(&self, f: F) {
        if self.reported.swap(true, Ordering::AcqRel) {
            return;
        }
        for listener in &self.listeners {
            f(listener.as_ref());
        }
    }
}

impl ServiceHandle for Controller {
    fn name(&self) -> &ServiceName {
        &self.name
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn state(&self) -> ServiceState {
        self.state.borrow().clone()
    }

    fn value(&self) -> Option<ServiceValue> {
        if *self.state.borrow() == ServiceState::Up {
            self.service.value()
        } else {
            None
        }
    }
}
