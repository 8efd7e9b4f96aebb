//! In-process service registry running services on a tokio runtime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::api::{PostHook, ServiceHandle, ServiceRegistry};
use super::batch::Batch;
use super::controller::Controller;
use super::error::RegistrationError;
use super::name::ServiceName;
use super::service::{Mode, ServiceState, StartError};

#[derive(Default)]
struct Graph {
    services: HashMap<ServiceName, Arc<Controller>>,
    dependents: HashMap<ServiceName, HashSet<ServiceName>>,
}

impl Graph {
    fn has_dependents(&self, name: &ServiceName) -> bool {
        self.dependents.get(name).is_some_and(|d| !d.is_empty())
    }
}

struct Inner {
    runtime: Handle,
    graph: Mutex<Graph>,
}

/// ServiceContainer installs batches and starts/stops services in dependency order.
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<Inner>,
}

impl ServiceContainer {
    /// Creates a container whose services run on the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                graph: Mutex::new(Graph::default()),
            }),
        }
    }

    /// Gets the runtime the container schedules on.
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// Gets the number of installed services.
    pub fn len(&self) -> usize {
        self.inner.graph.lock().services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the names of all installed services.
    pub fn names(&self) -> Vec<ServiceName> {
        self.inner.graph.lock().services.keys().cloned().collect()
    }

    fn validate(graph: &Graph, batch: &Batch) -> Result<(), RegistrationError> {
        let mut batch_names = HashSet::with_capacity(batch.len());
        for name in batch.names() {
            if graph.services.contains_key(name) || !batch_names.insert(name) {
                return Err(RegistrationError::DuplicateService(name.clone()));
            }
        }

        for descriptor in &batch.services {
            for dep in &descriptor.dependencies {
                if !batch_names.contains(&dep.name) && !graph.services.contains_key(&dep.name) {
                    return Err(RegistrationError::MissingDependency {
                        service: descriptor.name.clone(),
                        dependency: dep.name.clone(),
                    });
                }
            }
        }

        // Installed services can only depend on older ones, so a cycle lives inside the batch.
        let edges: HashMap<&ServiceName, Vec<&ServiceName>> = batch
            .services
            .iter()
            .map(|d| {
                let deps = d
                    .dependencies
                    .iter()
                    .map(|dep| &dep.name)
                    .filter(|n| batch_names.contains(n))
                    .collect();
                (&d.name, deps)
            })
            .collect();

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            node: &'a ServiceName,
            edges: &HashMap<&'a ServiceName, Vec<&'a ServiceName>>,
            marks: &mut HashMap<&'a ServiceName, Mark>,
        ) -> Result<(), RegistrationError> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(RegistrationError::CyclicDependency(node.clone())),
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            for next in edges.get(node).into_iter().flatten() {
                visit(next, edges, marks)?;
            }
            marks.insert(node, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::with_capacity(edges.len());
        for name in batch.names() {
            visit(name, &edges, &mut marks)?;
        }
        Ok(())
    }

    /// Collects the services to remove: the requested ones, everything depending on them and
    /// on-demand dependencies nothing else needs anymore.
    fn removal_set(graph: &Graph, names: &[ServiceName]) -> HashSet<ServiceName> {
        let mut set: HashSet<ServiceName> = names
            .iter()
            .filter(|n| graph.services.contains_key(*n))
            .cloned()
            .collect();

        let mut queue: Vec<ServiceName> = set.iter().cloned().collect();
        while let Some(name) = queue.pop() {
            for dependent in graph.dependents.get(&name).into_iter().flatten() {
                if set.insert(dependent.clone()) {
                    queue.push(dependent.clone());
                }
            }
        }

        loop {
            let orphans: Vec<ServiceName> = set
                .iter()
                .filter_map(|n| graph.services.get(n))
                .flat_map(|c| c.dependencies().iter().map(|d| d.name.clone()))
                .filter(|dep| !set.contains(dep))
                .filter(|dep| {
                    graph.services.get(dep).is_some_and(|c| c.mode() == Mode::OnDemand)
                        && graph
                            .dependents
                            .get(dep)
                            .map_or(true, |ds| ds.iter().all(|d| set.contains(d)))
                })
                .collect();
            if orphans.is_empty() {
                break;
            }
            set.extend(orphans);
        }

        set
    }
}

impl Inner {
    fn demand(self: &Arc<Self>, controller: &Arc<Controller>) {
        if !controller.request_start() {
            return;
        }
        let inner = self.clone();
        let controller = controller.clone();
        self.runtime.spawn(async move {
            if !controller.begin_start() {
                return;
            }
            let dependencies = inner.resolve_dependencies(&controller).await;
            controller.start(dependencies).await;
        });
    }

    /// Demands every dependency, waits for them and applies injector bindings.
    async fn resolve_dependencies(self: &Arc<Self>, controller: &Arc<Controller>) -> Result<(), StartError> {
        let resolved: Vec<_> = {
            let graph = self.graph.lock();
            controller
                .dependencies()
                .iter()
                .map(|d| (d.clone(), graph.services.get(&d.name).cloned()))
                .collect()
        };

        for dep in resolved.iter().filter_map(|(_, c)| c.as_ref()) {
            self.demand(dep);
        }

        for (dependency, dep) in resolved {
            let dep = dep.ok_or_else(|| StartError::DependencyGone(dependency.name.clone()))?;
            match dep.settled().await {
                ServiceState::Up => {}
                ServiceState::Failed(_) => return Err(StartError::DependencyFailed(dependency.name)),
                _ => return Err(StartError::DependencyGone(dependency.name)),
            }

            if let Some(binding) = &dependency.binding {
                let value = dep.service().value().ok_or_else(|| {
                    StartError::injection(binding.property(), format!("{} exposes no value", dependency.name))
                })?;
                binding.inject(value)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for ServiceContainer {
    fn install(&self, batch: Batch) -> Result<(), RegistrationError> {
        let (immediate, passive) = {
            let mut graph = self.inner.graph.lock();
            if let Err(e) = Self::validate(&graph, &batch) {
                warn!(component = "registry", event = "batch_rejected", error = %e, "batch rejected");
                return Err(e);
            }

            let listeners = batch.listeners;
            let controllers: Vec<Arc<Controller>> = batch
                .services
                .into_iter()
                .map(|d| Controller::new(d, listeners.clone()))
                .collect();

            for controller in &controllers {
                let name = controller.name().clone();
                for dep in controller.dependencies() {
                    graph.dependents.entry(dep.name.clone()).or_default().insert(name.clone());
                }
                graph.services.insert(name, controller.clone());
            }

            // Listeners must know the whole batch before the first service can settle.
            for controller in &controllers {
                controller.report_added();
            }

            let (immediate, on_demand): (Vec<_>, Vec<_>) = controllers
                .into_iter()
                .partition(|c| c.mode() == Mode::Immediate);
            let passive: Vec<_> = on_demand
                .into_iter()
                .filter(|c| !graph.has_dependents(c.name()))
                .collect();

            info!(
                component = "registry",
                event = "batch_installed",
                services = graph.services.len(),
                immediate = immediate.len(),
                "batch installed"
            );
            (immediate, passive)
        };

        for controller in &passive {
            controller.report_passive();
        }
        for controller in &immediate {
            self.inner.demand(controller);
        }
        Ok(())
    }

    fn lookup(&self, name: &ServiceName) -> Option<Arc<dyn ServiceHandle>> {
        let graph = self.inner.graph.lock();
        graph
            .services
            .get(name)
            .map(|c| c.clone() as Arc<dyn ServiceHandle>)
    }

    async fn stop_all(&self, names: Vec<ServiceName>, post_hook: PostHook) {
        let mut remaining: HashMap<ServiceName, Arc<Controller>> = {
            let mut graph = self.inner.graph.lock();
            let set = Self::removal_set(&graph, &names);

            let removed: HashMap<ServiceName, Arc<Controller>> = set
                .iter()
                .filter_map(|n| graph.services.remove(n).map(|c| (n.clone(), c)))
                .collect();

            for controller in removed.values() {
                for dep in controller.dependencies() {
                    if let Some(dependents) = graph.dependents.get_mut(&dep.name) {
                        dependents.remove(controller.name());
                        if dependents.is_empty() {
                            graph.dependents.remove(&dep.name);
                        }
                    }
                }
            }
            for name in removed.keys() {
                graph.dependents.remove(name);
            }
            removed
        };

        info!(
            component = "registry",
            event = "stop_requested",
            requested = names.len(),
            services = remaining.len(),
            "stopping services"
        );

        // Dependents go down before their dependencies.
        while !remaining.is_empty() {
            let mut level: Vec<ServiceName> = remaining
                .keys()
                .filter(|n| !remaining.values().any(|c| c.depends_on(n)))
                .cloned()
                .collect();
            if level.is_empty() {
                level = remaining.keys().cloned().collect();
            }

            let controllers: Vec<Arc<Controller>> =
                level.iter().filter_map(|n| remaining.remove(n)).collect();
            debug!(component = "registry", event = "stop_level", services = controllers.len(), "stopping level");
            join_all(controllers.iter().map(|c| c.stop())).await;
        }

        post_hook();
    }
}
