//! Batch submissions: descriptors, dependency edges and injector bindings built up front
//! and handed to the registry as one value.

use std::fmt;
use std::sync::Arc;

use super::listener::ServiceListener;
use super::name::ServiceName;
use super::service::{Mode, Service, ServiceValue, StartError};

type InjectFn = dyn Fn(ServiceValue) -> Result<(), StartError> + Send + Sync;

/// InjectorBinding copies a dependency's value into a named property of the dependent.
#[derive(Clone)]
pub struct InjectorBinding {
    property: &'static str,
    inject: Arc<InjectFn>,
}

impl InjectorBinding {
    /// Creates a binding for `property` applying `inject` to the dependency's value.
    pub fn new<F>(property: &'static str, inject: F) -> Self
    where
        F: Fn(ServiceValue) -> Result<(), StartError> + Send + Sync + 'static,
    {
        Self {
            property,
            inject: Arc::new(inject),
        }
    }

    /// Creates a binding that downcasts the dependency value to `T`, translates it and
    /// hands the translated value to `set`.
    pub fn translating<T, U, Tr, S>(property: &'static str, translate: Tr, set: S) -> Self
    where
        T: Send + Sync + 'static,
        Tr: Fn(&T) -> Result<U, StartError> + Send + Sync + 'static,
        S: Fn(U) + Send + Sync + 'static,
    {
        Self::new(property, move |value: ServiceValue| {
            let typed = value.downcast::<T>().map_err(|_| {
                StartError::injection(property, "dependency value has an unexpected type")
            })?;
            set(translate(&*typed)?);
            Ok(())
        })
    }

    pub fn property(&self) -> &'static str {
        self.property
    }

    /// Applies the binding to a dependency value.
    pub fn inject(&self, value: ServiceValue) -> Result<(), StartError> {
        (self.inject)(value)
    }
}

impl fmt::Debug for InjectorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorBinding")
            .field("property", &self.property)
            .finish()
    }
}

/// Dependency edge, optionally carrying an injector binding.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: ServiceName,
    pub binding: Option<InjectorBinding>,
}

/// ServiceDescriptor is the declarative record of a service to install.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub name: ServiceName,
    pub service: Arc<dyn Service>,
    pub mode: Mode,
    pub dependencies: Vec<Dependency>,
}

impl ServiceDescriptor {
    /// Creates an immediate descriptor without dependencies.
    pub fn new(name: ServiceName, service: Arc<dyn Service>) -> Self {
        Self {
            name,
            service,
            mode: Mode::Immediate,
            dependencies: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Adds a plain dependency edge.
    pub fn depends_on(mut self, name: ServiceName) -> Self {
        self.add_dependency(name, None);
        self
    }

    /// Adds a dependency edge whose value is injected through `binding`.
    pub fn inject_from(mut self, name: ServiceName, binding: InjectorBinding) -> Self {
        self.add_dependency(name, Some(binding));
        self
    }

    fn add_dependency(&mut self, name: ServiceName, binding: Option<InjectorBinding>) {
        // A second edge to the same name only contributes its binding.
        if let Some(existing) = self.dependencies.iter_mut().find(|d| d.name == name) {
            if binding.is_some() {
                existing.binding = binding;
            }
            return;
        }
        self.dependencies.push(Dependency { name, binding });
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// SubBatch groups descriptors sharing batch-wide dependencies.
#[derive(Debug, Default)]
pub struct SubBatch {
    dependencies: Vec<ServiceName>,
    services: Vec<ServiceDescriptor>,
}

impl SubBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every service of the sub-batch will depend on `name`.
    pub fn add_dependency(&mut self, name: ServiceName) {
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    pub fn add_service(&mut self, descriptor: ServiceDescriptor) {
        self.services.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn into_services(self) -> impl Iterator<Item = ServiceDescriptor> {
        let deps = self.dependencies;
        self.services.into_iter().map(move |mut descriptor| {
            for dep in &deps {
                descriptor.add_dependency(dep.clone(), None);
            }
            descriptor
        })
    }
}

/// Batch is one atomic submission to the registry.
#[derive(Default)]
pub struct Batch {
    pub(crate) services: Vec<ServiceDescriptor>,
    pub(crate) listeners: Vec<Arc<dyn ServiceListener>>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&mut self, descriptor: ServiceDescriptor) {
        self.services.push(descriptor);
    }

    /// Folds a sub-batch in, applying its batch-wide dependencies to each of its services.
    pub fn add_sub_batch(&mut self, sub: SubBatch) {
        self.services.extend(sub.into_services());
    }

    /// Attaches a listener. Listeners see every service of the batch before any starts.
    pub fn add_listener(&mut self, listener: Arc<dyn ServiceListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &ServiceName> {
        self.services.iter().map(|s| &s.name)
    }
}
