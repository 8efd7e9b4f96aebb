//! Per-artifact scratch space passed through the processing chain.

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::item::DeploymentItem;

use super::attachment::AttachmentKey;

/// Root path of the artifact, attached before processing starts.
pub const ROOT_ATTACHMENT: AttachmentKey<PathBuf> = AttachmentKey::new("deployment.root");

/// Directory the artifact is mounted at, attached once the mount is up.
pub const MOUNT_ROOT_ATTACHMENT: AttachmentKey<PathBuf> = AttachmentKey::new("deployment.mount.root");

/// UnitContext holds the typed attachments and the deployment items of one artifact.
pub struct UnitContext {
    name: String,
    attachments: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
    items: Vec<Arc<dyn DeploymentItem>>,
}

impl UnitContext {
    /// Creates an empty context for the named deployment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attachments: HashMap::new(),
            items: Vec::new(),
        }
    }

    /// Gets the deployment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores a value, returning the previous one.
    pub fn put<T: Send + Sync + 'static>(&mut self, key: AttachmentKey<T>, value: T) -> Option<T> {
        self.attachments
            .insert(key.name(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Gets a value by key.
    pub fn get<T: Send + Sync + 'static>(&self, key: AttachmentKey<T>) -> Option<&T> {
        self.attachments.get(key.name())?.downcast_ref::<T>()
    }

    /// Gets a mutable value by key.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self, key: AttachmentKey<T>) -> Option<&mut T> {
        self.attachments.get_mut(key.name())?.downcast_mut::<T>()
    }

    /// Removes a value by key.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: AttachmentKey<T>) -> Option<T> {
        self.attachments
            .remove(key.name())?
            .downcast::<T>()
            .ok()
            .map(|v| *v)
    }

    pub fn contains<T: Send + Sync + 'static>(&self, key: AttachmentKey<T>) -> bool {
        self.get(key).is_some()
    }

    /// Gets the artifact root, if attached.
    pub fn root(&self) -> Option<&PathBuf> {
        self.get(ROOT_ATTACHMENT)
    }

    /// Gets the mounted directory, falling back to the artifact root.
    pub fn content_root(&self) -> Option<&PathBuf> {
        self.get(MOUNT_ROOT_ATTACHMENT).or_else(|| self.root())
    }

    /// Appends a deployment item to be installed in the item phase.
    pub fn add_deployment_item(&mut self, item: Arc<dyn DeploymentItem>) {
        self.items.push(item);
    }

    /// Gets the deployment items in the order they were added.
    pub fn deployment_items(&self) -> &[Arc<dyn DeploymentItem>] {
        &self.items
    }
}
