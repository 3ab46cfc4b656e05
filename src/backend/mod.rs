pub mod memory;
pub mod serializer;

pub use memory::{MemoryManager, MemoryResource};
pub use serializer::SerializedObject;

use std::collections::HashMap;
use std::sync::Arc;

use crate::vfs::{FsPath, ResourceRef, ResourceType};

/// Backend that manufactures resources bound to its storage
pub trait FsManager: Send + Sync + std::fmt::Debug {
    /// Stable identifier, recorded in serialized trees
    fn uid(&self) -> &str;

    /// Create an unattached resource for `path`.
    ///
    /// The resource still has to be `create`d and attached by the caller.
    /// `parent` is the collection it is meant to be attached to, when known.
    fn new_resource(
        &self,
        path: &FsPath,
        name: &str,
        kind: ResourceType,
        parent: Option<&ResourceRef>,
    ) -> ResourceRef;
}

/// Registry of backends by uid
pub struct ManagerRegistry {
    managers: HashMap<String, Arc<dyn FsManager>>,
}

impl ManagerRegistry {
    /// Create a registry with the built-in memory backend
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(MemoryManager::new()));
        registry
    }

    pub fn empty() -> Self {
        Self {
            managers: HashMap::new(),
        }
    }

    /// Register a backend, replacing any previous one with the same uid
    pub fn register(&mut self, manager: Arc<dyn FsManager>) {
        self.managers.insert(manager.uid().to_string(), manager);
    }

    pub fn get(&self, uid: &str) -> Option<&Arc<dyn FsManager>> {
        self.managers.get(uid)
    }

    /// List all registered uids
    pub fn list(&self) -> Vec<&str> {
        let mut uids: Vec<_> = self.managers.keys().map(|s| s.as_str()).collect();
        uids.sort();
        uids
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Arc<dyn FsManager>> for ManagerRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn FsManager>>>(iter: I) -> Self {
        let mut registry = Self::empty();
        for manager in iter {
            registry.register(manager);
        }
        registry
    }
}
