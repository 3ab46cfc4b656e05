//! In-memory backend.
//!
//! Nodes live only as long as the tree holding them. Each node guards its own
//! state with a single lock, so every operation is atomic per node.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

use super::FsManager;
use crate::error::{DavError, Result};
use crate::vfs::{FsPath, Properties, Resource, ResourceRef, ResourceType, same_resource};

/// Backend keeping the whole tree in memory
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryManager;

impl MemoryManager {
    pub const UID: &'static str = "memory";

    pub fn new() -> Self {
        MemoryManager
    }

    /// Create an empty root collection
    pub fn root(&self) -> ResourceRef {
        self.create_unattached("", ResourceType::Directory)
    }

    /// Create a node that is not attached anywhere yet
    pub fn create_unattached(&self, name: &str, kind: ResourceType) -> ResourceRef {
        MemoryResource::new(name, kind)
    }

    /// Create a file node holding `content`
    pub fn file_with_content(&self, name: &str, content: impl Into<Bytes>) -> ResourceRef {
        let resource = MemoryResource::new(name, ResourceType::File);
        resource.preload(content.into());
        resource
    }
}

impl FsManager for MemoryManager {
    fn uid(&self) -> &str {
        Self::UID
    }

    fn new_resource(
        &self,
        _path: &FsPath,
        name: &str,
        kind: ResourceType,
        _parent: Option<&ResourceRef>,
    ) -> ResourceRef {
        MemoryResource::new(name, kind)
    }
}

struct NodeState {
    parent: Option<Weak<dyn Resource>>,
    properties: Properties,
    content: BytesMut,
    children: Vec<ResourceRef>,
    last_modified: DateTime<Utc>,
}

/// File or collection stored in memory
pub struct MemoryResource {
    me: Weak<MemoryResource>,
    name: String,
    kind: ResourceType,
    state: RwLock<NodeState>,
}

impl MemoryResource {
    fn new(name: &str, kind: ResourceType) -> Arc<MemoryResource> {
        Arc::new_cyclic(|me| MemoryResource {
            me: me.clone(),
            name: name.to_string(),
            kind,
            state: RwLock::new(NodeState {
                parent: None,
                properties: Properties::new(),
                content: BytesMut::new(),
                children: Vec::new(),
                last_modified: Utc::now(),
            }),
        })
    }

    // Only called on freshly built nodes, before anyone else holds the lock
    fn preload(&self, content: Bytes) {
        if let Ok(mut state) = self.state.try_write() {
            state.content = BytesMut::from(&content[..]);
        }
    }

    fn ensure_file(&self) -> Result<()> {
        if self.kind.is_file() {
            Ok(())
        } else {
            Err(DavError::NotAFile)
        }
    }

    fn ensure_collection(&self) -> Result<()> {
        if self.kind.is_directory() {
            Ok(())
        } else {
            Err(DavError::NotACollection)
        }
    }
}

impl std::fmt::Debug for MemoryResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryResource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

#[async_trait]
impl Resource for MemoryResource {
    fn manager(&self) -> Arc<dyn FsManager> {
        Arc::new(MemoryManager)
    }

    async fn resource_type(&self) -> Result<ResourceType> {
        Ok(self.kind)
    }

    async fn web_name(&self) -> Result<String> {
        Ok(self.name.clone())
    }

    async fn create(&self) -> Result<()> {
        self.state.write().await.last_modified = Utc::now();
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let Some(parent) = self.parent().await else {
            return Ok(());
        };
        let Some(me) = self.me.upgrade() else {
            return Ok(());
        };
        let me: ResourceRef = me;
        parent.remove_child(&me).await
    }

    async fn parent(&self) -> Option<ResourceRef> {
        self.state.read().await.parent.as_ref().and_then(Weak::upgrade)
    }

    async fn set_parent(&self, parent: Option<Weak<dyn Resource>>) -> Result<()> {
        let mut state = self.state.write().await;
        let attached = state
            .parent
            .as_ref()
            .is_some_and(|p| p.strong_count() > 0);
        if parent.is_some() && attached {
            return Err(DavError::AlreadyAttached);
        }
        state.parent = parent;
        Ok(())
    }

    async fn children(&self) -> Result<Vec<ResourceRef>> {
        self.ensure_collection()?;
        Ok(self.state.read().await.children.clone())
    }

    async fn add_child(&self, child: ResourceRef) -> Result<()> {
        self.ensure_collection()?;
        let me: Weak<dyn Resource> = self.me.clone();
        child.set_parent(Some(me)).await?;

        let mut state = self.state.write().await;
        state.children.push(child);
        state.last_modified = Utc::now();
        Ok(())
    }

    async fn remove_child(&self, child: &ResourceRef) -> Result<()> {
        self.ensure_collection()?;
        {
            let mut state = self.state.write().await;
            let Some(index) = state.children.iter().position(|c| same_resource(c, child)) else {
                return Err(DavError::ResourceNotFound);
            };
            state.children.remove(index);
            state.last_modified = Utc::now();
        }
        child.set_parent(None).await
    }

    async fn properties(&self) -> Result<Properties> {
        Ok(self.state.read().await.properties.clone())
    }

    async fn set_property(&self, name: &str, value: serde_json::Value) -> Result<()> {
        let mut state = self.state.write().await;
        state.properties.insert(name.to_string(), value);
        state.last_modified = Utc::now();
        Ok(())
    }

    async fn remove_property(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.properties.remove(name);
        state.last_modified = Utc::now();
        Ok(())
    }

    async fn read(&self) -> Result<Bytes> {
        self.ensure_file()?;
        Ok(Bytes::copy_from_slice(&self.state.read().await.content))
    }

    async fn write(&self, data: Bytes) -> Result<()> {
        self.ensure_file()?;
        let mut state = self.state.write().await;
        state.content = BytesMut::from(&data[..]);
        state.last_modified = Utc::now();
        Ok(())
    }

    async fn append(&self, data: Bytes) -> Result<()> {
        self.ensure_file()?;
        let mut state = self.state.write().await;
        state.content.extend_from_slice(&data);
        state.last_modified = Utc::now();
        Ok(())
    }

    async fn last_modified(&self) -> Result<DateTime<Utc>> {
        Ok(self.state.read().await.last_modified)
    }
}
