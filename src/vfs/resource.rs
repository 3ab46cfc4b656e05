use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::backend::FsManager;
use crate::error::Result;

/// Property map of a resource. Values are opaque to the server.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Shared handle to a resource node
pub type ResourceRef = Arc<dyn Resource>;

/// Kind of a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Directory,
}

impl ResourceType {
    pub fn is_file(&self) -> bool {
        matches!(self, ResourceType::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ResourceType::Directory)
    }
}

/// A node in the served namespace.
///
/// Backends implement this for their storage. All operations are async since
/// a backend may need I/O even to learn a node's type or name. A resource
/// belongs to at most one parent at a time.
#[async_trait]
pub trait Resource: Send + Sync + std::fmt::Debug {
    /// Backend that manufactured this resource
    fn manager(&self) -> Arc<dyn FsManager>;

    async fn resource_type(&self) -> Result<ResourceType>;

    /// Name of this node as a path segment
    async fn web_name(&self) -> Result<String>;

    /// Materialize the resource in its backend
    async fn create(&self) -> Result<()>;

    /// Remove the resource from its backend and detach it from its parent
    async fn delete(&self) -> Result<()>;

    async fn parent(&self) -> Option<ResourceRef>;

    /// Record the parent link. Called by the parent's `add_child`.
    async fn set_parent(&self, parent: Option<Weak<dyn Resource>>) -> Result<()>;

    async fn children(&self) -> Result<Vec<ResourceRef>>;

    async fn add_child(&self, child: ResourceRef) -> Result<()>;

    async fn remove_child(&self, child: &ResourceRef) -> Result<()>;

    /// Snapshot of all properties. The returned map is owned by the caller.
    async fn properties(&self) -> Result<Properties>;

    async fn set_property(&self, name: &str, value: serde_json::Value) -> Result<()>;

    async fn remove_property(&self, name: &str) -> Result<()>;

    async fn read(&self) -> Result<Bytes>;

    /// Replace the whole content
    async fn write(&self, data: Bytes) -> Result<()>;

    async fn append(&self, data: Bytes) -> Result<()>;

    async fn last_modified(&self) -> Result<DateTime<Utc>>;
}

/// Identity comparison of two resource handles
pub fn same_resource(a: &ResourceRef, b: &ResourceRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
