//! Bulk construction of resource trees.

use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::sync::Arc;

use super::ResourceRef;
use crate::error::Result;

/// Declarative description of a subtree to attach under a root
#[derive(Debug, Clone)]
pub enum ResourceTreeNode {
    /// A single resource with no declared children
    Resource(ResourceRef),
    /// Siblings attached under the same root
    List(Vec<ResourceTreeNode>),
    /// A resource followed by its own subtree
    Node {
        resource: ResourceRef,
        children: Vec<ResourceTreeNode>,
    },
}

impl ResourceTreeNode {
    pub fn node(resource: ResourceRef, children: Vec<ResourceTreeNode>) -> Self {
        ResourceTreeNode::Node { resource, children }
    }
}

impl From<ResourceRef> for ResourceTreeNode {
    fn from(resource: ResourceRef) -> Self {
        ResourceTreeNode::Resource(resource)
    }
}

impl From<Vec<ResourceTreeNode>> for ResourceTreeNode {
    fn from(list: Vec<ResourceTreeNode>) -> Self {
        ResourceTreeNode::List(list)
    }
}

/// Attach `tree` under `root`.
///
/// Siblings are attached concurrently and the first failure cancels the rest.
/// Nodes attached before a failure stay attached.
pub fn attach<'a>(root: &'a ResourceRef, tree: &'a ResourceTreeNode) -> BoxFuture<'a, Result<()>> {
    async move {
        match tree {
            ResourceTreeNode::List(list) => attach_all(root, list).await,
            ResourceTreeNode::Resource(resource) => root.add_child(Arc::clone(resource)).await,
            ResourceTreeNode::Node { resource, children } => {
                root.add_child(Arc::clone(resource)).await?;
                attach_all(resource, children).await
            }
        }
    }
    .boxed()
}

async fn attach_all(root: &ResourceRef, list: &[ResourceTreeNode]) -> Result<()> {
    if list.is_empty() {
        return Ok(());
    }
    try_join_all(list.iter().map(|node| attach(root, node))).await?;
    Ok(())
}
