//! Snapshot and restore of resource trees.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::ManagerRegistry;
use crate::error::{DavError, Result};
use crate::vfs::{FsPath, Properties, ResourceRef, ResourceType};

/// Serializable snapshot of one resource and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedObject {
    /// uid of the backend that owns the resource
    pub manager: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    #[serde(default)]
    pub properties: Properties,
    /// File content, absent for collections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SerializedObject>,
}

/// Snapshot `resource` and everything below it
pub fn serialize(resource: &ResourceRef) -> BoxFuture<'_, Result<SerializedObject>> {
    async move {
        let kind = resource.resource_type().await?;
        let content = if kind.is_file() {
            Some(resource.read().await?.to_vec())
        } else {
            None
        };
        let children = if kind.is_directory() {
            let children = resource.children().await?;
            try_join_all(children.iter().map(serialize)).await?
        } else {
            Vec::new()
        };

        Ok(SerializedObject {
            manager: resource.manager().uid().to_string(),
            name: resource.web_name().await?,
            kind,
            properties: resource.properties().await?,
            content,
            children,
        })
    }
    .boxed()
}

/// Rebuild a tree from a snapshot, asking each node's backend to manufacture it
pub async fn unserialize(
    obj: &SerializedObject,
    managers: &ManagerRegistry,
) -> Result<ResourceRef> {
    rebuild(obj, managers, FsPath::default(), None).await
}

fn rebuild<'a>(
    obj: &'a SerializedObject,
    managers: &'a ManagerRegistry,
    path: FsPath,
    parent: Option<&'a ResourceRef>,
) -> BoxFuture<'a, Result<ResourceRef>> {
    async move {
        let manager = managers
            .get(&obj.manager)
            .ok_or_else(|| DavError::UnknownManager(obj.manager.clone()))?;

        let resource = manager.new_resource(&path, &obj.name, obj.kind, parent);
        resource.create().await?;

        for (name, value) in &obj.properties {
            resource.set_property(name, value.clone()).await?;
        }
        if let Some(content) = &obj.content {
            resource.write(Bytes::copy_from_slice(content)).await?;
        }

        for child in &obj.children {
            let child_path = path.child_path(&child.name);
            let built = rebuild(child, managers, child_path, Some(&resource)).await?;
            resource.add_child(built).await?;
        }

        Ok(resource)
    }
    .boxed()
}

/// Write a snapshot of `root` as JSON
pub async fn save_to_file(root: &ResourceRef, path: &Path) -> Result<()> {
    let snapshot = serialize(root).await?;
    let json = serde_json::to_vec_pretty(&snapshot)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), "saved resource tree");
    Ok(())
}

/// Read a JSON snapshot and rebuild it
pub async fn load_from_file(path: &Path, managers: &ManagerRegistry) -> Result<ResourceRef> {
    let json = tokio::fs::read(path).await?;
    let snapshot: SerializedObject = serde_json::from_slice(&json)?;
    let root = unserialize(&snapshot, managers).await?;
    info!(path = %path.display(), "loaded resource tree");
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryManager;
    use crate::vfs::{PathResolver, ResourceTreeNode, attach, same_resource};
    use serde_json::json;

    async fn sample_tree() -> ResourceRef {
        let manager = MemoryManager::new();
        let root = manager.root();
        let notes = manager.file_with_content("notes.txt", "remember");
        notes.set_property("author", json!("ana")).await.unwrap();

        let tree = ResourceTreeNode::List(vec![
            ResourceTreeNode::node(
                manager.create_unattached("docs", ResourceType::Directory),
                vec![notes.into()],
            ),
            manager.file_with_content("readme", "top").into(),
        ]);
        attach(&root, &tree).await.unwrap();
        root
    }

    #[tokio::test]
    async fn test_snapshot_restores_tree() {
        let root = sample_tree().await;
        let snapshot = serialize(&root).await.unwrap();
        assert_eq!(snapshot.children.len(), 2);

        let restored = unserialize(&snapshot, &ManagerRegistry::new()).await.unwrap();
        let notes = PathResolver::new()
            .resolve(&restored, &FsPath::parse("/docs/notes.txt"))
            .await
            .unwrap();
        assert_eq!(notes.read().await.unwrap(), Bytes::from("remember"));
        assert_eq!(notes.properties().await.unwrap()["author"], json!("ana"));

        // Restored tree is independent from the original
        assert!(!same_resource(&restored, &root));
        assert_eq!(serialize(&restored).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_unknown_manager() {
        let root = sample_tree().await;
        let snapshot = serialize(&root).await.unwrap();

        let err = unserialize(&snapshot, &ManagerRegistry::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, DavError::UnknownManager(uid) if uid == "memory"));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        let root = sample_tree().await;

        save_to_file(&root, &path).await.unwrap();
        let restored = load_from_file(&path, &ManagerRegistry::new()).await.unwrap();
        assert_eq!(
            serialize(&restored).await.unwrap(),
            serialize(&root).await.unwrap()
        );
    }
}
