use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use http::{StatusCode, Uri};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Method, RequestContext, find_child};
use crate::error::{DavError, Result};
use crate::vfs::{FsPath, ResourceRef};

/// COPY: duplicate a resource, recursively for collections
pub struct CopyMethod;

#[async_trait]
impl Method for CopyMethod {
    fn name(&self) -> &str {
        "COPY"
    }

    async fn execute(&self, ctx: &mut RequestContext) {
        let status = copy_request(ctx).await;
        ctx.set_code(status);
    }
}

async fn copy_request(ctx: &RequestContext) -> StatusCode {
    let source = match ctx.resource().await {
        Ok(source) => source,
        Err(e) => {
            debug!(path = %ctx.path(), error = %e, "copy source not found");
            return StatusCode::NOT_FOUND;
        }
    };

    let overwrite = ctx.find_header("overwrite") != Some("F");

    let destination = match ctx.find_header("destination").map(parse_destination) {
        Some(Ok(destination)) => destination,
        Some(Err(e)) => {
            debug!(error = %e, "rejecting copy");
            return StatusCode::BAD_REQUEST;
        }
        None => return StatusCode::BAD_REQUEST,
    };
    let Some(name) = destination.file_name() else {
        return StatusCode::BAD_REQUEST;
    };

    if destination.starts_with(ctx.path()) {
        debug!(source = %ctx.path(), %destination, "copy into own subtree");
        return StatusCode::FORBIDDEN;
    }

    let parent = match ctx.server().resource_from_path(&destination.parent()).await {
        Ok(parent) => parent,
        Err(e) => {
            warn!(%destination, error = %e, "copy destination parent unresolved");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let kind = match source.resource_type().await {
        Ok(kind) => kind,
        Err(e) => {
            warn!(error = %e, "copy source type unavailable");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let overwritten = match find_child(&parent, name).await {
        Ok(None) => false,
        Ok(Some(existing)) => {
            if !overwrite {
                debug!(%destination, "destination exists and overwrite is forbidden");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
            match existing.resource_type().await {
                Ok(existing_kind) if existing_kind == kind => {}
                Ok(_) => {
                    debug!(%destination, "destination exists with a different type");
                    return StatusCode::INTERNAL_SERVER_ERROR;
                }
                Err(e) => {
                    warn!(error = %e, "destination type unavailable");
                    return StatusCode::INTERNAL_SERVER_ERROR;
                }
            }
            if let Err(e) = existing.delete().await {
                warn!(error = %e, "failed to delete overwritten destination");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
            true
        }
        Err(e) => {
            warn!(error = %e, "collision check failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match duplicate(&source, &parent, destination.clone()).await {
        Ok(()) if overwritten => StatusCode::NO_CONTENT,
        Ok(()) => StatusCode::CREATED,
        Err(e) => {
            warn!(%destination, error = %e, "copy failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Keep only the path of a `Destination` value (absolute URI or absolute path).
///
/// Values that are not valid URIs, such as ones with raw spaces, keep
/// everything after the first `/` following the scheme.
pub fn parse_destination(value: &str) -> Result<FsPath> {
    let value = value.trim();
    if let Ok(uri) = value.parse::<Uri>() {
        if uri.scheme().is_some() || value.starts_with('/') {
            return Ok(FsPath::from_uri_path(uri.path()));
        }
    }

    let path = match value.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |at| &rest[at..]),
        None if value.starts_with('/') => value,
        None => return Err(DavError::InvalidDestination(value.to_string())),
    };
    Ok(FsPath::from_uri_path(path))
}

/// Recreate `source` as a child of `parent` at `destination`, with all its
/// properties, content and descendants.
///
/// Children are copied concurrently; the first failure cancels the others and
/// leaves whatever was already copied in place.
pub fn duplicate<'a>(
    source: &'a ResourceRef,
    parent: &'a ResourceRef,
    destination: FsPath,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let kind = source.resource_type().await?;
        let name = destination.file_name().unwrap_or_default();

        let copy = parent.manager().new_resource(&destination, name, kind, Some(parent));
        copy.create().await?;
        parent.add_child(Arc::clone(&copy)).await?;
        copy_properties(source, &copy).await?;

        if kind.is_file() {
            let data = source.read().await?;
            copy.write(data).await?;
        }

        if kind.is_directory() {
            let children = source.children().await?;
            let copy = &copy;
            let destination = &destination;
            try_join_all(children.iter().map(|child| async move {
                let child_name = child.web_name().await?;
                duplicate(child, copy, destination.child_path(&child_name)).await
            }))
            .await?;
        }

        Ok(())
    }
    .boxed()
}

async fn copy_properties(source: &ResourceRef, destination: &ResourceRef) -> Result<()> {
    // properties() hands out an owned snapshot, so the copy shares nothing with the source
    let properties = source.properties().await?;
    try_join_all(
        properties
            .into_iter()
            .map(|(name, value)| async move { destination.set_property(&name, value).await }),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::commands::test_support::{request, send, server_with_root};
    use crate::vfs::resource::test_support::Broken;
    use crate::vfs::{PathResolver, ResourceTreeNode, ResourceType, attach, same_resource};
    use bytes::Bytes;
    use http_body_util::Full;
    use serde_json::json;

    fn copy_request_to(source: &str, destination: &str) -> http::request::Builder {
        request("COPY", source).header("Destination", destination)
    }

    async fn lookup(root: &ResourceRef, path: &str) -> Option<ResourceRef> {
        PathResolver::new().resolve(root, &FsPath::parse(path)).await.ok()
    }

    #[test]
    fn test_parse_destination() {
        let path = parse_destination("http://localhost:1900/folder/new%20name.txt").unwrap();
        assert_eq!(path.segments(), &["folder", "new name.txt"]);

        let path = parse_destination("/just/a/path").unwrap();
        assert_eq!(path.segments(), &["just", "a", "path"]);

        let path = parse_destination("http://h/my file").unwrap();
        assert_eq!(path.segments(), &["my file"]);

        let path = parse_destination("http://h/dir/with space/x.txt").unwrap();
        assert_eq!(path.segments(), &["dir", "with space", "x.txt"]);

        assert!(parse_destination("http://h").unwrap().is_root());
        assert!(parse_destination("relative/path").is_err());
    }

    #[tokio::test]
    async fn test_copy_file_creates_independent_copy() {
        let (server, root, manager) = server_with_root();
        let file = manager.file_with_content("a.txt", "content");
        file.set_property("meta", json!({"tags": ["one"]})).await.unwrap();
        root.add_child(Arc::clone(&file)).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "http://localhost/b.txt")
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let copy = lookup(&root, "/b.txt").await.unwrap();
        assert!(!same_resource(&copy, &file));
        assert_eq!(copy.read().await.unwrap(), Bytes::from("content"));
        assert_eq!(copy.properties().await.unwrap(), file.properties().await.unwrap());

        // Property values are independent
        copy.set_property("meta", json!({"tags": []})).await.unwrap();
        assert_eq!(file.properties().await.unwrap()["meta"], json!({"tags": ["one"]}));
        assert_eq!(file.read().await.unwrap(), Bytes::from("content"));
        assert_eq!(root.children().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_copy_collection_recursively() {
        let (server, root, manager) = server_with_root();
        let nested = manager.file_with_content("nested.txt", "deep");
        nested.set_property("owner", json!("sam")).await.unwrap();
        let tree = ResourceTreeNode::node(
            manager.create_unattached("src", ResourceType::Directory),
            vec![
                manager.file_with_content("one.txt", "1").into(),
                ResourceTreeNode::node(
                    manager.create_unattached("sub", ResourceType::Directory),
                    vec![Arc::clone(&nested).into()],
                ),
                manager.create_unattached("empty", ResourceType::Directory).into(),
            ],
        );
        attach(&root, &tree).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/src", "/dst").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let one = lookup(&root, "/dst/one.txt").await.unwrap();
        assert_eq!(one.read().await.unwrap(), Bytes::from("1"));
        let copied = lookup(&root, "/dst/sub/nested.txt").await.unwrap();
        assert_eq!(copied.read().await.unwrap(), Bytes::from("deep"));
        let empty = lookup(&root, "/dst/empty").await.unwrap();
        assert!(empty.children().await.unwrap().is_empty());

        copied.remove_property("owner").await.unwrap();
        assert_eq!(nested.properties().await.unwrap()["owner"], json!("sam"));
    }

    #[tokio::test]
    async fn test_overwrite_same_type() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "new")).await.unwrap();
        let old = manager.file_with_content("b.txt", "old");
        root.add_child(Arc::clone(&old)).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "/b.txt")
                .header("Overwrite", "T")
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let replaced = lookup(&root, "/b.txt").await.unwrap();
        assert!(!same_resource(&replaced, &old));
        assert_eq!(replaced.read().await.unwrap(), Bytes::from("new"));
        assert!(old.parent().await.is_none());
        assert_eq!(root.children().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overwrite_forbidden() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "new")).await.unwrap();
        let old = manager.file_with_content("b.txt", "old");
        root.add_child(Arc::clone(&old)).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "/b.txt")
                .header("Overwrite", "F")
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let kept = lookup(&root, "/b.txt").await.unwrap();
        assert!(same_resource(&kept, &old));
        assert_eq!(kept.read().await.unwrap(), Bytes::from("old"));
    }

    #[tokio::test]
    async fn test_overwrite_type_mismatch() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "file")).await.unwrap();
        let folder = manager.create_unattached("b", ResourceType::Directory);
        folder.add_child(manager.file_with_content("inner", "x")).await.unwrap();
        root.add_child(Arc::clone(&folder)).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "/b").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let kept = lookup(&root, "/b").await.unwrap();
        assert!(same_resource(&kept, &folder));
        assert_eq!(kept.children().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_and_destination() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "x")).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/missing", "/b").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &server,
            request("COPY", "/a.txt").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &server,
            copy_request_to("/a.txt", "http://localhost/").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unresolvable_destination_parent() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "x")).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "/nowhere/b.txt").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(root.children().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_copy_into_own_subtree_is_forbidden() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.create_unattached("dir", ResourceType::Directory))
            .await
            .unwrap();

        for destination in ["/dir", "/dir/inside"] {
            let response = send(
                &server,
                copy_request_to("/dir", destination).body(Full::new(Bytes::new())).unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
        assert_eq!(root.children().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_destination_with_raw_space() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "x")).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "http://h/my file").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let copy = lookup(&root, "/my file").await.unwrap();
        assert_eq!(copy.web_name().await.unwrap(), "my file");
    }

    #[tokio::test]
    async fn test_encoded_separator_stays_in_name() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "x")).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/a.txt", "http://h/sl%2Fash").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let copy = lookup(&root, "/sl%2Fash").await.unwrap();
        let name = copy.web_name().await.unwrap();
        assert_eq!(name, "sl%2Fash");
        assert_eq!(FsPath::parse("/").child_path(&name).to_string(), "/sl%2Fash");
    }

    #[tokio::test]
    async fn test_unknown_source_type_changes_nothing() {
        let (server, root, _) = server_with_root();
        root.add_child(Arc::new(Broken::new("broken").failing_type()))
            .await
            .unwrap();

        let response = send(
            &server,
            copy_request_to("/broken", "/copy").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(root.children().await.unwrap().len(), 1);
        assert!(lookup(&root, "/copy").await.is_none());
    }

    #[tokio::test]
    async fn test_failure_inside_collection_copy() {
        let (server, root, manager) = server_with_root();
        let source = manager.create_unattached("src", ResourceType::Directory);
        source.add_child(manager.file_with_content("ok.txt", "fine")).await.unwrap();
        source.add_child(Arc::new(Broken::new("bad").failing_read()))
            .await
            .unwrap();
        root.add_child(Arc::clone(&source)).await.unwrap();

        let response = send(
            &server,
            copy_request_to("/src", "/dst").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(source.children().await.unwrap().len(), 2);
    }
}
