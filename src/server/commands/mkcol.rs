use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;
use tracing::warn;

use super::{Method, RequestContext, find_child};
use crate::error::{DavError, Result};
use crate::vfs::ResourceType;

/// MKCOL: create an empty collection
pub struct MkcolMethod;

#[async_trait]
impl Method for MkcolMethod {
    fn name(&self) -> &str {
        "MKCOL"
    }

    async fn execute(&self, ctx: &mut RequestContext) {
        if !ctx.data().is_empty() {
            ctx.set_code(StatusCode::UNSUPPORTED_MEDIA_TYPE);
            return;
        }

        match make_collection(ctx).await {
            Ok(()) => ctx.set_code(StatusCode::CREATED),
            Err(e) => {
                warn!(path = %ctx.path(), error = %e, "mkcol failed");
                ctx.set_code(e.status_code());
            }
        }
    }
}

async fn make_collection(ctx: &RequestContext) -> Result<()> {
    let path = ctx.path();
    let Some(name) = path.file_name() else {
        return Err(DavError::status(StatusCode::METHOD_NOT_ALLOWED, "root already exists"));
    };

    let parent = ctx
        .server()
        .resource_from_path(&path.parent())
        .await
        .map_err(|_| DavError::status(StatusCode::CONFLICT, "parent collection missing"))?;

    match find_child(&parent, name).await {
        Ok(Some(_)) => {
            return Err(DavError::status(StatusCode::METHOD_NOT_ALLOWED, "already exists"));
        }
        Ok(None) => {}
        Err(DavError::NotACollection) => {
            return Err(DavError::status(StatusCode::CONFLICT, "parent is not a collection"));
        }
        Err(e) => return Err(e),
    }

    let collection = parent
        .manager()
        .new_resource(path, name, ResourceType::Directory, Some(&parent));
    collection.create().await?;
    parent.add_child(Arc::clone(&collection)).await
}
