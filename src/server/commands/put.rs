use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ChunkSink, Method, RequestContext, find_child};
use crate::error::{DavError, Result};
use crate::vfs::{ResourceRef, ResourceType};

/// PUT: create or replace a file. Bodies can be streamed.
pub struct PutMethod;

#[async_trait]
impl Method for PutMethod {
    fn name(&self) -> &str {
        "PUT"
    }

    async fn execute(&self, ctx: &mut RequestContext) {
        match write_buffered(ctx).await {
            Ok(status) => ctx.set_code(status),
            Err(e) => {
                warn!(path = %ctx.path(), error = %e, "put failed");
                ctx.set_code(e.status_code());
            }
        }
    }

    fn supports_chunked(&self) -> bool {
        true
    }

    async fn start_chunked(&self, ctx: &mut RequestContext) -> Result<Option<Box<dyn ChunkSink>>> {
        let (target, status) = prepare_target(ctx).await?;
        target.write(Bytes::new()).await?;
        ctx.set_code(status);
        Ok(Some(Box::new(PutSink { target, written: 0 })))
    }
}

struct PutSink {
    target: ResourceRef,
    written: usize,
}

#[async_trait]
impl ChunkSink for PutSink {
    async fn on_data(
        &mut self,
        _ctx: &mut RequestContext,
        chunk: Bytes,
        _is_first: bool,
        is_last: bool,
    ) -> Result<()> {
        self.written += chunk.len();
        self.target.append(chunk).await?;
        if is_last {
            debug!(bytes = self.written, "streamed upload complete");
        }
        Ok(())
    }
}

async fn write_buffered(ctx: &RequestContext) -> Result<StatusCode> {
    let (target, status) = prepare_target(ctx).await?;
    target.write(ctx.data().clone()).await?;
    Ok(status)
}

/// Find or create the file addressed by the request
async fn prepare_target(ctx: &RequestContext) -> Result<(ResourceRef, StatusCode)> {
    let path = ctx.path();
    let Some(name) = path.file_name() else {
        return Err(DavError::status(StatusCode::METHOD_NOT_ALLOWED, "cannot write the root"));
    };

    let parent = ctx
        .server()
        .resource_from_path(&path.parent())
        .await
        .map_err(|_| DavError::status(StatusCode::CONFLICT, "parent collection missing"))?;

    let existing = find_child(&parent, name).await.map_err(|e| match e {
        DavError::NotACollection => {
            DavError::status(StatusCode::CONFLICT, "parent is not a collection")
        }
        e => e,
    })?;

    match existing {
        Some(existing) => {
            if !existing.resource_type().await?.is_file() {
                return Err(DavError::status(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "target is a collection",
                ));
            }
            Ok((existing, StatusCode::NO_CONTENT))
        }
        None => {
            let file = parent
                .manager()
                .new_resource(path, name, ResourceType::File, Some(&parent));
            file.create().await?;
            parent.add_child(Arc::clone(&file)).await?;
            Ok((file, StatusCode::CREATED))
        }
    }
}
