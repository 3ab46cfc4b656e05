use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

pub mod copy;
pub mod delete;
pub mod get;
pub mod mkcol;
pub mod not_implemented;
pub mod put;

use super::RequestContext;
use crate::error::Result;
use crate::vfs::ResourceRef;

/// Handler for one protocol verb
#[async_trait]
pub trait Method: Send + Sync {
    /// Verb this method answers to
    fn name(&self) -> &str;

    /// Handle a request whose body, if any, has been buffered into the context.
    /// Returning finalizes the response.
    async fn execute(&self, ctx: &mut RequestContext);

    /// Whether the method can consume the body as it arrives
    fn supports_chunked(&self) -> bool {
        false
    }

    /// Prepare a streamed request.
    ///
    /// An error writes its status code; `Ok(None)` declines the body and
    /// finalizes the response right away.
    async fn start_chunked(&self, _ctx: &mut RequestContext) -> Result<Option<Box<dyn ChunkSink>>> {
        Ok(None)
    }
}

/// Receiver for the chunks of a streamed body
#[async_trait]
pub trait ChunkSink: Send {
    async fn on_data(
        &mut self,
        ctx: &mut RequestContext,
        chunk: Bytes,
        is_first: bool,
        is_last: bool,
    ) -> Result<()>;
}

/// Built-in verbs
pub fn all() -> Vec<Arc<dyn Method>> {
    vec![
        Arc::new(copy::CopyMethod),
        Arc::new(delete::DeleteMethod),
        Arc::new(get::GetMethod),
        Arc::new(mkcol::MkcolMethod),
        Arc::new(put::PutMethod),
    ]
}

/// Find the child of `parent` named `name`, looking names up concurrently
pub(crate) async fn find_child(parent: &ResourceRef, name: &str) -> Result<Option<ResourceRef>> {
    let children = parent.children().await?;
    let mut lookups: FuturesUnordered<_> = children
        .into_iter()
        .map(|child| async move { child.web_name().await.map(|n| (child, n)) })
        .collect();

    while let Some(lookup) = lookups.next().await {
        let (child, child_name) = lookup?;
        if child_name == name {
            return Ok(Some(child));
        }
    }
    Ok(None)
}
