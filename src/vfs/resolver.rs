use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::debug;

use super::{FsPath, ResourceRef};
use crate::error::{DavError, Result};

/// Resolves paths to resources by walking the tree from a root
#[derive(Debug, Default, Clone, Copy)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        PathResolver
    }

    /// Resolve `path` starting at `root`.
    ///
    /// At each level the children's names are looked up concurrently and the
    /// first lookup to complete with a matching name wins; later matches are
    /// never observed. A failed name lookup counts as a non-match.
    pub async fn resolve(&self, root: &ResourceRef, path: &FsPath) -> Result<ResourceRef> {
        let mut current = Arc::clone(root);
        let mut remaining = path.clone();

        while let Some(segment) = remaining.remove_root() {
            let children = current.children().await?;
            if children.is_empty() {
                debug!(%segment, "no children to match against");
                return Err(DavError::ResourceNotFound);
            }

            let mut lookups: FuturesUnordered<_> = children
                .into_iter()
                .map(|child| async move {
                    let name = child.web_name().await;
                    (child, name)
                })
                .collect();

            let mut found = None;
            while let Some((child, name)) = lookups.next().await {
                match name {
                    Ok(name) if name == segment => {
                        found = Some(child);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "name lookup failed during resolution"),
                }
            }

            current = found.ok_or(DavError::ResourceNotFound)?;
        }

        Ok(current)
    }
}
