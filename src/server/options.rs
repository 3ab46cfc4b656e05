use std::sync::Arc;

use super::auth::{Anonymous, Authentication};
use crate::backend::MemoryManager;
use crate::vfs::ResourceRef;

pub const DEFAULT_PORT: u16 = 1900;

/// Configuration for a [`super::WebDavServer`]
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address to bind
    pub hostname: String,
    /// Port used by `start`
    pub port: u16,
    /// Whether request bodies may be streamed to methods that support it
    pub can_chunk: bool,
    pub authentication: Arc<dyn Authentication>,
    /// Root of the served tree
    pub root_resource: ResourceRef,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            hostname: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            can_chunk: true,
            authentication: Arc::new(Anonymous),
            root_resource: MemoryManager::new().root(),
        }
    }
}
