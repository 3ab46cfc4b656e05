//! HTTP front end: verb registry, middleware and the listening socket.
//!
//! A [`WebDavServer`] is configured first (methods, fallback, hooks) and then
//! snapshotted into an immutable [`Dispatcher`] when it starts listening.

pub mod auth;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod middleware;
pub mod options;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use auth::{Anonymous, Authentication, User};
pub use commands::{ChunkSink, Method};
pub use context::RequestContext;
pub use dispatcher::Dispatcher;
pub use middleware::{Middleware, MiddlewareChain, Next, RequestLogger};
pub use options::{DEFAULT_PORT, ServerOptions};

use crate::backend::{ManagerRegistry, SerializedObject, serializer};
use crate::error::Result;
use crate::vfs::{FsPath, PathResolver, ResourceRef, ResourceTreeNode, attach};

/// State shared by every request of a server
#[derive(Debug)]
pub struct ServerState {
    options: ServerOptions,
    root: RwLock<ResourceRef>,
    resolver: PathResolver,
}

impl ServerState {
    pub fn new(options: ServerOptions) -> Self {
        let root = RwLock::new(Arc::clone(&options.root_resource));
        ServerState {
            options,
            root,
            resolver: PathResolver::new(),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Current root of the served tree
    pub fn root_resource(&self) -> ResourceRef {
        Arc::clone(&self.root.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_root(&self, root: ResourceRef) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = root;
    }

    /// Resolve `path` against the current root
    pub async fn resource_from_path(&self, path: &FsPath) -> Result<ResourceRef> {
        let root = self.root_resource();
        self.resolver.resolve(&root, path).await
    }
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

pub struct WebDavServer {
    state: Arc<ServerState>,
    methods: HashMap<String, Arc<dyn Method>>,
    fallback: Arc<dyn Method>,
    before: MiddlewareChain,
    after: MiddlewareChain,
    running: Option<RunningServer>,
}

impl WebDavServer {
    /// Create a server with the built-in verbs registered
    pub fn new(options: ServerOptions) -> Self {
        let mut server = WebDavServer {
            state: Arc::new(ServerState::new(options)),
            methods: HashMap::new(),
            fallback: Arc::new(commands::not_implemented::NotImplementedMethod),
            before: MiddlewareChain::new(),
            after: MiddlewareChain::new(),
            running: None,
        };
        for method in commands::all() {
            let name = method.name().to_string();
            server.register_method(&name, method);
        }
        server
    }

    pub fn options(&self) -> &ServerOptions {
        self.state.options()
    }

    /// Register `method` for `name`; verb lookup ignores case
    pub fn register_method(&mut self, name: &str, method: Arc<dyn Method>) {
        self.methods.insert(name.to_lowercase(), method);
    }

    /// Method used for verbs with no registration
    pub fn register_fallback(&mut self, method: Arc<dyn Method>) {
        self.fallback = method;
    }

    pub fn add_before_middleware(&mut self, handler: Arc<dyn Middleware>) {
        self.before.push(handler);
    }

    pub fn add_after_middleware(&mut self, handler: Arc<dyn Middleware>) {
        self.after.push(handler);
    }

    /// Snapshot of the current registrations, usable without a socket
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::clone(&self.state),
            self.methods.clone(),
            Arc::clone(&self.fallback),
            self.before.clone(),
            self.after.clone(),
        ))
    }

    /// Bind `hostname:port` and serve in the background.
    ///
    /// Port 0 picks a free port; the bound address is returned.
    pub async fn listen(&mut self, port: u16) -> Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("already listening on {}", running.addr),
            )
            .into());
        }

        let listener = TcpListener::bind((self.options().hostname.as_str(), port)).await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(listener, self.dispatcher(), shutdown.clone()));
        info!(%addr, "server listening");

        self.running = Some(RunningServer {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Listen on the configured port
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let port = self.options().port;
        self.listen(port).await
    }

    /// Stop accepting connections and let open ones finish their request
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.shutdown.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "server task failed");
        }
        info!(addr = %running.addr, "server stopped");
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    pub fn root_resource(&self) -> ResourceRef {
        self.state.root_resource()
    }

    pub async fn resource_from_path(&self, path: &FsPath) -> Result<ResourceRef> {
        self.state.resource_from_path(path).await
    }

    /// Attach `tree` under the root
    pub async fn add_resource_tree(&self, tree: &ResourceTreeNode) -> Result<()> {
        let root = self.root_resource();
        attach(&root, tree).await
    }

    /// Replace the root with a tree rebuilt from `serialized`
    pub async fn load(
        &self,
        serialized: &SerializedObject,
        managers: &ManagerRegistry,
    ) -> Result<()> {
        let root = serializer::unserialize(serialized, managers).await?;
        self.state.set_root(root);
        Ok(())
    }

    /// Snapshot the current root
    pub async fn save(&self) -> Result<SerializedObject> {
        let root = self.root_resource();
        serializer::serialize(&root).await
    }
}

impl Drop for WebDavServer {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.cancel();
        }
    }
}

impl std::fmt::Debug for WebDavServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort();
        f.debug_struct("WebDavServer")
            .field("methods", &methods)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("addr", &self.local_addr())
            .finish()
    }
}

async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let dispatcher = Arc::clone(&dispatcher);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request: Request<Incoming>| {
                let dispatcher = Arc::clone(&dispatcher);
                async move { Ok::<_, Infallible>(dispatcher.dispatch(request).await) }
            });
            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}
