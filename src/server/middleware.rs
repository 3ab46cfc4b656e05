//! Before/after request hooks.
//!
//! Hooks run strictly in registration order. Each one receives a [`Next`] and
//! has to call [`Next::run`] for the chain to go on. A before-hook that
//! returns without doing so ends the request: the method is skipped and the
//! response is sent as the context stands.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use super::RequestContext;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>);
}

/// Continuation to the remaining hooks of a chain
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    completed: &'a AtomicBool,
}

impl Next<'_> {
    pub async fn run(self, ctx: &mut RequestContext) {
        match self.remaining.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    remaining: rest,
                    completed: self.completed,
                };
                first.handle(ctx, next).await;
            }
            None => self.completed.store(true, Ordering::Release),
        }
    }
}

/// Ordered list of hooks
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    handlers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Arc<dyn Middleware>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain. Returns whether every hook passed control on.
    pub async fn run(&self, ctx: &mut RequestContext) -> bool {
        let completed = AtomicBool::new(false);
        Next {
            remaining: &self.handlers,
            completed: &completed,
        }
        .run(ctx)
        .await;
        completed.load(Ordering::Acquire)
    }
}

/// After-hook logging the outcome of each request
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
        info!(
            method = %ctx.method(),
            path = %ctx.path(),
            status = ctx.status().as_u16(),
            "request completed"
        );
        next.run(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ServerOptions, ServerState};
    use http::{Request, StatusCode};
    use std::sync::Mutex;

    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        pass: bool,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
            self.log.lock().unwrap().push(self.label);
            if self.pass {
                next.run(ctx).await;
            } else {
                ctx.set_code(StatusCode::UNAUTHORIZED);
            }
        }
    }

    fn context() -> RequestContext {
        let state = Arc::new(ServerState::new(ServerOptions::default()));
        let (parts, _) = Request::get("/").body(()).unwrap().into_parts();
        RequestContext::create(state, &parts).unwrap()
    }

    fn record(
        label: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        pass: bool,
    ) -> Arc<dyn Middleware> {
        Arc::new(Record {
            label,
            log: Arc::clone(log),
            pass,
        })
    }

    #[tokio::test]
    async fn test_empty_chain_completes() {
        let mut ctx = context();
        assert!(MiddlewareChain::new().run(&mut ctx).await);
    }

    #[tokio::test]
    async fn test_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        for label in ["first", "second", "third"] {
            chain.push(record(label, &log, true));
        }

        let mut ctx = context();
        assert!(chain.run(&mut ctx).await);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_hook_not_calling_next_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(record("first", &log, true));
        chain.push(record("gate", &log, false));
        chain.push(record("never", &log, true));

        let mut ctx = context();
        assert!(!chain.run(&mut ctx).await);
        assert_eq!(*log.lock().unwrap(), vec!["first", "gate"]);
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
    }
}
