//! Per-request driver.
//!
//! For every request the dispatcher picks the method registered for the verb
//! (or the fallback), builds the [`RequestContext`], delivers the body either
//! buffered or as a stream of chunks, and finalizes the response. After-hooks
//! run in a detached task once the response has been produced.

use bytes::{Bytes, BytesMut};
use http::{Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span, warn};

use super::commands::{ChunkSink, Method};
use super::middleware::MiddlewareChain;
use super::{RequestContext, ServerState};
use crate::error::{DavError, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Upper bound on the buffer reserved up front for a declared body length
const MAX_PREALLOC: usize = 1 << 20;

pub struct Dispatcher {
    state: Arc<ServerState>,
    methods: HashMap<String, Arc<dyn Method>>,
    fallback: Arc<dyn Method>,
    before: MiddlewareChain,
    after: Arc<MiddlewareChain>,
}

impl Dispatcher {
    pub(crate) fn new(
        state: Arc<ServerState>,
        methods: HashMap<String, Arc<dyn Method>>,
        fallback: Arc<dyn Method>,
        before: MiddlewareChain,
        after: MiddlewareChain,
    ) -> Self {
        Dispatcher {
            state,
            methods,
            fallback,
            before,
            after: Arc::new(after),
        }
    }

    /// Method registered for `verb`, ignoring case, or the fallback
    pub fn method_for(&self, verb: &str) -> Arc<dyn Method> {
        self.methods
            .get(&verb.to_lowercase())
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Serve one request
    pub async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let span = info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path()
        );
        self.handle(request).instrument(span).await
    }

    async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let method = self.method_for(request.method().as_str());
        let (parts, body) = request.into_parts();

        let mut ctx = match RequestContext::create(Arc::clone(&self.state), &parts) {
            Ok(ctx) => ctx,
            Err(e) => {
                let status = match e {
                    DavError::AuthenticationPropertyMissing => StatusCode::FORBIDDEN,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                warn!(error = %e, status = status.as_u16(), "request rejected");
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = status;
                return response;
            }
        };

        let length = ctx.content_length();
        if !self.state.options().can_chunk || !method.supports_chunked() || length <= 0 {
            match read_body(body, length).await {
                Ok(data) => ctx.set_data(data),
                Err(e) => {
                    warn!(error = %e, "request body unreadable");
                    ctx.set_code(StatusCode::BAD_REQUEST);
                    return self.exit(ctx);
                }
            }
            if self.before.run(&mut ctx).await {
                method.execute(&mut ctx).await;
            }
            return self.exit(ctx);
        }

        if !self.before.run(&mut ctx).await {
            return self.exit(ctx);
        }
        let sink = match method.start_chunked(&mut ctx).await {
            Ok(Some(sink)) => sink,
            Ok(None) => return self.exit(ctx),
            Err(e) => {
                debug!(error = %e, "streamed request refused");
                ctx.set_code(e.status_code());
                return self.exit(ctx);
            }
        };
        if let Err(e) = stream_body(body, length, sink, &mut ctx).await {
            warn!(error = %e, "streamed request failed");
            ctx.set_code(e.status_code());
        }
        self.exit(ctx)
    }

    /// Finalize the response and hand the context to the after-hooks
    fn exit(&self, mut ctx: RequestContext) -> Response<Full<Bytes>> {
        let response = ctx.take_response();
        if !self.after.is_empty() {
            let after = Arc::clone(&self.after);
            tokio::spawn(
                async move {
                    after.run(&mut ctx).await;
                }
                .in_current_span(),
            );
        }
        response
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.methods.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

/// Collect the body, truncated to the declared length
async fn read_body<B>(body: B, length: i64) -> Result<Bytes>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let Ok(limit) = usize::try_from(length) else {
        return Ok(Bytes::new());
    };
    if limit == 0 {
        return Ok(Bytes::new());
    }

    let mut body = Box::pin(body);
    let mut data = BytesMut::with_capacity(limit.min(MAX_PREALLOC));
    while data.len() < limit {
        let Some(frame) = body.frame().await else {
            break;
        };
        let frame = frame.map_err(|e| DavError::Body(e.into().to_string()))?;
        if let Ok(chunk) = frame.into_data() {
            let take = chunk.len().min(limit - data.len());
            data.extend_from_slice(&chunk[..take]);
        }
    }
    Ok(data.freeze())
}

/// Feed data frames to `sink` until the declared length has been seen
async fn stream_body<B>(
    body: B,
    length: i64,
    mut sink: Box<dyn ChunkSink>,
    ctx: &mut RequestContext,
) -> Result<()>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let mut body = Box::pin(body);
    let mut received: i64 = 0;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| DavError::Body(e.into().to_string()))?;
        let Ok(chunk) = frame.into_data() else {
            continue;
        };
        if chunk.is_empty() {
            continue;
        }

        let size = i64::try_from(chunk.len()).unwrap_or(i64::MAX);
        received = received.saturating_add(size);
        let is_first = received == size;
        let is_last = received >= length;
        sink.on_data(ctx, chunk, is_first, is_last).await?;
        if is_last {
            break;
        }
    }
    debug!(bytes = received, "request body streamed");
    Ok(())
}
