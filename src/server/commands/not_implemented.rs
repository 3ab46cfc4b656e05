use async_trait::async_trait;
use http::StatusCode;
use tracing::debug;

use super::{Method, RequestContext};

/// Fallback for verbs without a registered method
pub struct NotImplementedMethod;

#[async_trait]
impl Method for NotImplementedMethod {
    fn name(&self) -> &str {
        "NOT-IMPLEMENTED"
    }

    async fn execute(&self, ctx: &mut RequestContext) {
        debug!(method = %ctx.method(), "no method registered");
        ctx.set_code(StatusCode::NOT_IMPLEMENTED);
    }
}
