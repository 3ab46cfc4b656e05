use async_trait::async_trait;
use http::StatusCode;
use tracing::warn;

use super::{Method, RequestContext};

/// DELETE: remove a resource and its subtree
pub struct DeleteMethod;

#[async_trait]
impl Method for DeleteMethod {
    fn name(&self) -> &str {
        "DELETE"
    }

    async fn execute(&self, ctx: &mut RequestContext) {
        if ctx.path().is_root() {
            ctx.set_code(StatusCode::FORBIDDEN);
            return;
        }

        let resource = match ctx.resource().await {
            Ok(resource) => resource,
            Err(_) => {
                ctx.set_code(StatusCode::NOT_FOUND);
                return;
            }
        };

        match resource.delete().await {
            Ok(()) => ctx.set_code(StatusCode::NO_CONTENT),
            Err(e) => {
                warn!(path = %ctx.path(), error = %e, "delete failed");
                ctx.set_code(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}
