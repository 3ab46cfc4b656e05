use async_trait::async_trait;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue, LAST_MODIFIED};
use tracing::warn;

use super::{Method, RequestContext};

/// GET: return the content of a file
pub struct GetMethod;

#[async_trait]
impl Method for GetMethod {
    fn name(&self) -> &str {
        "GET"
    }

    async fn execute(&self, ctx: &mut RequestContext) {
        let resource = match ctx.resource().await {
            Ok(resource) => resource,
            Err(_) => {
                ctx.set_code(StatusCode::NOT_FOUND);
                return;
            }
        };

        match resource.resource_type().await {
            Ok(kind) if kind.is_file() => {}
            Ok(_) => {
                ctx.set_code(StatusCode::METHOD_NOT_ALLOWED);
                return;
            }
            Err(e) => {
                warn!(error = %e, "resource type unavailable");
                ctx.set_code(StatusCode::INTERNAL_SERVER_ERROR);
                return;
            }
        }

        let data = match resource.read().await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %ctx.path(), error = %e, "read failed");
                ctx.set_code(StatusCode::INTERNAL_SERVER_ERROR);
                return;
            }
        };

        if let Ok(modified) = resource.last_modified().await {
            let date = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            if let Ok(value) = HeaderValue::from_str(&date) {
                ctx.set_header(LAST_MODIFIED, value);
            }
        }
        ctx.set_header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        ctx.set_body(data);
        ctx.set_code(StatusCode::OK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::commands::test_support::{empty, send, server_with_root};
    use crate::vfs::ResourceType;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_get_file() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.file_with_content("a.txt", "hello")).await.unwrap();

        let response = send(&server, empty("GET", "/a.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from("hello"));
        assert!(response.headers().contains_key(LAST_MODIFIED));
    }

    #[tokio::test]
    async fn test_get_collection_or_missing() {
        let (server, root, manager) = server_with_root();
        root.add_child(manager.create_unattached("dir", ResourceType::Directory))
            .await
            .unwrap();

        let response = send(&server, empty("GET", "/dir")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = send(&server, empty("GET", "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
