use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HeaderName, HeaderValue};
use http::request::Parts;
use http::{HeaderMap, Method as HttpMethod, Response, StatusCode, Uri};
use http_body_util::Full;
use std::sync::Arc;

use super::ServerState;
use super::auth::User;
use crate::error::Result;
use crate::vfs::{FsPath, ResourceRef};

/// Per-request state handed to middleware and methods.
///
/// Holds the parsed request, the authenticated user, the buffered body and the
/// response being built. The response is only sent once the method returns.
pub struct RequestContext {
    server: Arc<ServerState>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    path: FsPath,
    content_length: i64,
    user: User,
    data: Bytes,
    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Bytes,
}

impl RequestContext {
    /// Build a context, authenticating the request
    pub fn create(server: Arc<ServerState>, parts: &Parts) -> Result<Self> {
        let user = server.options().authentication.authenticate(&parts.headers)?;
        let content_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0);

        Ok(RequestContext {
            server,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            path: FsPath::from_uri_path(parts.uri.path()),
            content_length,
            user,
            data: Bytes::new(),
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
        })
    }

    pub fn server(&self) -> &Arc<ServerState> {
        &self.server
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Requested path, percent-decoded
    pub fn path(&self) -> &FsPath {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value by case-insensitive name
    pub fn find_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared body length; 0 when absent or malformed
    pub fn content_length(&self) -> i64 {
        self.content_length
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Buffered request body. Empty when the body was streamed.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub(crate) fn set_data(&mut self, data: Bytes) {
        self.data = data;
    }

    /// Resolve the requested path against the server root
    pub async fn resource(&self) -> Result<ResourceRef> {
        self.server.resource_from_path(&self.path).await
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_code(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.response_body = body.into();
    }

    /// Finalize the response. Status and headers stay readable afterwards.
    pub(crate) fn take_response(&mut self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(std::mem::take(&mut self.response_body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.response_headers.clone();
        response
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("content_length", &self.content_length)
            .field("status", &self.status)
            .finish()
    }
}
