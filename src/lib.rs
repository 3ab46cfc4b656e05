//! A WebDAV server core: verb dispatch with before/after middleware, streamed
//! request bodies, and recursive operations over a tree of resources served
//! by pluggable backends.

pub mod backend;
pub mod error;
pub mod server;
pub mod vfs;

pub use error::{DavError, Result};
pub use server::{ServerOptions, WebDavServer};
