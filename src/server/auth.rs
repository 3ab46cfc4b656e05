use http::HeaderMap;

use crate::error::Result;

/// Identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub anonymous: bool,
}

impl User {
    pub fn anonymous() -> Self {
        User {
            username: String::new(),
            anonymous: true,
        }
    }

    pub fn named(username: impl Into<String>) -> Self {
        User {
            username: username.into(),
            anonymous: false,
        }
    }
}

/// Turns request headers into a user.
///
/// Returning `DavError::AuthenticationPropertyMissing` makes the server answer
/// `403 Forbidden` before any middleware runs; any other error gives `500`.
pub trait Authentication: Send + Sync + std::fmt::Debug {
    fn authenticate(&self, headers: &HeaderMap) -> Result<User>;
}

/// Accepts every request as the anonymous user
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl Authentication for Anonymous {
    fn authenticate(&self, _headers: &HeaderMap) -> Result<User> {
        Ok(User::anonymous())
    }
}
