//! The authenticator callback contract (§6 Authentication, §1 out-of-scope).
//!
//! Verifying the bearer credential itself is explicitly out of scope for the
//! core; the supervisor (C8) only calls this trait and consumes whatever
//! [`Principal`] comes back. [`StaticTokenAuthenticator`] is a test double
//! standing in for a real IDP integration so the server is runnable without
//! one, mirroring the workspace's existing `auth` crate's separation between
//! "verify a credential" and "carry a principal forward".

use std::collections::HashMap;

use async_trait::async_trait;

use crate::principal::Principal;

#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Verify an opaque bearer credential and return the principal it maps
    /// to, or `None` to reject the connection (401 at the transport layer,
    /// no session created).
    async fn authenticate(&self, credential: &str) -> Option<Principal>;
}

/// An authenticator backed by a fixed token -> principal table.
///
/// Intended for tests and local development; a real deployment supplies its
/// own `Authenticator` (JWT validation, OIDC, etc.) which is out of scope
/// for this crate.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, credential: &str) -> Option<Principal> {
        self.tokens.get(credential).cloned()
    }
}
