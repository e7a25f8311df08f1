//! Opaque credentials shared by every Runner in a delegation tree.

use std::sync::Arc;

/// An API token. Cloning shares the same allocation; the token itself is
/// never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: Arc<str>,
}

impl Credentials {
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            token: Arc::from(token.as_ref()),
        }
    }

    /// The raw token, for transports that need to send it.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether two handles point at the same token allocation.
    pub fn shares_with(&self, other: &Credentials) -> bool {
        Arc::ptr_eq(&self.token, &other.token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
