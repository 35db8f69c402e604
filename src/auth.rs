//! Credential store boundary.
//!
//! Capturing and persisting credentials is the login flow's job. The
//! session only needs to read the token once on entry and forget it on
//! logout, so that is all [`CredentialStore`] asks for.

use std::fmt;
use std::sync::RwLock;

/// Source of the bearer token.
pub trait CredentialStore: fmt::Debug + Send + Sync {
    /// Current token, if the user is logged in.
    fn token(&self) -> Option<String>;

    /// Forgets the token (logout).
    fn clear(&self);
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    /// Creates a store holding `token`. Empty tokens count as logged out.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .map_or_else(|poisoned| poisoned.into_inner().clone(), |guard| guard.clone())
    }

    fn clear(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
