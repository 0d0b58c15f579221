//! Session providers supply the bearer credential for each attempt.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use crate::types::Credential;

/// Source of the current authentication credential.
///
/// Called once per attempt so a credential refreshed in the middle of a
/// retry sequence is picked up.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn credential(&self) -> Option<Credential>;
}

/// A fixed credential (or a fixed absence of one).
#[derive(Debug, Clone)]
pub struct StaticSession {
    credential: Option<Credential>,
}

impl StaticSession {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    pub fn signed_out() -> Self {
        Self { credential: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn credential(&self) -> Option<Credential> {
        self.credential.clone()
    }
}

/// A credential slot shared with whatever refreshes or revokes the session.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl SharedSession {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credential)),
        }
    }

    pub fn set(&self, credential: Credential) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<Credential> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SessionProvider for SharedSession {
    async fn credential(&self) -> Option<Credential> {
        self.current()
    }
}
