//! Platform super-admin status.
//!
//! Resolved asynchronously and independently of tenant membership, only from
//! the authoritative registry. Until the registry answers, the status is
//! [`SuperAdminStatus::Unknown`], which is neither true nor false.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use posgate_core::{Loadable, ResolutionCache, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperAdminStatus {
    /// The registry has not answered yet.
    #[default]
    Unknown,
    Granted,
    Denied,
    /// The registry lookup failed. Equivalent to `Denied` for every decision;
    /// kept separate so denials can be audited with their cause.
    LookupFailed,
}

impl SuperAdminStatus {
    pub fn is_granted(self) -> bool {
        self == SuperAdminStatus::Granted
    }

    pub fn is_resolved(self) -> bool {
        self != SuperAdminStatus::Unknown
    }

    /// `Unknown` or `LookupFailed`: the registry has not given a usable answer.
    pub fn needs_lookup(self) -> bool {
        matches!(self, SuperAdminStatus::Unknown | SuperAdminStatus::LookupFailed)
    }

    /// Map a registry answer; errors fail closed.
    pub fn from_lookup<E>(result: &Result<bool, E>) -> Self {
        match result {
            Ok(true) => SuperAdminStatus::Granted,
            Ok(false) => SuperAdminStatus::Denied,
            Err(_) => SuperAdminStatus::LookupFailed,
        }
    }
}

impl From<Loadable<bool>> for SuperAdminStatus {
    fn from(value: Loadable<bool>) -> Self {
        match value {
            Loadable::Loading => SuperAdminStatus::Unknown,
            Loadable::Ready(true) => SuperAdminStatus::Granted,
            Loadable::Ready(false) => SuperAdminStatus::Denied,
            Loadable::Failed(_) => SuperAdminStatus::LookupFailed,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("super-admin registry unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative, server-verified super-admin registry.
#[async_trait]
pub trait SuperAdminRegistry: Send + Sync {
    async fn is_super_admin(&self, user_id: UserId) -> Result<bool, RegistryError>;
}

/// In-memory registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySuperAdminRegistry {
    users: RwLock<HashSet<UserId>>,
}

impl InMemorySuperAdminRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, user_id: UserId) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user_id);
        }
    }

    pub fn revoke(&self, user_id: UserId) {
        if let Ok(mut users) = self.users.write() {
            users.remove(&user_id);
        }
    }
}

#[async_trait]
impl SuperAdminRegistry for InMemorySuperAdminRegistry {
    async fn is_super_admin(&self, user_id: UserId) -> Result<bool, RegistryError> {
        let users = self
            .users
            .read()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))?;
        Ok(users.contains(&user_id))
    }
}

/// Caches super-admin status per user id.
pub struct SuperAdminResolver {
    registry: Arc<dyn SuperAdminRegistry>,
    cache: ResolutionCache<UserId, bool>,
}

impl SuperAdminResolver {
    pub fn new(registry: Arc<dyn SuperAdminRegistry>) -> Self {
        Self {
            registry,
            cache: ResolutionCache::new(),
        }
    }

    /// Cached status; `Unknown` until a lookup for this user completes.
    pub fn status(&self, user_id: UserId) -> SuperAdminStatus {
        self.cache.get(&user_id).into()
    }

    /// Ask the registry and cache the answer.
    pub async fn refresh(&self, user_id: UserId) -> SuperAdminStatus {
        let ticket = self.cache.begin(user_id);
        let result = self.registry.is_super_admin(user_id).await;

        if let Err(err) = &result {
            tracing::warn!(%user_id, error = %err, "super-admin lookup failed; treating as denied");
        }
        let status = SuperAdminStatus::from_lookup(&result);

        if !self.cache.complete(ticket, result.into()) {
            tracing::debug!(%user_id, "discarding super-admin lookup for invalidated session");
            return SuperAdminStatus::Unknown;
        }
        status
    }

    pub fn invalidate(&self, user_id: UserId) {
        self.cache.invalidate(&user_id);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl core::fmt::Debug for SuperAdminResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuperAdminResolver").finish_non_exhaustive()
    }
}
