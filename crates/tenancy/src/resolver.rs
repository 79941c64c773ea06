//! Tenant resolution: user id → (tenant, membership).
//!
//! Results are cached per user id and must be invalidated on sign-out.
//! Lookup failures and invalid records are cached as `Failed` so consumers
//! can deny instead of waiting forever.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use posgate_auth::{ImpersonationSession, TenantMembership};
use posgate_core::{DomainError, DomainResult, Loadable, ResolutionCache, TenantId, UserId};

use crate::tenant::{Tenant, TenantRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("tenant directory unavailable: {0}")]
    Unavailable(String),
}

/// External tenant/membership store.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_membership(&self, user_id: UserId) -> Result<Option<TenantMembership>, DirectoryError>;

    async fn get_tenant(&self, tenant_id: TenantId) -> Result<Option<TenantRecord>, DirectoryError>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    memberships: RwLock<HashMap<UserId, TenantMembership>>,
    tenants: RwLock<HashMap<TenantId, TenantRecord>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_membership(&self, user_id: UserId, membership: TenantMembership) {
        if let Ok(mut map) = self.memberships.write() {
            map.insert(user_id, membership);
        }
    }

    pub fn remove_membership(&self, user_id: UserId) {
        if let Ok(mut map) = self.memberships.write() {
            map.remove(&user_id);
        }
    }

    pub fn put_tenant(&self, record: TenantRecord) {
        if let Ok(mut map) = self.tenants.write() {
            map.insert(record.id, record);
        }
    }

    pub fn remove_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.tenants.write() {
            map.remove(&tenant_id);
        }
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn get_membership(&self, user_id: UserId) -> Result<Option<TenantMembership>, DirectoryError> {
        let map = self
            .memberships
            .read()
            .map_err(|_| DirectoryError::Unavailable("membership lock poisoned".to_string()))?;
        Ok(map.get(&user_id).cloned())
    }

    async fn get_tenant(&self, tenant_id: TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        let map = self
            .tenants
            .read()
            .map_err(|_| DirectoryError::Unavailable("tenant lock poisoned".to_string()))?;
        Ok(map.get(&tenant_id).cloned())
    }
}

/// A resolved (tenant, membership) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAccess {
    pub tenant: Tenant,
    pub membership: TenantMembership,
}

/// Resolution of a user's tenant: `Ready(None)` means "no tenant yet".
pub type TenantResolution = Loadable<Option<TenantAccess>>;

pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    own: ResolutionCache<UserId, Option<TenantAccess>>,
    targets: ResolutionCache<(TenantId, UserId), Option<TenantAccess>>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self {
            directory,
            own: ResolutionCache::new(),
            targets: ResolutionCache::new(),
        }
    }

    /// Cached resolution for `user_id`'s own membership.
    pub fn resolution(&self, user_id: UserId) -> TenantResolution {
        self.own.get(&user_id)
    }

    pub async fn refresh(&self, user_id: UserId) -> TenantResolution {
        let ticket = self.own.begin(user_id);
        let result = self.load(user_id, None).await;
        log_failure(user_id, &result);

        let resolution: TenantResolution = result.into();
        if !self.own.complete(ticket, resolution.clone()) {
            tracing::debug!(%user_id, "discarding tenant resolution for invalidated session");
            return Loadable::Loading;
        }
        resolution
    }

    /// Cached resolution of an impersonation target.
    pub fn target_resolution(&self, session: &ImpersonationSession) -> TenantResolution {
        self.targets.get(&target_key(session))
    }

    /// Resolve what `session.target_user_id` can do inside the target tenant.
    ///
    /// A target user whose membership points at another tenant resolves to
    /// no membership.
    pub async fn refresh_target(&self, session: &ImpersonationSession) -> TenantResolution {
        let ticket = self.targets.begin(target_key(session));
        let result = self
            .load(session.target_user_id, Some(session.target_tenant_id))
            .await;
        log_failure(session.target_user_id, &result);

        let resolution: TenantResolution = result.into();
        if !self.targets.complete(ticket, resolution.clone()) {
            return Loadable::Loading;
        }
        resolution
    }

    pub fn invalidate(&self, user_id: UserId) {
        self.own.invalidate(&user_id);
    }

    /// Drop every cached resolution, own and impersonated.
    pub fn clear(&self) {
        self.own.clear();
        self.targets.clear();
    }

    async fn load(&self, user_id: UserId, expected_tenant: Option<TenantId>) -> DomainResult<Option<TenantAccess>> {
        let membership = self
            .directory
            .get_membership(user_id)
            .await
            .map_err(|e| DomainError::unavailable(e.to_string()))?;

        let Some(membership) = membership else {
            return Ok(None);
        };

        if let Some(expected) = expected_tenant {
            if membership.tenant_id != expected {
                tracing::warn!(
                    %user_id,
                    member_of = %membership.tenant_id,
                    %expected,
                    "impersonation target is not a member of the target tenant"
                );
                return Ok(None);
            }
        }

        let record = self
            .directory
            .get_tenant(membership.tenant_id)
            .await
            .map_err(|e| DomainError::unavailable(e.to_string()))?
            .ok_or_else(|| DomainError::not_found(format!("tenant {}", membership.tenant_id)))?;

        if record.id != membership.tenant_id {
            return Err(DomainError::validation(format!(
                "directory returned tenant {} for {}",
                record.id, membership.tenant_id
            )));
        }

        let tenant = Tenant::from_record(record)?;
        Ok(Some(TenantAccess { tenant, membership }))
    }
}

impl core::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantResolver").finish_non_exhaustive()
    }
}

fn target_key(session: &ImpersonationSession) -> (TenantId, UserId) {
    (session.target_tenant_id, session.target_user_id)
}

fn log_failure<T>(user_id: UserId, result: &DomainResult<T>) {
    if let Err(err) = result {
        tracing::warn!(%user_id, error = %err, "tenant resolution failed; access will be denied");
    }
}
