//! Live access context.
//!
//! Owns handles to the five input sources and materializes an
//! [`AccessSnapshot`] from their current (possibly still loading) values.
//! Loading is explicit: [`AccessContext::refresh`] fetches whatever the
//! current identity still lacks or failed to load, and callers re-run the
//! guard afterwards. A failed lookup keeps denying until a retry answers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use posgate_auth::{
    AuthChange, Identity, IdentitySource, ImpersonationError, ImpersonationHolder, ImpersonationSession,
    ImpersonationState, SuperAdminResolver, SuperAdminStatus,
};
use posgate_core::{TenantId, UserId};
use posgate_events::Subscription;
use posgate_policy::{AccessSnapshot, RouteRequest};
use posgate_tenancy::{ConnectivityProbe, TenantResolver};

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("no signed-in user")]
    NotSignedIn,

    #[error("impersonation requires a verified super-admin (status: {0:?})")]
    NotSuperAdmin(SuperAdminStatus),

    #[error(transparent)]
    Impersonation(#[from] ImpersonationError),
}

pub struct AccessContext {
    identity: Arc<dyn IdentitySource>,
    tenants: Arc<TenantResolver>,
    super_admins: Arc<SuperAdminResolver>,
    impersonation: Arc<ImpersonationHolder>,
    connectivity: Arc<dyn ConnectivityProbe>,
}

impl AccessContext {
    pub fn new(
        identity: Arc<dyn IdentitySource>,
        tenants: Arc<TenantResolver>,
        super_admins: Arc<SuperAdminResolver>,
        impersonation: Arc<ImpersonationHolder>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            identity,
            tenants,
            super_admins,
            impersonation,
            connectivity,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity.current_identity()
    }

    /// Cached super-admin status of the current user; `Unknown` without one.
    pub fn super_admin_status(&self) -> SuperAdminStatus {
        match self.identity().user_id {
            Some(user_id) => self.super_admins.status(user_id),
            None => SuperAdminStatus::Unknown,
        }
    }

    pub fn impersonation(&self) -> ImpersonationState {
        self.impersonation.current()
    }

    /// Current values of every source, captured for one evaluation.
    pub fn snapshot(&self, route: RouteRequest, now: DateTime<Utc>) -> AccessSnapshot {
        let identity = self.identity();
        let mut snapshot = AccessSnapshot::new(identity, route, now).with_connectivity(self.connectivity.connectivity());

        let Some(user_id) = identity.user_id else {
            return snapshot;
        };

        snapshot = snapshot
            .with_tenant(self.tenants.resolution(user_id))
            .with_super_admin(self.super_admins.status(user_id));

        if let Some(session) = self.session_for(user_id) {
            let target = self.tenants.target_resolution(&session);
            snapshot = snapshot.impersonating(session, target);
        }
        snapshot
    }

    /// Load every source the current identity is still waiting on, and retry
    /// every source whose last lookup failed.
    ///
    /// Lookups run concurrently. A failed value stays in place (denying)
    /// until the retry completes. A lookup superseded by a sign-out is
    /// discarded by the resolvers, so a late answer never lands on the next
    /// session.
    pub async fn refresh(&self) {
        let identity = self.identity();
        let Some(user_id) = identity.user_id.filter(|_| identity.initialized) else {
            return;
        };

        let super_admin = async {
            if self.super_admins.status(user_id).needs_lookup() {
                let status = self.super_admins.refresh(user_id).await;
                tracing::debug!(%user_id, ?status, "super-admin status refreshed");
            }
        };

        let tenant = async {
            match self.session_for(user_id) {
                Some(session) => {
                    if self.tenants.target_resolution(&session).needs_fetch() {
                        self.tenants.refresh_target(&session).await;
                    }
                }
                None => {
                    if self.tenants.resolution(user_id).needs_fetch() {
                        self.tenants.refresh(user_id).await;
                    }
                }
            }
        };

        tokio::join!(super_admin, tenant);
    }

    /// Whether a source the current identity depends on last failed to load.
    pub fn has_failed_lookup(&self) -> bool {
        let identity = self.identity();
        let Some(user_id) = identity.user_id.filter(|_| identity.initialized) else {
            return false;
        };
        if self.super_admins.status(user_id) == SuperAdminStatus::LookupFailed {
            return true;
        }
        match self.session_for(user_id) {
            Some(session) => self.tenants.target_resolution(&session).is_failed(),
            None => self.tenants.resolution(user_id).is_failed(),
        }
    }

    /// React to one authentication change.
    ///
    /// Sign-out drops every cached resolution and ends an impersonation
    /// session the departing user started.
    pub fn handle_auth_change(&self, change: AuthChange) {
        match change {
            AuthChange::SignedOut(user_id) => {
                self.tenants.clear();
                self.super_admins.clear();
                if self.impersonation.actor_signed_out(user_id) {
                    tracing::info!(%user_id, "impersonation ended by actor sign-out");
                }
                tracing::debug!(%user_id, "access caches cleared on sign-out");
            }
            AuthChange::Initialized(_) | AuthChange::SignedIn(_) | AuthChange::SigningOut(_) => {}
        }
    }

    /// Apply every change queued on `changes`. Returns how many were applied.
    pub fn sync_auth_changes(&self, changes: &Subscription<AuthChange>) -> usize {
        let pending = changes.drain();
        for change in &pending {
            self.handle_auth_change(*change);
        }
        pending.len()
    }

    /// Start acting as `target_user_id` inside `target_tenant_id`.
    ///
    /// The current user must already be a confirmed super-admin.
    pub fn start_impersonation(
        &self,
        target_tenant_id: TenantId,
        target_user_id: UserId,
        business_name_snapshot: impl Into<String>,
    ) -> Result<ImpersonationSession, GuardError> {
        let actor_id = self.identity().user_id.ok_or(GuardError::NotSignedIn)?;

        let status = self.super_admins.status(actor_id);
        if !status.is_granted() {
            tracing::warn!(%actor_id, ?status, "refusing to start impersonation");
            return Err(GuardError::NotSuperAdmin(status));
        }

        Ok(self
            .impersonation
            .start(actor_id, target_tenant_id, target_user_id, business_name_snapshot)?)
    }

    pub fn exit_impersonation(&self) {
        self.impersonation.exit();
    }

    /// The active session, if the signed-in user is its actor.
    fn session_for(&self, user_id: UserId) -> Option<ImpersonationSession> {
        match self.impersonation.current() {
            ImpersonationState::Active(session) if session.actor_super_admin_id == user_id => Some(session),
            _ => None,
        }
    }
}

impl core::fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessContext")
            .field("identity", &self.identity())
            .field("impersonation", &self.impersonation())
            .finish_non_exhaustive()
    }
}
