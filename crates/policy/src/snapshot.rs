//! Fully materialized input to one access evaluation.
//!
//! Every source is captured as a value (including the impersonation state),
//! so the same snapshot always evaluates to the same decision.

use chrono::{DateTime, Utc};

use posgate_auth::{Identity, ImpersonationSession, SuperAdminStatus};
use posgate_core::Loadable;
use posgate_tenancy::{Connectivity, TenantAccess, TenantResolution};

use crate::route::RouteRequest;

/// An active impersonation session and the resolution of its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpersonationView {
    pub session: ImpersonationSession,
    pub target: TenantResolution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSnapshot {
    pub identity: Identity,
    /// The user's own tenant resolution (ignored while impersonating).
    pub tenant: TenantResolution,
    pub super_admin: SuperAdminStatus,
    pub impersonation: Option<ImpersonationView>,
    pub connectivity: Connectivity,
    pub route: RouteRequest,
    pub now: DateTime<Utc>,
}

impl AccessSnapshot {
    /// Snapshot with every asynchronous source still loading.
    pub fn new(identity: Identity, route: RouteRequest, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            tenant: Loadable::Loading,
            super_admin: SuperAdminStatus::Unknown,
            impersonation: None,
            connectivity: Connectivity::Online,
            route,
            now,
        }
    }

    pub fn with_tenant(mut self, tenant: TenantResolution) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn with_access(self, access: TenantAccess) -> Self {
        self.with_tenant(Loadable::Ready(Some(access)))
    }

    pub fn with_super_admin(mut self, status: SuperAdminStatus) -> Self {
        self.super_admin = status;
        self
    }

    pub fn impersonating(mut self, session: ImpersonationSession, target: TenantResolution) -> Self {
        self.impersonation = Some(ImpersonationView { session, target });
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn is_impersonating(&self) -> bool {
        self.impersonation.is_some()
    }

    /// Tenant resolution every later rule uses: the impersonation target's
    /// while a session is active, otherwise the user's own.
    pub fn effective_tenant(&self) -> Loadable<Option<&TenantAccess>> {
        let resolution = match &self.impersonation {
            Some(view) => &view.target,
            None => &self.tenant,
        };
        resolution.as_ref().map(Option::as_ref)
    }
}
