//! Audit trail for privileged access attempts.
//!
//! Recording is fire-and-forget: [`AuditSink::record`] returns nothing, and a
//! sink that fails internally must not change what the caller decided.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use posgate_core::{TenantId, UserId};

use crate::bus::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// The super-admin console was rendered for a verified super-admin.
    AdminConsoleAccess,
    /// The super-admin console refused to render.
    AdminConsoleDenied,
    ImpersonationStarted,
    ImpersonationEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Granted,
    Denied,
    /// Denied because the authoritative check itself failed.
    CheckFailed,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub actor_id: Option<UserId>,
    pub target_tenant_id: Option<TenantId>,
    pub path: String,
    pub outcome: AuditOutcome,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        kind: AuditKind,
        actor_id: Option<UserId>,
        path: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            kind,
            actor_id,
            target_tenant_id: None,
            path: path.into(),
            outcome,
            occurred_at: Utc::now(),
        }
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = at;
        self
    }

    pub fn with_target_tenant(mut self, tenant_id: TenantId) -> Self {
        self.target_tenant_id = Some(tenant_id);
        self
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, event: AuditEvent) {
        (**self).record(event)
    }
}

/// Publishes audit events onto an [`EventBus`] for downstream storage.
#[derive(Debug)]
pub struct BusAuditSink<B> {
    bus: B,
}

impl<B> BusAuditSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> AuditSink for BusAuditSink<B>
where
    B: EventBus<AuditEvent>,
{
    fn record(&self, event: AuditEvent) {
        let kind = event.kind;
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(?kind, error = ?err, "failed to publish audit event");
        }
    }
}

/// Writes audit events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "posgate::audit",
            kind = ?event.kind,
            actor_id = ?event.actor_id,
            target_tenant_id = ?event.target_tenant_id,
            path = %event.path,
            outcome = ?event.outcome,
            "audit"
        );
    }
}
