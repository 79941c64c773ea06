//! Gate for the super-admin console.
//!
//! Stricter than the tenant-view rule that redirects super-admins to the
//! console: this one decides whether privileged UI may render at all. Nothing
//! renders until the registry has answered, and any answer other than a grant
//! is a hard denial that is audited.
//!
//! Every attempt is audited. Repeats of the same attempt inside a short
//! window are re-renders of one navigation and are recorded once.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use posgate_auth::{Identity, SuperAdminStatus};
use posgate_core::UserId;
use posgate_events::{AuditEvent, AuditKind, AuditOutcome, AuditSink};
use posgate_policy::normalize_path;

use crate::context::AccessContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// Render nothing privileged yet.
    Loading,
    SignIn { origin: String },
    Render,
    /// Hard denial view.
    Denied,
}

/// Identical attempts closer together than this are recorded once.
pub const DEFAULT_AUDIT_DEDUPE_WINDOW: Duration = Duration::seconds(2);

type AuditKey = (Option<UserId>, String, AuditKind, AuditOutcome);

pub struct AdminConsoleGate {
    audit: Arc<dyn AuditSink>,
    dedupe_window: Duration,
    last_recorded: Mutex<Option<(AuditKey, DateTime<Utc>)>>,
}

impl AdminConsoleGate {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            dedupe_window: DEFAULT_AUDIT_DEDUPE_WINDOW,
            last_recorded: Mutex::new(None),
        }
    }

    /// A zero window records every call.
    pub fn with_dedupe_window(mut self, window: Duration) -> Self {
        self.dedupe_window = window;
        self
    }

    pub fn check(&self, identity: &Identity, super_admin: SuperAdminStatus, path: &str) -> ConsoleOutcome {
        self.check_at(identity, super_admin, path, Utc::now())
    }

    /// [`check`](Self::check) with an explicit clock.
    pub fn check_at(
        &self,
        identity: &Identity,
        super_admin: SuperAdminStatus,
        path: &str,
        now: DateTime<Utc>,
    ) -> ConsoleOutcome {
        if !identity.initialized {
            return ConsoleOutcome::Loading;
        }
        let Some(user_id) = identity.user_id else {
            return ConsoleOutcome::SignIn {
                origin: path.to_string(),
            };
        };

        let (outcome, kind, audit_outcome) = match super_admin {
            SuperAdminStatus::Unknown => return ConsoleOutcome::Loading,
            SuperAdminStatus::Granted => (ConsoleOutcome::Render, AuditKind::AdminConsoleAccess, AuditOutcome::Granted),
            SuperAdminStatus::Denied => (ConsoleOutcome::Denied, AuditKind::AdminConsoleDenied, AuditOutcome::Denied),
            SuperAdminStatus::LookupFailed => (
                ConsoleOutcome::Denied,
                AuditKind::AdminConsoleDenied,
                AuditOutcome::CheckFailed,
            ),
        };

        if outcome == ConsoleOutcome::Denied {
            tracing::warn!(%user_id, path, ?audit_outcome, "admin console denied");
        }
        self.record(kind, Some(user_id), path, audit_outcome, now);
        outcome
    }

    /// Check against the live context.
    pub fn check_context(&self, context: &AccessContext, path: &str) -> ConsoleOutcome {
        self.check(&context.identity(), context.super_admin_status(), path)
    }

    /// Record unless the same attempt was recorded within the dedupe window.
    fn record(
        &self,
        kind: AuditKind,
        actor_id: Option<UserId>,
        path: &str,
        outcome: AuditOutcome,
        now: DateTime<Utc>,
    ) {
        let key = (actor_id, normalize_path(path), kind, outcome);
        if let Ok(mut last) = self.last_recorded.lock() {
            if let Some((last_key, at)) = last.as_ref() {
                if *last_key == key && now - *at < self.dedupe_window {
                    return;
                }
            }
            *last = Some((key, now));
        }
        self.audit
            .record(AuditEvent::new(kind, actor_id, path, outcome).occurred_at(now));
    }
}

impl core::fmt::Debug for AdminConsoleGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminConsoleGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use posgate_events::{BusAuditSink, EventBus, InMemoryEventBus, Subscription};

    use super::*;

    fn gate() -> (AdminConsoleGate, Subscription<AuditEvent>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        (AdminConsoleGate::new(Arc::new(BusAuditSink::new(bus))), sub)
    }

    #[test]
    fn renders_nothing_until_known() {
        let (gate, audit) = gate();
        assert_eq!(
            gate.check(&Identity::bootstrapping(), SuperAdminStatus::Granted, "/admin"),
            ConsoleOutcome::Loading
        );
        assert_eq!(
            gate.check(&Identity::signed_in(UserId::new()), SuperAdminStatus::Unknown, "/admin"),
            ConsoleOutcome::Loading
        );
        assert!(audit.drain().is_empty());
    }

    #[test]
    fn anonymous_is_sent_to_sign_in() {
        let (gate, _) = gate();
        assert_eq!(
            gate.check(&Identity::anonymous(), SuperAdminStatus::Unknown, "/admin/tenants"),
            ConsoleOutcome::SignIn {
                origin: "/admin/tenants".to_string()
            }
        );
    }

    #[test]
    fn lookup_failure_is_a_hard_denial_with_cause() {
        let (gate, audit) = gate();
        let identity = Identity::signed_in(UserId::new());

        assert_eq!(
            gate.check(&identity, SuperAdminStatus::LookupFailed, "/admin"),
            ConsoleOutcome::Denied
        );

        let events = audit.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::AdminConsoleDenied);
        assert_eq!(events[0].outcome, AuditOutcome::CheckFailed);
        assert_eq!(events[0].actor_id, identity.user_id);
    }

    #[test]
    fn re_renders_are_not_re_audited() {
        let (gate, audit) = gate();
        let identity = Identity::signed_in(UserId::new());
        let t0 = Utc::now();

        for ms in [0, 100, 200] {
            gate.check_at(&identity, SuperAdminStatus::Denied, "/admin", t0 + Duration::milliseconds(ms));
        }
        gate.check_at(&identity, SuperAdminStatus::Denied, "/admin/tenants", t0);
        gate.check_at(&identity, SuperAdminStatus::Denied, "/admin", t0);

        assert_eq!(audit.drain().len(), 3);
    }

    #[test]
    fn repeated_denials_outside_the_window_are_each_audited() {
        let (gate, audit) = gate();
        let intruder = Identity::signed_in(UserId::new());
        let t0 = Utc::now();

        for attempt in 0..3 {
            let at = t0 + DEFAULT_AUDIT_DEDUPE_WINDOW * attempt;
            assert_eq!(
                gate.check_at(&intruder, SuperAdminStatus::Denied, "/admin", at),
                ConsoleOutcome::Denied
            );
        }

        let events = audit.drain();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].occurred_at, t0 + DEFAULT_AUDIT_DEDUPE_WINDOW * 2);
    }

    #[test]
    fn zero_window_audits_every_call() {
        let (gate, audit) = gate();
        let gate = gate.with_dedupe_window(Duration::zero());
        let identity = Identity::signed_in(UserId::new());
        let now = Utc::now();

        for _ in 0..3 {
            gate.check_at(&identity, SuperAdminStatus::LookupFailed, "/admin", now);
        }
        assert_eq!(audit.drain().len(), 3);
    }

    #[test]
    fn grant_renders_and_records_access() {
        let (gate, audit) = gate();
        let identity = Identity::signed_in(UserId::new());

        assert_eq!(gate.check(&identity, SuperAdminStatus::Granted, "/admin"), ConsoleOutcome::Render);
        let events = audit.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::AdminConsoleAccess);
    }
}
