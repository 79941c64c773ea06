//! Guard for tenant views.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use posgate_policy::{AccessPolicyEngine, Decision, Evaluation, PendingReason, RouteRequest};
use posgate_tenancy::UpsellPayload;

use crate::context::AccessContext;

/// What the shell should do with the requested view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Keep the loading indicator up. Never navigate on this.
    ShowLoading(PendingReason),
    Navigate { to: String, origin: Option<String> },
    Render,
    /// Render the upsell view in place of the requested one.
    RenderUpsell(UpsellPayload),
}

impl From<Decision> for GuardOutcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Pending(reason) => GuardOutcome::ShowLoading(reason),
            Decision::Redirect(r) => GuardOutcome::Navigate {
                to: r.target,
                origin: r.preserve_origin,
            },
            Decision::Allow => GuardOutcome::Render,
            Decision::AllowWithUpsell(payload) => GuardOutcome::RenderUpsell(payload),
        }
    }
}

#[derive(Debug)]
pub struct RouteGuard {
    context: Arc<AccessContext>,
    engine: AccessPolicyEngine,
}

impl RouteGuard {
    pub fn new(context: Arc<AccessContext>, engine: AccessPolicyEngine) -> Self {
        Self { context, engine }
    }

    pub fn context(&self) -> &AccessContext {
        &self.context
    }

    /// Evaluate `route` against the sources as they are right now.
    pub fn check(&self, route: &RouteRequest, now: DateTime<Utc>) -> GuardOutcome {
        let snapshot = self.context.snapshot(route.clone(), now);
        let Evaluation { decision, rule } = self.engine.evaluate(&snapshot);

        tracing::debug!(
            path = %route.path,
            rule = rule.number(),
            rule_name = ?rule,
            decision = ?decision,
            impersonating = snapshot.is_impersonating(),
            "route decision"
        );

        decision.into()
    }

    /// Load missing sources and retry failed ones, then evaluate.
    ///
    /// Still `ShowLoading` if a source is loading elsewhere or was
    /// invalidated mid-flight; callers re-run on the next change.
    pub async fn resolve(&self, route: &RouteRequest, now: DateTime<Utc>) -> GuardOutcome {
        let outcome = self.check(route, now);
        if !matches!(outcome, GuardOutcome::ShowLoading(_)) && !self.context.has_failed_lookup() {
            return outcome;
        }
        self.context.refresh().await;
        self.check(route, now)
    }
}
