//! Access policy engine.
//!
//! One pure, total function from an [`AccessSnapshot`] to a [`Decision`],
//! evaluated on every navigation. Rules run top to bottom and the first one
//! that produces a decision wins; every later rule may assume all earlier
//! ones passed.
//!
//! | # | rule | outcome |
//! |---|------|---------|
//! | 1 | session bootstrap unfinished | `Pending(auth-init)` |
//! | 2 | no user | `Redirect(/auth)` keeping the origin |
//! | 3 | impersonation target still loading / failed | `Pending(impersonation-loading)` / `Redirect(/access-denied)` |
//! | 4 | own tenant loading, or super-admin unknown | `Pending(tenant-loading)` |
//! | 5 | super-admin outside impersonation | `Redirect(/admin)` |
//! | 6 | no membership (or lookup failed) | `Pending` / `Redirect(/onboarding)` / `Redirect(/access-denied)` |
//! | 7 | subscription blocked (not impersonating) | `Redirect(/account-suspended \| /subscription-required)` |
//! | 8 | path outside the business type's prefix (not impersonating) | `Redirect(landing)` |
//! | 9 | role requirements | `Redirect(role default \| /access-denied)` |
//! | 10 | cashier outside the allow-list | `Redirect(cashier default)` |
//! | 11 | feature or plan not entitled | `AllowWithUpsell` |
//! | 12 | otherwise | `Allow` |
//!
//! A redirect whose target is the page being requested is satisfied: the
//! engine answers `Allow` so status pages (sign-in, onboarding, suspension)
//! can render.

use serde::Serialize;

use posgate_auth::{AuthzError, Role, SuperAdminStatus, authorize};
use posgate_core::Loadable;
use posgate_tenancy::{BlockReason, FeatureCatalog, SubscriptionGate, TenantAccess};

use crate::config::{PolicyConfig, normalize_path, path_within, paths, query_suffix};
use crate::decision::{Decision, PendingReason, Redirect, RedirectReason};
use crate::snapshot::AccessSnapshot;

/// Rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    AuthInit,
    Authentication,
    ImpersonationTarget,
    TenantLoaded,
    SuperAdminConsole,
    Membership,
    Subscription,
    BusinessTypePartition,
    RoleGate,
    CashierScope,
    Entitlement,
    Default,
}

impl Rule {
    pub const ORDER: [Rule; 11] = [
        Rule::AuthInit,
        Rule::Authentication,
        Rule::ImpersonationTarget,
        Rule::TenantLoaded,
        Rule::SuperAdminConsole,
        Rule::Membership,
        Rule::Subscription,
        Rule::BusinessTypePartition,
        Rule::RoleGate,
        Rule::CashierScope,
        Rule::Entitlement,
    ];

    /// 1-based position in the rule table.
    pub fn number(self) -> u8 {
        match self {
            Rule::AuthInit => 1,
            Rule::Authentication => 2,
            Rule::ImpersonationTarget => 3,
            Rule::TenantLoaded => 4,
            Rule::SuperAdminConsole => 5,
            Rule::Membership => 6,
            Rule::Subscription => 7,
            Rule::BusinessTypePartition => 8,
            Rule::RoleGate => 9,
            Rule::CashierScope => 10,
            Rule::Entitlement => 11,
            Rule::Default => 12,
        }
    }
}

/// A decision together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    pub rule: Rule,
}

/// Per-evaluation view over a snapshot with impersonation already applied.
struct RuleContext<'a> {
    snapshot: &'a AccessSnapshot,
    path: String,
    impersonating: bool,
    effective: Loadable<Option<&'a TenantAccess>>,
}

impl<'a> RuleContext<'a> {
    fn new(snapshot: &'a AccessSnapshot) -> Self {
        Self {
            snapshot,
            path: normalize_path(&snapshot.route.path),
            impersonating: snapshot.is_impersonating(),
            effective: snapshot.effective_tenant(),
        }
    }

    /// The resolved pair; `None` before rule 6 has ruled out the alternatives.
    fn access(&self) -> Option<&'a TenantAccess> {
        match self.effective {
            Loadable::Ready(Some(access)) => Some(access),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessPolicyEngine {
    config: PolicyConfig,
    features: FeatureCatalog,
}

impl AccessPolicyEngine {
    pub fn new(config: PolicyConfig, features: FeatureCatalog) -> Self {
        Self { config, features }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn features(&self) -> &FeatureCatalog {
        &self.features
    }

    pub fn decide(&self, snapshot: &AccessSnapshot) -> Decision {
        self.evaluate(snapshot).decision
    }

    pub fn evaluate(&self, snapshot: &AccessSnapshot) -> Evaluation {
        let ctx = RuleContext::new(snapshot);

        for rule in Rule::ORDER {
            let Some(decision) = self.apply(rule, &ctx) else {
                continue;
            };
            let decision = match decision {
                Decision::Redirect(r) if r.target == ctx.path => Decision::Allow,
                other => other,
            };
            return Evaluation { decision, rule };
        }

        Evaluation {
            decision: Decision::Allow,
            rule: Rule::Default,
        }
    }

    fn apply(&self, rule: Rule, ctx: &RuleContext<'_>) -> Option<Decision> {
        match rule {
            Rule::AuthInit => auth_init(ctx),
            Rule::Authentication => authentication(ctx),
            Rule::ImpersonationTarget => impersonation_target(ctx),
            Rule::TenantLoaded => tenant_loaded(ctx),
            Rule::SuperAdminConsole => super_admin_console(ctx),
            Rule::Membership => membership(ctx),
            Rule::Subscription => subscription(ctx),
            Rule::BusinessTypePartition => self.business_type_partition(ctx),
            Rule::RoleGate => self.role_gate(ctx),
            Rule::CashierScope => self.cashier_scope(ctx),
            Rule::Entitlement => self.entitlement(ctx),
            Rule::Default => None,
        }
    }

    fn business_type_partition(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        if ctx.impersonating || ctx.snapshot.route.global || self.config.is_partition_exempt(&ctx.path) {
            return None;
        }
        let business_type = ctx.access()?.tenant.business_type;

        let translated = self.config.translate_legacy(&ctx.path);
        if !path_within(&translated, &self.config.route_prefix(business_type)) {
            return Some(redirect(
                self.config.landing_route(business_type),
                RedirectReason::BusinessTypeMismatch,
            ));
        }
        if translated != ctx.path {
            let target = format!("{translated}{}", query_suffix(&ctx.snapshot.route.path));
            return Some(redirect(target, RedirectReason::LegacyRoute));
        }
        None
    }

    fn role_gate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let access = ctx.access()?;
        match authorize(&access.membership, &ctx.snapshot.route.role_requirement()) {
            Ok(()) => None,
            Err(AuthzError::ManagerRequired) => {
                let fallback = self
                    .config
                    .role_default_route(access.membership.role, access.tenant.business_type);
                // A default route that is itself manager-only must not satisfy the loop guard.
                let target = if fallback == ctx.path {
                    paths::ACCESS_DENIED.to_string()
                } else {
                    fallback
                };
                Some(redirect(target, RedirectReason::AdminOnly))
            }
            Err(AuthzError::RoleRequired(_)) => {
                Some(redirect(paths::ACCESS_DENIED, RedirectReason::RoleRequired))
            }
        }
    }

    fn cashier_scope(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let access = ctx.access()?;
        if access.membership.role != Role::Cashier {
            return None;
        }
        let business_type = access.tenant.business_type;
        if self.config.cashier_may_visit(business_type, &ctx.path) {
            return None;
        }
        Some(redirect(
            self.config.cashier_default_route(business_type),
            RedirectReason::CashierScope,
        ))
    }

    fn entitlement(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let tenant = &ctx.access()?.tenant;
        let route = &ctx.snapshot.route;

        route
            .required_feature_key
            .as_deref()
            .and_then(|key| self.features.upsell_for(tenant, key))
            .or_else(|| {
                route
                    .required_plan
                    .and_then(|plan| self.features.check_plan(tenant, plan))
            })
            .map(Decision::AllowWithUpsell)
    }
}

fn redirect(target: impl Into<String>, reason: RedirectReason) -> Decision {
    Decision::Redirect(Redirect::to(target, reason))
}

fn auth_init(ctx: &RuleContext<'_>) -> Option<Decision> {
    (!ctx.snapshot.identity.initialized).then_some(Decision::Pending(PendingReason::AuthInit))
}

fn authentication(ctx: &RuleContext<'_>) -> Option<Decision> {
    if ctx.snapshot.identity.user_id.is_some() {
        return None;
    }
    Some(Decision::Redirect(
        Redirect::to(paths::AUTH, RedirectReason::Unauthenticated).preserving(ctx.snapshot.route.path.clone()),
    ))
}

fn impersonation_target(ctx: &RuleContext<'_>) -> Option<Decision> {
    if !ctx.impersonating {
        return None;
    }
    match ctx.effective {
        Loadable::Loading => Some(Decision::Pending(PendingReason::ImpersonationLoading)),
        Loadable::Failed(_) => Some(redirect(
            paths::ACCESS_DENIED,
            RedirectReason::ImpersonationTargetUnavailable,
        )),
        Loadable::Ready(_) => None,
    }
}

fn tenant_loaded(ctx: &RuleContext<'_>) -> Option<Decision> {
    let own_loading = !ctx.impersonating && ctx.effective.is_loading();
    if own_loading || ctx.snapshot.super_admin == SuperAdminStatus::Unknown {
        return Some(Decision::Pending(PendingReason::TenantLoading));
    }
    None
}

fn super_admin_console(ctx: &RuleContext<'_>) -> Option<Decision> {
    if ctx.impersonating || !ctx.snapshot.super_admin.is_granted() {
        return None;
    }
    Some(redirect(paths::ADMIN, RedirectReason::SuperAdminConsole))
}

fn membership(ctx: &RuleContext<'_>) -> Option<Decision> {
    if ctx.access().is_some() {
        return None;
    }
    if ctx.snapshot.identity.signing_out {
        return Some(Decision::Pending(PendingReason::SigningOut));
    }
    if ctx.impersonating {
        // An impersonated target is never sent to onboarding.
        return Some(Decision::Pending(PendingReason::TenantLoading));
    }
    match ctx.effective {
        Loadable::Failed(_) => Some(redirect(paths::ACCESS_DENIED, RedirectReason::TenantLookupFailed)),
        _ => Some(redirect(paths::ONBOARDING, RedirectReason::Onboarding)),
    }
}

fn subscription(ctx: &RuleContext<'_>) -> Option<Decision> {
    if ctx.impersonating {
        return None;
    }
    let tenant = &ctx.access()?.tenant;
    let verdict = SubscriptionGate::evaluate(tenant, ctx.snapshot.now, ctx.snapshot.connectivity);
    match verdict.reason_if_blocked? {
        BlockReason::Suspended => Some(redirect(paths::ACCOUNT_SUSPENDED, RedirectReason::AccountSuspended)),
        BlockReason::SubscriptionRequired => Some(redirect(
            paths::SUBSCRIPTION_REQUIRED,
            RedirectReason::SubscriptionRequired,
        )),
    }
}
