use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Notify;

use posgate_auth::{
    ImpersonationHolder, InMemoryImpersonationStore, InMemorySuperAdminRegistry, RegistryError, Role,
    SessionIdentity, SuperAdminRegistry, SuperAdminResolver, SuperAdminStatus, TenantMembership,
};
use posgate_core::{TenantId, UserId};
use posgate_events::{AuditEvent, AuditKind, AuditOutcome, BusAuditSink, EventBus, InMemoryEventBus, Subscription};
use posgate_guard::{AccessContext, AdminConsoleGate, ConsoleOutcome, GuardError, GuardOutcome, RouteGuard};
use posgate_policy::{AccessPolicyEngine, PendingReason, RouteRequest};
use posgate_tenancy::{
    ConnectivityMonitor, DirectoryError, InMemoryTenantDirectory, PlanTier, TenantDirectory, TenantRecord,
    TenantResolver, TenantStatus,
};

struct Harness {
    session: Arc<SessionIdentity>,
    directory: Arc<InMemoryTenantDirectory>,
    registry: Arc<InMemorySuperAdminRegistry>,
    connectivity: Arc<ConnectivityMonitor>,
    context: Arc<AccessContext>,
    guard: RouteGuard,
    audit: Subscription<AuditEvent>,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(InMemorySuperAdminRegistry::new());
        Self::with_registry(registry.clone(), registry)
    }

    fn with_registry(registry: Arc<InMemorySuperAdminRegistry>, lookups: Arc<dyn SuperAdminRegistry>) -> Self {
        Self::with_sources(registry, lookups, |directory| directory as Arc<dyn TenantDirectory>)
    }

    /// `wrap` decides what the resolver reads through; seeding still goes to
    /// the in-memory directory.
    fn with_sources(
        registry: Arc<InMemorySuperAdminRegistry>,
        lookups: Arc<dyn SuperAdminRegistry>,
        wrap: impl FnOnce(Arc<InMemoryTenantDirectory>) -> Arc<dyn TenantDirectory>,
    ) -> Self {
        posgate_observability::init();
        let session = Arc::new(SessionIdentity::new());
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let connectivity = Arc::new(ConnectivityMonitor::new());

        let bus = Arc::new(InMemoryEventBus::new());
        let audit = bus.subscribe();
        let holder = ImpersonationHolder::restore(
            Arc::new(InMemoryImpersonationStore::new()),
            Arc::new(BusAuditSink::new(bus)),
        );

        let context = Arc::new(AccessContext::new(
            session.clone(),
            Arc::new(TenantResolver::new(wrap(directory.clone()))),
            Arc::new(SuperAdminResolver::new(lookups)),
            Arc::new(holder),
            connectivity.clone(),
        ));
        let guard = RouteGuard::new(context.clone(), AccessPolicyEngine::default());

        Self {
            session,
            directory,
            registry,
            connectivity,
            context,
            guard,
            audit,
        }
    }

    fn tenant(&self, business_type: &str, status: TenantStatus, plan: PlanTier) -> TenantId {
        let id = TenantId::new();
        self.directory.put_tenant(TenantRecord {
            id,
            name: format!("{business_type} shop"),
            business_type: Some(business_type.to_string()),
            status,
            trial_end_at: (status == TenantStatus::Trial).then(|| Utc::now() + Duration::days(7)),
            plan_tier: plan,
        });
        id
    }

    fn member(&self, tenant_id: TenantId, role: Role) -> UserId {
        let user = UserId::new();
        self.directory.put_membership(user, TenantMembership::new(tenant_id, role));
        user
    }
}

fn navigate(to: &str) -> GuardOutcome {
    GuardOutcome::Navigate {
        to: to.to_string(),
        origin: None,
    }
}

#[tokio::test]
async fn bootstrap_to_render() {
    let h = Harness::new();
    let tenant = h.tenant("retail", TenantStatus::Active, PlanTier::Pro);
    let owner = h.member(tenant, Role::Owner);
    let route = RouteRequest::new("/retail/dashboard");

    assert_eq!(
        h.guard.check(&route, Utc::now()),
        GuardOutcome::ShowLoading(PendingReason::AuthInit)
    );

    h.session.complete_bootstrap(None);
    assert_eq!(
        h.guard.check(&route, Utc::now()),
        GuardOutcome::Navigate {
            to: "/auth".to_string(),
            origin: Some("/retail/dashboard".to_string()),
        }
    );

    h.session.sign_in(owner);
    assert_eq!(
        h.guard.check(&route, Utc::now()),
        GuardOutcome::ShowLoading(PendingReason::TenantLoading)
    );
    assert_eq!(h.guard.resolve(&route, Utc::now()).await, GuardOutcome::Render);
}

#[tokio::test]
async fn legacy_route_for_fnb_owner() {
    let h = Harness::new();
    let tenant = h.tenant("fnb", TenantStatus::Active, PlanTier::Basic);
    h.session.sign_in(h.member(tenant, Role::Owner));

    let outcome = h.guard.resolve(&RouteRequest::new("/pos"), Utc::now()).await;
    assert_eq!(outcome, navigate("/fnb/dashboard"));
}

#[tokio::test]
async fn upsell_renders_in_place() {
    let h = Harness::new();
    let tenant = h.tenant("retail", TenantStatus::Active, PlanTier::Basic);
    h.session.sign_in(h.member(tenant, Role::Admin));

    let route = RouteRequest::new("/retail/reports").require_feature("reports_advanced");
    match h.guard.resolve(&route, Utc::now()).await {
        GuardOutcome::RenderUpsell(payload) => assert_eq!(payload.required_plan, PlanTier::Pro),
        other => panic!("expected upsell, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_business_type_routes_as_retail() {
    let h = Harness::new();
    let tenant = h.tenant("bakery", TenantStatus::Active, PlanTier::Basic);
    h.session.sign_in(h.member(tenant, Role::Cashier));

    let outcome = h.guard.resolve(&RouteRequest::new("/settings"), Utc::now()).await;
    assert_eq!(outcome, navigate("/retail/pos"));
}

#[tokio::test]
async fn offline_trusts_cached_tenant_until_reconnect() {
    let h = Harness::new();
    let tenant = h.tenant("service", TenantStatus::Expired, PlanTier::Basic);
    h.session.sign_in(h.member(tenant, Role::Owner));
    let route = RouteRequest::new("/service/dashboard");

    h.connectivity.set_offline();
    assert_eq!(h.guard.resolve(&route, Utc::now()).await, GuardOutcome::Render);

    h.connectivity.set_online();
    assert_eq!(h.guard.check(&route, Utc::now()), navigate("/subscription-required"));
}

#[tokio::test]
async fn missing_membership_onboards_and_onboarding_renders() {
    let h = Harness::new();
    h.session.sign_in(UserId::new());

    let outcome = h.guard.resolve(&RouteRequest::new("/retail/dashboard"), Utc::now()).await;
    assert_eq!(outcome, navigate("/onboarding"));
    assert_eq!(
        h.guard.check(&RouteRequest::new("/onboarding"), Utc::now()),
        GuardOutcome::Render
    );
}

#[tokio::test]
async fn super_admin_impersonation_lifecycle() {
    let h = Harness::new();
    let admin = UserId::new();
    h.registry.grant(admin);
    h.session.sign_in(admin);

    let target_tenant = h.tenant("fnb", TenantStatus::Suspended, PlanTier::Basic);
    let target_user = h.member(target_tenant, Role::Cashier);
    let menu = RouteRequest::new("/fnb/menu");

    assert_eq!(h.guard.resolve(&menu, Utc::now()).await, navigate("/admin"));

    h.context
        .start_impersonation(target_tenant, target_user, "Noodle Bar")
        .unwrap();
    assert_eq!(
        h.guard.check(&menu, Utc::now()),
        GuardOutcome::ShowLoading(PendingReason::ImpersonationLoading)
    );

    // Suspended target still renders; the cashier role still applies.
    assert_eq!(h.guard.resolve(&menu, Utc::now()).await, GuardOutcome::Render);
    assert_eq!(
        h.guard.check(&RouteRequest::new("/fnb/reports"), Utc::now()),
        navigate("/fnb/pos")
    );

    h.context.exit_impersonation();
    h.context.exit_impersonation();
    assert_eq!(h.guard.check(&menu, Utc::now()), navigate("/admin"));

    let kinds: Vec<_> = h.audit.drain().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![AuditKind::ImpersonationStarted, AuditKind::ImpersonationEnded]);
}

#[tokio::test]
async fn impersonation_requires_confirmed_super_admin() {
    let h = Harness::new();
    let user = UserId::new();
    h.session.sign_in(user);

    let err = h
        .context
        .start_impersonation(TenantId::new(), UserId::new(), "Shop")
        .unwrap_err();
    assert!(matches!(err, GuardError::NotSuperAdmin(SuperAdminStatus::Unknown)));

    h.context.refresh().await;
    let err = h
        .context
        .start_impersonation(TenantId::new(), UserId::new(), "Shop")
        .unwrap_err();
    assert!(matches!(err, GuardError::NotSuperAdmin(SuperAdminStatus::Denied)));
    assert!(!h.context.impersonation().is_active());
}

#[tokio::test]
async fn actor_sign_out_ends_impersonation_and_clears_caches() {
    let h = Harness::new();
    let changes = h.session.subscribe();
    let admin = UserId::new();
    h.registry.grant(admin);
    h.session.sign_in(admin);
    h.context.refresh().await;

    let tenant = h.tenant("venue", TenantStatus::Active, PlanTier::Pro);
    let target = h.member(tenant, Role::Admin);
    h.context.start_impersonation(tenant, target, "Hall").unwrap();
    h.context.refresh().await;

    h.session.begin_sign_out();
    h.session.sign_out();
    assert_eq!(h.context.sync_auth_changes(&changes), 3);

    assert!(!h.context.impersonation().is_active());
    assert_eq!(h.context.super_admin_status(), SuperAdminStatus::Unknown);

    // Signing back in starts from scratch.
    h.session.sign_in(admin);
    assert_eq!(
        h.guard.check(&RouteRequest::new("/venue/dashboard"), Utc::now()),
        GuardOutcome::ShowLoading(PendingReason::TenantLoading)
    );
}

#[tokio::test]
async fn console_gate_fails_closed() {
    struct DownRegistry;

    #[async_trait]
    impl SuperAdminRegistry for DownRegistry {
        async fn is_super_admin(&self, _user_id: UserId) -> Result<bool, RegistryError> {
            Err(RegistryError::Unavailable("timeout".to_string()))
        }
    }

    let h = Harness::with_registry(Arc::new(InMemorySuperAdminRegistry::new()), Arc::new(DownRegistry));
    let bus = Arc::new(InMemoryEventBus::new());
    let console_audit = bus.subscribe();
    let gate = AdminConsoleGate::new(Arc::new(BusAuditSink::new(bus)));

    h.session.sign_in(UserId::new());
    assert_eq!(gate.check_context(&h.context, "/admin"), ConsoleOutcome::Loading);

    h.context.refresh().await;
    assert_eq!(h.context.super_admin_status(), SuperAdminStatus::LookupFailed);
    assert_eq!(gate.check_context(&h.context, "/admin"), ConsoleOutcome::Denied);
    assert_eq!(gate.check_context(&h.context, "/admin"), ConsoleOutcome::Denied);

    let events = console_audit.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, AuditOutcome::CheckFailed);

    // The tenant guard never sends this user to the console either.
    let outcome = h.guard.resolve(&RouteRequest::new("/retail/dashboard"), Utc::now()).await;
    assert_eq!(outcome, navigate("/onboarding"));
}

/// Registry that answers only when released.
struct GatedRegistry {
    release: Notify,
}

#[async_trait]
impl SuperAdminRegistry for GatedRegistry {
    async fn is_super_admin(&self, _user_id: UserId) -> Result<bool, RegistryError> {
        self.release.notified().await;
        Ok(true)
    }
}

#[tokio::test]
async fn lookup_finishing_after_sign_out_is_discarded() {
    let gated = Arc::new(GatedRegistry { release: Notify::new() });
    let h = Harness::with_registry(Arc::new(InMemorySuperAdminRegistry::new()), gated.clone());
    let user = UserId::new();
    h.session.sign_in(user);

    let sign_out = async {
        h.session.sign_out();
        h.context.handle_auth_change(posgate_auth::AuthChange::SignedOut(user));
        gated.release.notify_one();
    };
    tokio::join!(h.context.refresh(), sign_out);

    h.session.sign_in(user);
    assert_eq!(h.context.super_admin_status(), SuperAdminStatus::Unknown);
}

/// Registry that fails its first lookup and answers "granted" afterwards.
#[derive(Default)]
struct BlipRegistry {
    calls: AtomicUsize,
}

#[async_trait]
impl SuperAdminRegistry for BlipRegistry {
    async fn is_super_admin(&self, _user_id: UserId) -> Result<bool, RegistryError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(RegistryError::Unavailable("connection reset".to_string()));
        }
        Ok(true)
    }
}

#[tokio::test]
async fn super_admin_recovers_after_registry_blip() {
    let h = Harness::with_registry(Arc::new(InMemorySuperAdminRegistry::new()), Arc::new(BlipRegistry::default()));
    h.session.sign_in(UserId::new());
    let dashboard = RouteRequest::new("/retail/dashboard");

    h.context.refresh().await;
    assert_eq!(h.context.super_admin_status(), SuperAdminStatus::LookupFailed);
    assert!(h.context.has_failed_lookup());
    assert_eq!(h.guard.check(&dashboard, Utc::now()), navigate("/onboarding"));

    h.context.refresh().await;
    assert_eq!(h.context.super_admin_status(), SuperAdminStatus::Granted);
    assert!(!h.context.has_failed_lookup());
    assert_eq!(h.guard.check(&dashboard, Utc::now()), navigate("/admin"));
}

#[tokio::test]
async fn resolve_retries_failed_registry_lookup() {
    let h = Harness::with_registry(Arc::new(InMemorySuperAdminRegistry::new()), Arc::new(BlipRegistry::default()));
    h.session.sign_in(UserId::new());
    let dashboard = RouteRequest::new("/retail/dashboard");

    assert_eq!(h.guard.resolve(&dashboard, Utc::now()).await, navigate("/onboarding"));
    assert_eq!(h.guard.resolve(&dashboard, Utc::now()).await, navigate("/admin"));
}

/// Directory that fails while `down` is set.
struct FlakyDirectory {
    inner: Arc<InMemoryTenantDirectory>,
    down: Arc<AtomicBool>,
}

#[async_trait]
impl TenantDirectory for FlakyDirectory {
    async fn get_membership(&self, user_id: UserId) -> Result<Option<TenantMembership>, DirectoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("connection reset".to_string()));
        }
        self.inner.get_membership(user_id).await
    }

    async fn get_tenant(&self, tenant_id: TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        self.inner.get_tenant(tenant_id).await
    }
}

#[tokio::test]
async fn tenant_user_recovers_after_directory_blip() {
    let registry = Arc::new(InMemorySuperAdminRegistry::new());
    let down = Arc::new(AtomicBool::new(true));
    let flag = down.clone();
    let h = Harness::with_sources(registry.clone(), registry, move |inner| {
        Arc::new(FlakyDirectory { inner, down: flag }) as Arc<dyn TenantDirectory>
    });
    let tenant = h.tenant("fnb", TenantStatus::Active, PlanTier::Basic);
    h.session.sign_in(h.member(tenant, Role::Owner));
    let menu = RouteRequest::new("/fnb/menu");

    assert_eq!(h.guard.resolve(&menu, Utc::now()).await, navigate("/access-denied"));

    // Still failing: the answer stays a denial.
    assert_eq!(h.guard.resolve(&menu, Utc::now()).await, navigate("/access-denied"));

    down.store(false, Ordering::SeqCst);
    assert_eq!(h.guard.resolve(&menu, Utc::now()).await, GuardOutcome::Render);
}
