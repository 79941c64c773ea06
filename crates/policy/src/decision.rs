//! Outcome of one access evaluation.

use serde::{Deserialize, Serialize};

use posgate_tenancy::UpsellPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingReason {
    AuthInit,
    ImpersonationLoading,
    TenantLoading,
    SigningOut,
}

impl PendingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingReason::AuthInit => "auth-init",
            PendingReason::ImpersonationLoading => "impersonation-loading",
            PendingReason::TenantLoading => "tenant-loading",
            PendingReason::SigningOut => "signing-out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    Unauthenticated,
    ImpersonationTargetUnavailable,
    SuperAdminConsole,
    TenantLookupFailed,
    Onboarding,
    AccountSuspended,
    SubscriptionRequired,
    LegacyRoute,
    BusinessTypeMismatch,
    AdminOnly,
    RoleRequired,
    CashierScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub target: String,
    pub reason: RedirectReason,
    /// Where to return after the redirect target is satisfied (sign-in).
    pub preserve_origin: Option<String>,
}

impl Redirect {
    pub fn to(target: impl Into<String>, reason: RedirectReason) -> Self {
        Self {
            target: target.into(),
            reason,
            preserve_origin: None,
        }
    }

    pub fn preserving(mut self, origin: impl Into<String>) -> Self {
        self.preserve_origin = Some(origin.into());
        self
    }
}

/// Exactly one variant per evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum Decision {
    /// Keep showing a loading indicator; never navigate on this.
    Pending(PendingReason),
    Redirect(Redirect),
    Allow,
    /// Render the upsell view in place of the target.
    AllowWithUpsell(UpsellPayload),
}

impl Decision {
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Decision::Redirect(r) => Some(r),
            _ => None,
        }
    }

    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect().map(|r| r.target.as_str())
    }
}
