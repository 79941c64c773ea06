//! Subscription (billing) gate.
//!
//! Trial expiry is always recomputed from `trial_end_at` against the `now`
//! passed in; no cached "expired" flag is consulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connectivity::Connectivity;
use crate::tenant::{Tenant, TenantStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Suspended,
    SubscriptionRequired,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Suspended => "suspended",
            BlockReason::SubscriptionRequired => "subscription_required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionVerdict {
    pub usable: bool,
    pub reason_if_blocked: Option<BlockReason>,
}

impl SubscriptionVerdict {
    fn usable() -> Self {
        Self {
            usable: true,
            reason_if_blocked: None,
        }
    }

    fn blocked(reason: BlockReason) -> Self {
        Self {
            usable: false,
            reason_if_blocked: Some(reason),
        }
    }
}

/// Decides whether a tenant's subscription currently permits use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionGate;

impl SubscriptionGate {
    /// Evaluate billing state.
    ///
    /// Offline, the last-known tenant data is trusted and the tenant is
    /// usable: availability wins over consistency for billing only.
    pub fn evaluate(tenant: &Tenant, now: DateTime<Utc>, connectivity: Connectivity) -> SubscriptionVerdict {
        if connectivity == Connectivity::Offline {
            return SubscriptionVerdict::usable();
        }

        match tenant.status {
            TenantStatus::Suspended => SubscriptionVerdict::blocked(BlockReason::Suspended),
            TenantStatus::Expired => SubscriptionVerdict::blocked(BlockReason::SubscriptionRequired),
            TenantStatus::Trial if trial_over(tenant, now) => {
                SubscriptionVerdict::blocked(BlockReason::SubscriptionRequired)
            }
            TenantStatus::Trial | TenantStatus::Active => SubscriptionVerdict::usable(),
        }
    }

    /// Effective billing status at `now`: a trial past its end reads as expired.
    pub fn billing_status(tenant: &Tenant, now: DateTime<Utc>) -> TenantStatus {
        match tenant.status {
            TenantStatus::Trial if trial_over(tenant, now) => TenantStatus::Expired,
            status => status,
        }
    }

    /// Whole days left in a running trial (rounded up, never negative).
    pub fn trial_days_remaining(tenant: &Tenant, now: DateTime<Utc>) -> Option<i64> {
        if tenant.status != TenantStatus::Trial {
            return None;
        }
        let end = tenant.trial_end_at?;
        let remaining = end.signed_duration_since(now);
        if remaining <= chrono::Duration::zero() {
            return Some(0);
        }
        let secs = remaining.num_seconds();
        Some((secs + 86_399) / 86_400)
    }
}

// A trial without an end date cannot be shown to be running; it fails closed.
fn trial_over(tenant: &Tenant, now: DateTime<Utc>) -> bool {
    tenant.trial_end_at.is_none_or(|end| now > end)
}
