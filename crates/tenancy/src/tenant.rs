//! Tenant (business account) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use posgate_core::{DomainError, DomainResult, TenantId};

/// Vertical a tenant operates in; decides its route prefix and landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    Retail,
    Fnb,
    Service,
    Venue,
}

impl BusinessType {
    pub const ALL: [BusinessType; 4] = [
        BusinessType::Retail,
        BusinessType::Fnb,
        BusinessType::Service,
        BusinessType::Venue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::Retail => "retail",
            BusinessType::Fnb => "fnb",
            BusinessType::Service => "service",
            BusinessType::Venue => "venue",
        }
    }

    /// Parse a stored value. Returns `None` for missing or unrecognized input.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw?.trim().to_ascii_lowercase().as_str() {
            "retail" => Some(BusinessType::Retail),
            "fnb" | "f&b" | "food_and_beverage" => Some(BusinessType::Fnb),
            "service" => Some(BusinessType::Service),
            "venue" => Some(BusinessType::Venue),
            _ => None,
        }
    }
}

impl core::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing status as recorded by the billing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Trial,
    Active,
    Expired,
    Suspended,
}

/// Subscription plan; totally ordered `basic < pro < enterprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl core::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant as stored by the external data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: TenantId,
    pub name: String,
    pub business_type: Option<String>,
    pub status: TenantStatus,
    pub trial_end_at: Option<DateTime<Utc>>,
    pub plan_tier: PlanTier,
}

/// Validated tenant.
///
/// # Invariants
/// - `status = Trial` carries a `trial_end_at`.
/// - `Suspended` is left only through [`Tenant::unsuspend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub business_type: BusinessType,
    pub status: TenantStatus,
    pub trial_end_at: Option<DateTime<Utc>>,
    pub plan_tier: PlanTier,
    /// The stored business type was missing or malformed and `Retail` was
    /// substituted for routing.
    pub business_type_defaulted: bool,
}

impl Tenant {
    /// An active tenant on `plan_tier`.
    pub fn active(id: TenantId, business_type: BusinessType, plan_tier: PlanTier) -> Self {
        Self {
            id,
            name: String::new(),
            business_type,
            status: TenantStatus::Active,
            trial_end_at: None,
            plan_tier,
            business_type_defaulted: false,
        }
    }

    /// A trialing tenant whose trial ends at `trial_end_at`.
    pub fn trial(
        id: TenantId,
        business_type: BusinessType,
        plan_tier: PlanTier,
        trial_end_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: TenantStatus::Trial,
            trial_end_at: Some(trial_end_at),
            ..Self::active(id, business_type, plan_tier)
        }
    }

    /// Validate a stored record.
    ///
    /// A missing or malformed business type does not fail: `Retail` is used
    /// and the tenant is flagged via `business_type_defaulted`.
    pub fn from_record(record: TenantRecord) -> DomainResult<Self> {
        if record.status == TenantStatus::Trial && record.trial_end_at.is_none() {
            return Err(DomainError::validation(format!(
                "tenant {} is on trial without a trial end",
                record.id
            )));
        }

        let parsed = BusinessType::parse(record.business_type.as_deref());
        if parsed.is_none() {
            tracing::warn!(
                tenant_id = %record.id,
                raw = ?record.business_type,
                "tenant business type missing or malformed; routing as retail"
            );
        }

        Ok(Self {
            id: record.id,
            name: record.name,
            business_type: parsed.unwrap_or(BusinessType::Retail),
            status: record.status,
            trial_end_at: record.trial_end_at,
            plan_tier: record.plan_tier,
            business_type_defaulted: parsed.is_none(),
        })
    }

    /// Apply a billing status change.
    pub fn change_status(&mut self, next: TenantStatus) -> DomainResult<()> {
        if self.status == TenantStatus::Suspended && next != TenantStatus::Suspended {
            return Err(DomainError::invariant(
                "suspended tenant can only be reinstated by an explicit unsuspend",
            ));
        }
        self.set_status(next)
    }

    /// Lift a suspension, moving the tenant to `next`.
    pub fn unsuspend(&mut self, next: TenantStatus) -> DomainResult<()> {
        if self.status != TenantStatus::Suspended {
            return Err(DomainError::invariant("tenant is not suspended"));
        }
        if next == TenantStatus::Suspended {
            return Err(DomainError::validation("unsuspend target cannot be suspended"));
        }
        self.set_status(next)
    }

    /// Set or move the trial end (e.g. trial extension).
    pub fn extend_trial(&mut self, trial_end_at: DateTime<Utc>) {
        self.trial_end_at = Some(trial_end_at);
    }

    fn set_status(&mut self, next: TenantStatus) -> DomainResult<()> {
        if next == TenantStatus::Trial && self.trial_end_at.is_none() {
            return Err(DomainError::validation("trial status requires a trial end"));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(status: TenantStatus, business_type: Option<&str>) -> TenantRecord {
        TenantRecord {
            id: TenantId::new(),
            name: "Harbor Goods".to_string(),
            business_type: business_type.map(str::to_string),
            status,
            trial_end_at: None,
            plan_tier: PlanTier::Basic,
        }
    }

    #[test]
    fn plan_tiers_are_ordered() {
        assert!(PlanTier::Basic < PlanTier::Pro);
        assert!(PlanTier::Pro < PlanTier::Enterprise);
    }

    #[test]
    fn trial_record_without_end_is_rejected() {
        let err = Tenant::from_record(record(TenantStatus::Trial, Some("retail"))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn malformed_business_type_defaults_to_retail_and_is_flagged() {
        let tenant = Tenant::from_record(record(TenantStatus::Active, Some("bakery"))).unwrap();
        assert_eq!(tenant.business_type, BusinessType::Retail);
        assert!(tenant.business_type_defaulted);

        let tenant = Tenant::from_record(record(TenantStatus::Active, None)).unwrap();
        assert!(tenant.business_type_defaulted);
    }

    #[test]
    fn known_business_type_is_not_flagged() {
        let tenant = Tenant::from_record(record(TenantStatus::Active, Some("FnB"))).unwrap();
        assert_eq!(tenant.business_type, BusinessType::Fnb);
        assert!(!tenant.business_type_defaulted);
    }

    #[test]
    fn suspension_is_sticky() {
        let mut tenant = Tenant::active(TenantId::new(), BusinessType::Retail, PlanTier::Pro);
        tenant.change_status(TenantStatus::Suspended).unwrap();

        assert!(tenant.change_status(TenantStatus::Active).is_err());
        assert_eq!(tenant.status, TenantStatus::Suspended);

        tenant.unsuspend(TenantStatus::Active).unwrap();
        assert_eq!(tenant.status, TenantStatus::Active);
    }

    #[test]
    fn unsuspend_requires_suspension() {
        let mut tenant = Tenant::active(TenantId::new(), BusinessType::Venue, PlanTier::Basic);
        assert!(tenant.unsuspend(TenantStatus::Active).is_err());
    }

    #[test]
    fn entering_trial_needs_an_end() {
        let mut tenant = Tenant::active(TenantId::new(), BusinessType::Service, PlanTier::Basic);
        assert!(tenant.change_status(TenantStatus::Trial).is_err());

        tenant.extend_trial(Utc::now() + Duration::days(14));
        assert!(tenant.change_status(TenantStatus::Trial).is_ok());
    }
}
