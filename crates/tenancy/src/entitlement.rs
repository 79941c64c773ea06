//! Plan-tier feature entitlements.
//!
//! Feature gates are product affordances, not security boundaries: a feature
//! key with no catalog entry is allowed on every plan.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tenant::{PlanTier, Tenant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGate {
    pub required_plan: PlanTier,
    pub upsell_copy: String,
}

/// Result of an entitlement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub allowed: bool,
    pub required_plan: PlanTier,
    pub upsell_copy: Option<String>,
}

/// What the caller renders instead of a gated view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsellPayload {
    /// `None` when the route is gated on a plan rather than a feature.
    pub feature_key: Option<String>,
    pub required_plan: PlanTier,
    pub current_plan: PlanTier,
    pub upsell_copy: String,
}

/// Feature key → minimum plan table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCatalog {
    gates: HashMap<String, FeatureGate>,
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        Self::empty()
            .with_feature("reports_advanced", PlanTier::Pro, "Advanced reports are part of the Pro plan.")
            .with_feature("multi_branch", PlanTier::Pro, "Manage several branches with the Pro plan.")
            .with_feature("loyalty_program", PlanTier::Pro, "Reward repeat customers with the Pro plan.")
            .with_feature("kitchen_display", PlanTier::Pro, "Send orders to the kitchen screen with the Pro plan.")
            .with_feature(
                "inventory_forecasting",
                PlanTier::Enterprise,
                "Demand forecasting is available on the Enterprise plan.",
            )
            .with_feature("api_access", PlanTier::Enterprise, "API access is available on the Enterprise plan.")
            .with_feature("custom_roles", PlanTier::Enterprise, "Custom staff roles need the Enterprise plan.")
    }
}

impl FeatureCatalog {
    pub fn empty() -> Self {
        Self { gates: HashMap::new() }
    }

    pub fn with_feature(
        mut self,
        key: impl Into<String>,
        required_plan: PlanTier,
        upsell_copy: impl Into<String>,
    ) -> Self {
        self.gates.insert(
            key.into(),
            FeatureGate {
                required_plan,
                upsell_copy: upsell_copy.into(),
            },
        );
        self
    }

    pub fn gate(&self, feature_key: &str) -> Option<&FeatureGate> {
        self.gates.get(feature_key)
    }

    pub fn check(&self, tenant: &Tenant, feature_key: &str) -> Entitlement {
        match self.gate(feature_key) {
            Some(gate) => Entitlement {
                allowed: tenant.plan_tier >= gate.required_plan,
                required_plan: gate.required_plan,
                upsell_copy: Some(gate.upsell_copy.clone()),
            },
            None => Entitlement {
                allowed: true,
                required_plan: PlanTier::Basic,
                upsell_copy: None,
            },
        }
    }

    /// Upsell to show when `tenant` may not use `feature_key`.
    pub fn upsell_for(&self, tenant: &Tenant, feature_key: &str) -> Option<UpsellPayload> {
        let entitlement = self.check(tenant, feature_key);
        if entitlement.allowed {
            return None;
        }
        Some(UpsellPayload {
            feature_key: Some(feature_key.to_string()),
            required_plan: entitlement.required_plan,
            current_plan: tenant.plan_tier,
            upsell_copy: entitlement.upsell_copy.unwrap_or_default(),
        })
    }

    /// Upsell to show when `tenant` is below `required_plan`.
    pub fn check_plan(&self, tenant: &Tenant, required_plan: PlanTier) -> Option<UpsellPayload> {
        if tenant.plan_tier >= required_plan {
            return None;
        }
        Some(UpsellPayload {
            feature_key: None,
            required_plan,
            current_plan: tenant.plan_tier,
            upsell_copy: format!("This page is available on the {required_plan} plan."),
        })
    }
}
