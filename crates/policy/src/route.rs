use serde::{Deserialize, Serialize};

use posgate_auth::{Role, RoleRequirement};
use posgate_tenancy::PlanTier;

/// Descriptor of the view being navigated to. Immutable per navigation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteRequest {
    pub path: String,
    pub required_role: Option<Role>,
    pub admin_only: bool,
    pub required_feature_key: Option<String>,
    pub required_plan: Option<PlanTier>,
    /// Route metadata tag: exempt from business-type partitioning.
    pub global: bool,
}

impl RouteRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn require_feature(mut self, feature_key: impl Into<String>) -> Self {
        self.required_feature_key = Some(feature_key.into());
        self
    }

    pub fn require_plan(mut self, plan: PlanTier) -> Self {
        self.required_plan = Some(plan);
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn role_requirement(&self) -> RoleRequirement {
        RoleRequirement {
            admin_only: self.admin_only,
            required_role: self.required_role,
        }
    }
}
