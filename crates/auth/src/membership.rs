use serde::{Deserialize, Serialize};

use posgate_core::{BranchId, TenantId};

use crate::Role;

/// How a user participates in one tenant.
///
/// Outside impersonation a user has at most one membership; its absence means
/// the user has not finished onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

impl TenantMembership {
    pub fn new(tenant_id: TenantId, role: Role) -> Self {
        Self {
            tenant_id,
            role,
            branch_id: None,
        }
    }

    pub fn with_branch(mut self, branch_id: BranchId) -> Self {
        self.branch_id = Some(branch_id);
        self
    }
}
