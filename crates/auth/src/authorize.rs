use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Role, TenantMembership};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: route is restricted to admins and owners")]
    ManagerRequired,

    #[error("forbidden: route requires role '{0}'")]
    RoleRequired(Role),
}

/// Role requirements a route declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    /// Only admins and owners may enter.
    pub admin_only: bool,
    /// Minimum role, ranked `cashier < admin < owner`.
    pub required_role: Option<Role>,
}

/// Check a membership's role against a route's requirements.
///
/// - No IO
/// - No panics
/// - `admin_only` is checked before `required_role`
pub fn authorize(membership: &TenantMembership, required: &RoleRequirement) -> Result<(), AuthzError> {
    if required.admin_only && !membership.role.is_manager() {
        return Err(AuthzError::ManagerRequired);
    }

    match required.required_role {
        Some(role) if !membership.role.satisfies(role) => Err(AuthzError::RoleRequired(role)),
        _ => Ok(()),
    }
}
