use core::str::FromStr;

use serde::{Deserialize, Serialize};

use posgate_core::DomainError;

/// Role a user holds inside one tenant.
///
/// Closed set; ranks are `cashier < admin < owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Cashier,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Cashier, Role::Admin, Role::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "cashier",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Role::Cashier => 0,
            Role::Admin => 1,
            Role::Owner => 2,
        }
    }

    /// Admins and owners manage the tenant; cashiers only sell.
    pub fn is_manager(self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }

    /// Whether this role meets a minimum `required` role.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cashier" => Ok(Role::Cashier),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
