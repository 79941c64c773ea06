//! Who the user is and what they may act as.
//!
//! Identity, tenant roles, super-admin status and impersonation sessions.
//! Decoupled from HTTP and from any concrete user store.

pub mod authorize;
pub mod identity;
pub mod impersonation;
pub mod membership;
pub mod roles;
pub mod super_admin;

pub use authorize::{AuthzError, RoleRequirement, authorize};
pub use identity::{AuthChange, Identity, IdentitySource, SessionIdentity};
pub use impersonation::{
    FileImpersonationStore, ImpersonationError, ImpersonationHolder, ImpersonationSession,
    ImpersonationState, ImpersonationStore, InMemoryImpersonationStore,
};
pub use membership::TenantMembership;
pub use roles::Role;
pub use super_admin::{
    InMemorySuperAdminRegistry, RegistryError, SuperAdminRegistry, SuperAdminResolver, SuperAdminStatus,
};
