//! Tenants, their billing state and plan entitlements.
//!
//! Pure evaluation (`SubscriptionGate`, `FeatureCatalog`) lives beside the
//! async `TenantResolver` that loads tenants from the external directory.

pub mod connectivity;
pub mod entitlement;
pub mod resolver;
pub mod subscription;
pub mod tenant;

pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivityProbe};
pub use entitlement::{Entitlement, FeatureCatalog, FeatureGate, UpsellPayload};
pub use resolver::{
    DirectoryError, InMemoryTenantDirectory, TenantAccess, TenantDirectory, TenantResolution, TenantResolver,
};
pub use subscription::{BlockReason, SubscriptionGate, SubscriptionVerdict};
pub use tenant::{BusinessType, PlanTier, Tenant, TenantRecord, TenantStatus};
