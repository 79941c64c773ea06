//! Foundation types shared by every access-resolution crate.
//!
//! This crate has no IO and no async: identifiers, the domain error model, and
//! the loading-state primitives the resolvers build on.

pub mod cache;
pub mod error;
pub mod id;
pub mod loadable;

pub use cache::{ResolutionCache, Ticket};
pub use error::{DomainError, DomainResult};
pub use id::{BranchId, TenantId, UserId};
pub use loadable::Loadable;
