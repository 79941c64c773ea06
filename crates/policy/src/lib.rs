//! Access decision for one navigation.
//!
//! [`AccessPolicyEngine::decide`] is a pure function of an [`AccessSnapshot`]:
//! no I/O, no clock reads, no logging. Callers gather the snapshot (see
//! `posgate-guard`) and act on the returned [`Decision`].

pub mod config;
pub mod decision;
pub mod engine;
pub mod route;
pub mod snapshot;

pub use config::{
    GLOBAL_ROUTES_ENV, PUBLIC_ORDER_PREFIXES_ENV, PolicyConfig, normalize_path, path_within, paths, query_suffix,
};
pub use decision::{Decision, PendingReason, Redirect, RedirectReason};
pub use engine::{AccessPolicyEngine, Evaluation, Rule};
pub use route::RouteRequest;
pub use snapshot::{AccessSnapshot, ImpersonationView};
