//! Callers of the access policy engine.
//!
//! [`AccessContext`] gathers the live sources into snapshots, [`RouteGuard`]
//! turns decisions into render-or-navigate outcomes for tenant views, and
//! [`AdminConsoleGate`] guards the super-admin console.

pub mod admin_gate;
pub mod context;
pub mod route_guard;

pub use admin_gate::{AdminConsoleGate, ConsoleOutcome, DEFAULT_AUDIT_DEDUPE_WINDOW};
pub use context::{AccessContext, GuardError};
pub use route_guard::{GuardOutcome, RouteGuard};
