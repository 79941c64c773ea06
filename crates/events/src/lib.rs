//! Event plumbing: a small pub/sub bus and the audit trail built on it.

pub mod audit;
pub mod bus;
pub mod in_memory_bus;

pub use audit::{AuditEvent, AuditKind, AuditOutcome, AuditSink, BusAuditSink, TracingAuditSink};
pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
