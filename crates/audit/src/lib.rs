//! `campusgate-audit` — structured audit trail for authorization decisions.
//!
//! The core emits records at defined points (verification failures, denials,
//! context switches, blocks, admin actions); sinks decide where they land.
//! Emission is best-effort by contract: a failing sink is logged and
//! swallowed, never propagated into the guarded operation.

pub mod event;
pub mod in_memory;
pub mod sink;

pub use event::{ActionCategory, AuditEvent, AuditOutcome, ClientMeta, Severity};
pub use in_memory::InMemoryAuditSink;
pub use sink::{AuditSink, EmitError, TracingAuditSink};
