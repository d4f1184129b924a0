//! Audit emission seam (mechanics only).
//!
//! Sinks decide transport and persistence — a log stream here, a table or a
//! queue in a real deployment. The contract is deliberately small:
//!
//! - **Fire-and-forget**: callers log a failed emit and move on. A broken
//!   audit pipeline must never fail the action being audited.
//! - **No ordering guarantees** across concurrent producers.
//! - **Cheap**: `emit` runs on every request, inside the request path.

use std::sync::Arc;

use thiserror::Error;

use crate::event::{AuditEvent, Severity};

/// Failure to hand a record to a sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("audit emit failed: {0}")]
pub struct EmitError(pub String);

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent) -> Result<(), EmitError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn emit(&self, event: AuditEvent) -> Result<(), EmitError> {
        (**self).emit(event)
    }
}

/// Sink that writes records to the process log via `tracing`.
///
/// Severity maps onto log level, so filters built for operational logs work
/// on audit output unchanged.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) -> Result<(), EmitError> {
        let record = serde_json::to_string(&event).map_err(|e| EmitError(e.to_string()))?;
        match event.severity {
            Severity::Low | Severity::Medium => {
                tracing::info!(target: "campusgate::audit", %record, "audit");
            }
            Severity::High => {
                tracing::warn!(target: "campusgate::audit", %record, "audit");
            }
            Severity::Critical => {
                tracing::error!(target: "campusgate::audit", %record, "audit");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActionCategory, AuditOutcome};

    #[test]
    fn tracing_sink_accepts_any_record() {
        let sink = TracingAuditSink::new();
        let event = AuditEvent::new(
            ActionCategory::Authorization,
            AuditOutcome::Failure,
            Severity::Critical,
            "cross-tenant access attempt",
        );

        assert!(sink.emit(event).is_ok());
    }
}
