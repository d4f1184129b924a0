//! In-memory audit sink for tests/dev.

use std::sync::Mutex;

use crate::event::{ActionCategory, AuditEvent};
use crate::sink::{AuditSink, EmitError};

/// Buffering sink that retains every record for inspection.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn by_category(&self, category: ActionCategory) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) -> Result<(), EmitError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| EmitError("sink lock poisoned".to_string()))?;
        events.push(event);
        Ok(())
    }
}
