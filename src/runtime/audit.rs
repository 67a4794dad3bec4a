//! Session lifecycle audit.
//!
//! Records carry a stage plus structured details so callers can log, buffer
//! or assert on a session's progression without touching the render loop.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde_json::Value;

/// Lifecycle checkpoints emitted by [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAuditStage {
    /// Input lock acquired and the session is live.
    SessionOpened,
    /// A build produced a tree that was serialized.
    RenderCommitted,
    /// A payload was handed to the form surface.
    FormShown,
    /// The host reported a form response.
    ResponseReceived,
    BoundaryResolved,
    BoundaryTimedOut,
    /// Fibers deleted and the input lock released.
    SessionClosed,
}

impl SessionAuditStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionOpened => "session_opened",
            Self::RenderCommitted => "render_committed",
            Self::FormShown => "form_shown",
            Self::ResponseReceived => "response_received",
            Self::BoundaryResolved => "boundary_resolved",
            Self::BoundaryTimedOut => "boundary_timed_out",
            Self::SessionClosed => "session_closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionAuditEvent {
    pub timestamp: SystemTime,
    pub stage: SessionAuditStage,
    pub details: Vec<(String, Value)>,
}

impl SessionAuditEvent {
    fn new(stage: SessionAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

pub struct SessionAuditEventBuilder {
    event: SessionAuditEvent,
}

impl SessionAuditEventBuilder {
    pub fn new(stage: SessionAuditStage) -> Self {
        Self {
            event: SessionAuditEvent::new(stage),
        }
    }

    pub fn detail(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> SessionAuditEvent {
        self.event
    }
}

pub trait SessionAudit: Send + Sync {
    fn record(&self, event: SessionAuditEvent);
}

#[derive(Debug, Default)]
pub struct NullSessionAudit;

impl SessionAudit for NullSessionAudit {
    fn record(&self, _event: SessionAuditEvent) {}
}

/// Keeps every record in memory. Clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferedAudit {
    events: Arc<Mutex<Vec<SessionAuditEvent>>>,
}

impl BufferedAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionAuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<SessionAuditStage> {
        self.events().into_iter().map(|event| event.stage).collect()
    }
}

impl SessionAudit for BufferedAudit {
    fn record(&self, event: SessionAuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffered_audit_shares_records_across_clones() {
        let audit = BufferedAudit::new();
        let handle = audit.clone();
        let mut builder = SessionAuditEventBuilder::new(SessionAuditStage::FormShown);
        builder.detail("bytes", json!(326));
        handle.record(builder.finish());

        let events = audit.events();
        assert_eq!(audit.stages(), vec![SessionAuditStage::FormShown]);
        assert_eq!(events[0].detail("bytes"), Some(&json!(326)));
    }
}
