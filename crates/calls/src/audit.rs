use tracing::info;

use fixquote_core::audit::{AuditEvent, AuditSink};

/// Production audit sink: every event becomes one structured log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        info!(
            event_name = "audit.event",
            audit_event_id = %event.event_id,
            audit_event_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            actor = %event.actor,
            request_id = event.request_id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
            quote_id = event.quote_id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
            call_id = event.call_id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
            metadata = %metadata,
            "audit event"
        );
    }
}
