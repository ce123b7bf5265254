//! Telemetry Module for the analytics injection filter
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use log::{info, warn};
use serde::Serialize;

/// Audit event types
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Snippet injected into the response body
    SnippetInjected,
    /// HTML response forwarded unmodified (no marker in the body)
    ResponseUntouched,
    /// Response not rewritten at all (non-HTML, rewrite disabled)
    ResponseSkipped,
}

/// Audit event for logging
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event type
    pub event_type: AuditEventType,
    /// Per-request context ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<u32>,
    /// Host the client requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Analytics provider in play
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Body bytes received from upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_in: Option<usize>,
    /// Body bytes forwarded downstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_out: Option<usize>,
    /// Reason for skipping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            context_id: None,
            host: None,
            provider: None,
            bytes_in: None,
            bytes_out: None,
            reason: None,
        }
    }

    /// Set the request context ID
    pub fn with_context_id(mut self, id: u32) -> Self {
        self.context_id = Some(id);
        self
    }

    /// Set the requested host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = Some(provider.to_string());
        self
    }

    /// Set body byte counters
    pub fn with_bytes(mut self, bytes_in: usize, bytes_out: usize) -> Self {
        self.bytes_in = Some(bytes_in);
        self.bytes_out = Some(bytes_out);
        self
    }

    /// Set the skip reason
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => info!("[ANALYTICS-AUDIT] {}", json),
            Err(e) => warn!("Failed to serialize audit event: {}", e),
        }
    }
}

/// Create an injection audit event
pub fn audit_injected() -> AuditEvent {
    AuditEvent::new(AuditEventType::SnippetInjected)
}

/// Create an audit event for an HTML body with no marker
pub fn audit_untouched() -> AuditEvent {
    AuditEvent::new(AuditEventType::ResponseUntouched)
}

/// Create an audit event for a response that was never rewritten
pub fn audit_skipped(reason: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::ResponseSkipped).with_reason(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = audit_injected()
            .with_context_id(7)
            .with_host("example.com")
            .with_provider("plausible")
            .with_bytes(1024, 1120);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("snippet_injected"));
        assert!(json.contains("example.com"));
        assert!(json.contains("1120"));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let event = audit_untouched();
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("reason"));
        assert!(!json.contains("host"));
    }

    #[test]
    fn test_audit_skipped() {
        let event = audit_skipped("non-html content-type");
        assert_eq!(event.reason.as_deref(), Some("non-html content-type"));
    }
}
