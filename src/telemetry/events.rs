//! Audit event types for structured logging.

use crate::allowlist::InvokeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Audit events for security logging.
///
/// Each variant represents something that crossed (or tried to cross) the
/// privilege boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The unprivileged process asked for an elevated helper.
    ElevationRequested {
        /// The target's declared name.
        target: String,
        /// Process ID of the unprivileged side.
        pid: u32,
    },

    /// The elevated helper signalled readiness.
    ElevationReady {
        /// The target's declared name.
        target: String,
    },

    /// Elevation was refused, or the helper never became ready.
    ElevationDenied {
        /// The target's declared name.
        target: String,
        /// Why the handshake failed.
        reason: String,
    },

    /// A declared method was dispatched in the elevated process.
    CallCompleted {
        /// Correlation id for this call.
        id: Uuid,
        /// The method that was invoked.
        method: String,
        /// Whether the method returned or faulted.
        outcome: CallOutcome,
        /// Wall-clock duration of the invocation.
        duration_ms: u64,
    },

    /// A request was refused without invoking anything.
    CallRejected {
        /// The method that was requested.
        method: String,
        /// Why it was refused.
        reason: RejectReason,
    },

    /// The proxy/dispatcher session ended.
    SessionClosed {
        /// The target's declared name.
        target: String,
    },
}

/// How a dispatched call ended.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The method returned a value.
    Ok,
    /// The method raised a fault (marshaled back to the caller).
    Fault,
}

/// Why a request was refused without dispatch.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The method has no allowlist entry.
    NotAllowed,
    /// The argument count contradicts the declared coercion list.
    ArityMismatch,
}

impl From<&InvokeError> for RejectReason {
    fn from(err: &InvokeError) -> Self {
        match err {
            InvokeError::Arity { .. } => RejectReason::ArityMismatch,
            _ => RejectReason::NotAllowed,
        }
    }
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_requested_serialization() {
        let event = AuditEvent::ElevationRequested {
            target: "acme-updater".to_string(),
            pid: 12345,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"elevation_requested\""));
        assert!(json.contains("\"target\":\"acme-updater\""));
        assert!(json.contains("\"pid\":12345"));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn test_call_completed_serialization() {
        let event = AuditEvent::CallCompleted {
            id: Uuid::new_v4(),
            method: "install_version".to_string(),
            outcome: CallOutcome::Ok,
            duration_ms: 84,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"call_completed\""));
        assert!(json.contains("\"method\":\"install_version\""));
        assert!(json.contains("\"outcome\":\"ok\""));
        assert!(json.contains("\"duration_ms\":84"));
    }

    #[test]
    fn test_call_rejected_serialization() {
        let event = AuditEvent::CallRejected {
            method: "_secret".to_string(),
            reason: RejectReason::NotAllowed,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"call_rejected\""));
        assert!(json.contains("\"reason\":\"not_allowed\""));
    }

    #[test]
    fn test_reject_reason_from_invoke_error() {
        let arity = InvokeError::Arity {
            method: "m".to_string(),
            expected: 1,
            actual: 2,
        };
        assert!(matches!(
            RejectReason::from(&arity),
            RejectReason::ArityMismatch
        ));

        let not_allowed = InvokeError::NotAllowed("m".to_string());
        assert!(matches!(
            RejectReason::from(&not_allowed),
            RejectReason::NotAllowed
        ));
    }
}
