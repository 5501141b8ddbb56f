//! Telemetry and audit logging.
//!
//! Everything that crosses the privilege boundary leaves a trace: elevation
//! attempts, dispatched calls, rejected requests, shutdown. Events are
//! structured JSON written to syslog under the `SUDO_PROXY` tag for SIEM
//! integration, completely separate from the `tracing` debug logs.
//!
//! # Usage
//!
//! ```ignore
//! use sudo_proxy::telemetry::{self, AuditEvent};
//!
//! // Initialize once at startup. Without it, events are silently
//! // discarded rather than panicking - this is a library, not an app.
//! telemetry::init_logger()?;
//!
//! telemetry::audit().log(AuditEvent::ElevationRequested {
//!     target: "acme-updater".to_string(),
//!     pid: std::process::id(),
//! });
//! ```
//!
//! # Event Format
//!
//! Events are logged as JSON with an ISO8601 timestamp:
//!
//! ```json
//! {"ts":"2026-03-12T09:14:55Z","event":"call_completed","id":"...","method":"install_version","outcome":"ok","duration_ms":84}
//! ```

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, CallOutcome, RejectReason};
pub use syslog::{AuditLogger, SYSLOG_TAG, audit, init_logger, try_audit};
