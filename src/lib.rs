//! sudo-proxy: privilege-separation RPC for self-updating applications
//!
//! A long-lived, unprivileged application sometimes needs root for a handful
//! of operations (installing a downloaded update, replacing its own binary).
//! Running the whole application elevated is the wrong answer. This crate
//! spawns a second, root-elevated copy of the same executable and forwards a
//! declared, restricted set of method calls to it over a private unix socket:
//!
//! ```text
//! app.install_version("1.2.3")        -->  EPERM: permission denied
//!
//! proxy.start(&launcher).await?;      -->  credential prompt (pkexec/sudo)
//! proxy.call("install_version", &["1.2.3"]).await?;
//!                                     -->  executed as root, result shipped back
//! ```
//!
//! # Security Model
//!
//! The elevated process only ever executes methods that appear in the
//! target's declared [`allowlist::MethodTable`]. Both sides derive their
//! checks from the same table, so the unprivileged pre-flight check and the
//! elevated request-time check cannot diverge. A request for an undeclared
//! method is a protocol violation that terminates the elevated serve loop,
//! not a recoverable call failure.
//!
//! # Architecture
//!
//! - **Allowlist**: explicit method-name to argument-coercion table, built
//!   once at startup; no reflection
//! - **Rpc**: length-prefixed bincode frames over a duplex unix socket,
//!   strict request/response ping-pong
//! - **Proxy**: unprivileged side; forwards calls, re-raises remote faults
//! - **Dispatch**: elevated side; validates, invokes, marshals outcomes
//! - **Launcher**: how the elevated copy is spawned (pkexec/sudo, or
//!   in-process for tests)
//! - **Telemetry**: structured syslog audit trail of everything that crosses
//!   the privilege boundary

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod allowlist;
pub mod config;
pub mod dispatch;
pub mod launcher;
pub mod privilege;
pub mod proxy;
pub mod rpc;
pub mod telemetry;
