//! Proxy error types.

use crate::allowlist::{CallFault, InvokeError};
use crate::launcher::LaunchError;
use crate::rpc::ChannelError;
use thiserror::Error;

/// Errors surfaced to the unprivileged caller.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The elevation launcher could not produce a channel.
    #[error("Failed to spawn elevated helper: {0}")]
    Spawn(#[from] LaunchError),

    /// The channel came up but the readiness sentinel was missing or wrong.
    #[error("Elevated helper never signalled readiness: {0}")]
    SpawnFailure(String),

    /// Pre-flight check failed: the method is not in the allowlist.
    #[error("Method '{0}' is not allowed across the privilege boundary")]
    NotAllowed(String),

    /// Pre-flight check failed: wrong number of arguments.
    #[error("Method '{method}' expects {expected} arguments, got {actual}")]
    Arity {
        /// The method being called.
        method: String,
        /// Declared argument count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// The proxy has no live channel; call `start()` first.
    #[error("Proxy is not started")]
    NotStarted,

    /// `start()` was called on an already-active proxy.
    #[error("Proxy is already started")]
    AlreadyStarted,

    /// The privileged method failed; this is its re-raised fault.
    #[error("Remote call failed: {0}")]
    RemoteCall(CallFault),

    /// The channel failed mid-exchange (peer gone, corrupt frame).
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A bounded wait expired. Distinct from [`ProxyError::Channel`]: the
    /// peer may still be alive, just unresponsive.
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// The peer sent something the protocol does not permit here.
    #[error("Unexpected message from elevated helper: {0}")]
    Protocol(String),
}

impl From<InvokeError> for ProxyError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::NotAllowed(method) => ProxyError::NotAllowed(method),
            InvokeError::Arity {
                method,
                expected,
                actual,
            } => ProxyError::Arity {
                method,
                expected,
                actual,
            },
            other => match other.into_call_fault() {
                Ok(fault) => ProxyError::RemoteCall(fault),
                // Violations were matched above.
                Err(violation) => ProxyError::Protocol(violation.to_string()),
            },
        }
    }
}
