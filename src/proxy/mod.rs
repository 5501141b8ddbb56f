//! The unprivileged side of the privilege boundary.
//!
//! [`SudoProxy`] wraps a target's declared shape (its name and allowlist)
//! plus, once started, a live channel to the elevated dispatcher. Calls are
//! checked locally against the allowlist before a single byte is written,
//! then forwarded as one request/response round-trip.
//!
//! [`Executor`] is the explicit execution context: code that should work
//! identically with and without privilege separation dispatches through it
//! instead of deciding per call site whether to forward.
//!
//! # Lifecycle
//!
//! ```text
//! idle ──start()──> active ──close()──> closed
//!        (READY                (shutdown
//!         handshake)            handshake)
//! ```
//!
//! The proxy is not designed for concurrent callers: every operation takes
//! `&mut self`, which makes the one-call-in-flight rule a compile-time
//! guarantee rather than a convention.
//!
//! The strict alternation also means a session cannot survive a missed
//! response: once a call times out or the helper replies out of protocol,
//! the channel is dropped rather than left with a stale frame in flight.

mod error;

pub use error::ProxyError;

use crate::allowlist::{AllowList, Elevated, MethodTable, Value};
use crate::config::Timeouts;
use crate::launcher::{Launch, ProxyDescriptor};
use crate::rpc::protocol::{Request, Response};
use crate::rpc::{ChannelError, FramedChannel};
use crate::telemetry::{self, AuditEvent};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Proxy to a target's declared methods, executed with root privileges in a
/// separate elevated process.
#[derive(Debug)]
pub struct SudoProxy {
    name: String,
    allowlist: AllowList,
    timeouts: Timeouts,
    channel: Option<FramedChannel>,
}

impl SudoProxy {
    /// Build an idle proxy around a target's declared shape.
    ///
    /// The target instance itself stays on this side of the boundary; only
    /// its name and allowlist are taken.
    pub fn for_target<T: Elevated>(target: &T) -> Self {
        Self {
            name: target.name().to_string(),
            allowlist: T::method_table().allowlist(),
            timeouts: Timeouts::default(),
            channel: None,
        }
    }

    /// Override the default handshake/call/close timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The target's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `start()` has completed and `close()` has not yet run.
    pub fn is_started(&self) -> bool {
        self.channel.is_some()
    }

    /// Obtain a channel from the elevation launcher and wait for the
    /// dispatcher's readiness sentinel.
    ///
    /// On every failure path the partially acquired channel is shut down
    /// before the error propagates, so a refused credential prompt leaves
    /// nothing behind.
    pub async fn start<L: Launch>(&mut self, launcher: &L) -> Result<(), ProxyError> {
        if self.channel.is_some() {
            return Err(ProxyError::AlreadyStarted);
        }

        let descriptor = ProxyDescriptor::new(&self.name);
        telemetry::audit().log(AuditEvent::ElevationRequested {
            target: self.name.clone(),
            pid: std::process::id(),
        });

        let stream = match launcher.spawn_elevated(&descriptor).await {
            Ok(stream) => stream,
            Err(e) => {
                telemetry::audit().log(AuditEvent::ElevationDenied {
                    target: self.name.clone(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };
        let mut channel = FramedChannel::new(stream);

        match timeout(self.timeouts.ready, channel.recv::<Response>()).await {
            Ok(Ok(Response::Ready)) => {
                info!(target_name = %self.name, "elevated helper ready");
                telemetry::audit().log(AuditEvent::ElevationReady {
                    target: self.name.clone(),
                });
                self.channel = Some(channel);
                Ok(())
            }
            Ok(Ok(other)) => {
                channel.shutdown().await;
                let reason = format!("expected readiness sentinel, got {other:?}");
                telemetry::audit().log(AuditEvent::ElevationDenied {
                    target: self.name.clone(),
                    reason: reason.clone(),
                });
                Err(ProxyError::SpawnFailure(reason))
            }
            Ok(Err(e)) => {
                channel.shutdown().await;
                telemetry::audit().log(AuditEvent::ElevationDenied {
                    target: self.name.clone(),
                    reason: e.to_string(),
                });
                Err(ProxyError::SpawnFailure(e.to_string()))
            }
            Err(_) => {
                channel.shutdown().await;
                telemetry::audit().log(AuditEvent::ElevationDenied {
                    target: self.name.clone(),
                    reason: "readiness handshake timed out".to_string(),
                });
                Err(ProxyError::Timeout("readiness handshake"))
            }
        }
    }

    /// Invoke a declared method in the elevated process.
    ///
    /// Arguments are the raw string encodings of the method's declared
    /// coercion list. An undeclared method or a wrong argument count fails
    /// here, before any channel traffic. A fault raised by the method is
    /// re-raised as [`ProxyError::RemoteCall`] with its identity and
    /// message intact.
    ///
    /// A call timeout, a channel failure, or an out-of-protocol reply
    /// leaves a response owed (or the stream desynchronized), so the
    /// session cannot continue: the channel is dropped and subsequent
    /// calls fail with [`ProxyError::NotStarted`]. There is no retry or
    /// reconnect; start a fresh proxy.
    pub async fn call(&mut self, method: &str, args: &[&str]) -> Result<Value, ProxyError> {
        // Pre-flight: the allowlist check must not require the channel.
        let kinds = self
            .allowlist
            .arg_kinds(method)
            .ok_or_else(|| ProxyError::NotAllowed(method.to_string()))?;
        if args.len() != kinds.len() {
            return Err(ProxyError::Arity {
                method: method.to_string(),
                expected: kinds.len(),
                actual: args.len(),
            });
        }

        let channel = self.channel.as_mut().ok_or(ProxyError::NotStarted)?;

        debug!(method, ?args, "forwarding call to elevated helper");
        channel
            .send(&Request::Call {
                method: method.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            })
            .await?;

        let response = match timeout(self.timeouts.call, channel.recv::<Response>()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.poison("channel failed mid-call").await;
                return Err(e.into());
            }
            Err(_) => {
                // The response is still owed; reading it later would hand
                // this call's payload to the next one.
                self.poison("call response timed out").await;
                return Err(ProxyError::Timeout("call response"));
            }
        };

        match response {
            Response::Done(Ok(value)) => Ok(value),
            Response::Done(Err(fault)) => Err(ProxyError::RemoteCall(fault)),
            other => {
                let detail = format!("{other:?}");
                self.poison("unexpected reply to a call").await;
                Err(ProxyError::Protocol(detail))
            }
        }
    }

    /// Drop the channel after an exchange that cannot be resynchronized.
    /// The session is dead; later calls fail with [`ProxyError::NotStarted`].
    async fn poison(&mut self, reason: &str) {
        warn!(target_name = %self.name, "{}; dropping session", reason);
        if let Some(mut channel) = self.channel.take() {
            channel.shutdown().await;
        }
    }

    /// Send the shutdown request, drain the acknowledgement, release the
    /// channel.
    ///
    /// Idempotent, and never an error for a peer that is already dead or
    /// unresponsive: a vanished helper is "already closed", and the
    /// acknowledgement wait is bounded so an unresponsive helper cannot
    /// hang the caller.
    pub async fn close(&mut self) -> Result<(), ProxyError> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };

        if let Err(e) = channel.send(&Request::Shutdown).await {
            if e.is_peer_gone() {
                debug!(target_name = %self.name, "helper already gone at close");
            } else {
                warn!(target_name = %self.name, "shutdown request failed: {}", e);
            }
            channel.shutdown().await;
            return Ok(());
        }

        match timeout(self.timeouts.close, channel.recv::<Response>()).await {
            Ok(Ok(Response::Closing)) => {
                debug!(target_name = %self.name, "helper acknowledged shutdown");
            }
            Ok(Ok(other)) => {
                warn!(target_name = %self.name, "unexpected shutdown reply: {:?}", other);
            }
            Ok(Err(ChannelError::ConnectionClosed)) => {
                debug!(target_name = %self.name, "helper closed without acknowledgement");
            }
            Ok(Err(e)) => {
                warn!(target_name = %self.name, "error draining shutdown reply: {}", e);
            }
            Err(_) => {
                warn!(target_name = %self.name, "helper unresponsive at close, releasing channel");
            }
        }

        channel.shutdown().await;
        telemetry::audit().log(AuditEvent::SessionClosed {
            target: self.name.clone(),
        });
        Ok(())
    }
}

/// Explicit execution context for code that may or may not run with
/// privilege separation.
///
/// Both variants dispatch through the same declared table, so the calling
/// code is identical either way; only the construction site decides where
/// methods execute.
pub enum Executor<T: Elevated> {
    /// Execute methods directly on a locally owned target.
    Local {
        /// The target instance.
        target: T,
        /// Its declared table.
        table: MethodTable<T>,
    },
    /// Forward methods through a started [`SudoProxy`].
    Remote(SudoProxy),
}

impl<T: Elevated> Executor<T> {
    /// Execution context that runs everything in this process.
    pub fn local(target: T) -> Self {
        Executor::Local {
            target,
            table: T::method_table(),
        }
    }

    /// Execution context that forwards everything to the elevated helper.
    pub fn remote(proxy: SudoProxy) -> Self {
        Executor::Remote(proxy)
    }

    /// Invoke a declared method in whichever process this context selects.
    pub async fn call(&mut self, method: &str, args: &[&str]) -> Result<Value, ProxyError> {
        match self {
            Executor::Local { target, table } => {
                let raw: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                table.invoke(target, method, &raw).map_err(ProxyError::from)
            }
            Executor::Remote(proxy) => proxy.call(method, args).await,
        }
    }

    /// Tear down the remote channel, if any. A local context has nothing
    /// to close.
    pub async fn close(&mut self) -> Result<(), ProxyError> {
        match self {
            Executor::Local { .. } => Ok(()),
            Executor::Remote(proxy) => proxy.close().await,
        }
    }
}
