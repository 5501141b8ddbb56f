//! The elevated side of the privilege boundary.
//!
//! [`Dispatcher`] owns the real target for the lifetime of the elevated
//! process and serves one request at a time off the channel:
//!
//! ```text
//! Ready ──> AwaitingRequest ──Call──> Dispatching ──Done──┐
//!               ^                                         │
//!               └─────────────────────────────────────────┘
//!               └──Shutdown──> Closing (terminal)
//!               └──EOF───────> stopped (peer vanished)
//! ```
//!
//! The loop is single-threaded and strictly synchronous per request: the
//! target is exclusively owned here, so no locking is ever needed. A fault
//! from a privileged method is marshaled back and the loop continues; a
//! request for an undeclared method is a protocol violation that terminates
//! the loop loudly.

use crate::allowlist::{Elevated, MethodTable};
use crate::rpc::protocol::{Request, Response};
use crate::rpc::{ChannelError, FramedChannel};
use crate::telemetry::{self, AuditEvent, CallOutcome, RejectReason};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that terminate the serve loop abnormally.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The peer requested something outside the declared table. Either a
    /// bug on the calling side or a malicious peer; never a per-call
    /// failure.
    #[error("Protocol violation: {0}")]
    Violation(String),

    /// The channel failed in a way that is not plain end-of-stream.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Serves a target's declared methods to the unprivileged peer.
pub struct Dispatcher<T: Elevated> {
    target: T,
    table: MethodTable<T>,
    channel: FramedChannel,
}

impl<T: Elevated> Dispatcher<T> {
    /// Wrap a target and a connected channel. The table is built here,
    /// from the same declaration the proxy side projects its allowlist
    /// from.
    pub fn new(target: T, channel: FramedChannel) -> Self {
        Self {
            table: T::method_table(),
            target,
            channel,
        }
    }

    /// Run the serve loop to completion.
    ///
    /// Writes the readiness sentinel exactly once, then alternates
    /// read-request/write-response until a shutdown request, end-of-stream,
    /// or a protocol violation. Returns `Ok(())` for both orderly shutdown
    /// and a vanished peer.
    pub async fn serve(mut self) -> Result<(), DispatchError> {
        match self.channel.send(&Response::Ready).await {
            Ok(()) => {}
            Err(e) if e.is_peer_gone() => {
                debug!("peer vanished before readiness, stopping");
                self.channel.shutdown().await;
                return Ok(());
            }
            Err(e) => {
                self.channel.shutdown().await;
                return Err(e.into());
            }
        }
        info!(target_name = %self.target.name(), "dispatcher ready");

        let outcome = self.serve_loop().await;
        self.channel.shutdown().await;
        outcome
    }

    async fn serve_loop(&mut self) -> Result<(), DispatchError> {
        loop {
            let request = match self.channel.recv::<Request>().await {
                Ok(request) => request,
                Err(e) if e.is_peer_gone() => {
                    debug!(target_name = %self.target.name(), "peer vanished, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            match request {
                Request::Shutdown => {
                    debug!(target_name = %self.target.name(), "shutdown requested");
                    if let Err(e) = self.channel.send(&Response::Closing).await {
                        warn!("failed to acknowledge shutdown: {}", e);
                    }
                    telemetry::audit().log(AuditEvent::SessionClosed {
                        target: self.target.name().to_string(),
                    });
                    return Ok(());
                }
                Request::Call { method, args } => {
                    let reply = self.dispatch(&method, &args)?;
                    match self.channel.send(&Response::Done(reply)).await {
                        Ok(()) => {}
                        Err(e) if e.is_peer_gone() => {
                            debug!("peer vanished mid-response, stopping");
                            return Ok(());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }

    /// Validate and invoke one call. `Err` is a protocol violation; an
    /// inner `Err` is the method's own fault, marshaled back to the caller.
    fn dispatch(
        &mut self,
        method: &str,
        args: &[String],
    ) -> Result<Result<crate::allowlist::Value, crate::allowlist::CallFault>, DispatchError> {
        let call_id = Uuid::new_v4();
        let started = Instant::now();

        match self.table.invoke(&mut self.target, method, args) {
            Ok(value) => {
                telemetry::audit().log(AuditEvent::CallCompleted {
                    id: call_id,
                    method: method.to_string(),
                    outcome: CallOutcome::Ok,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(Ok(value))
            }
            Err(e) => match e.into_call_fault() {
                Ok(fault) => {
                    debug!(method, %fault, "privileged method failed");
                    telemetry::audit().log(AuditEvent::CallCompleted {
                        id: call_id,
                        method: method.to_string(),
                        outcome: CallOutcome::Fault,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    Ok(Err(fault))
                }
                Err(violation) => {
                    error!(method, %violation, "rejecting disallowed request");
                    telemetry::audit().log(AuditEvent::CallRejected {
                        method: method.to_string(),
                        reason: RejectReason::from(&violation),
                    });
                    Err(DispatchError::Violation(violation.to_string()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::{ArgKind, CallFault, Value};
    use tokio::net::UnixStream;

    struct Vault {
        entries: Vec<String>,
    }

    impl Elevated for Vault {
        fn name(&self) -> &str {
            "vault"
        }

        fn method_table() -> MethodTable<Self> {
            MethodTable::new()
                .register("store", &[ArgKind::Str], |v: &mut Vault, args| {
                    v.entries.push(args[0].expect_str()?.to_string());
                    Ok(Value::Int(v.entries.len() as i64))
                })
                .register("fail", &[], |_, _| {
                    Err(CallFault::permission_denied("disk full"))
                })
        }
    }

    fn setup() -> (FramedChannel, Dispatcher<Vault>) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let dispatcher = Dispatcher::new(
            Vault { entries: vec![] },
            FramedChannel::new(theirs),
        );
        (FramedChannel::new(ours), dispatcher)
    }

    #[tokio::test]
    async fn test_ready_then_call_then_shutdown() {
        let (mut client, dispatcher) = setup();
        let serve = tokio::spawn(dispatcher.serve());

        assert_eq!(client.recv::<Response>().await.unwrap(), Response::Ready);

        client
            .send(&Request::Call {
                method: "store".to_string(),
                args: vec!["v1".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(
            client.recv::<Response>().await.unwrap(),
            Response::Done(Ok(Value::Int(1)))
        );

        client.send(&Request::Shutdown).await.unwrap();
        assert_eq!(client.recv::<Response>().await.unwrap(), Response::Closing);

        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_method_fault_keeps_loop_alive() {
        let (mut client, dispatcher) = setup();
        let serve = tokio::spawn(dispatcher.serve());

        assert_eq!(client.recv::<Response>().await.unwrap(), Response::Ready);

        client
            .send(&Request::Call {
                method: "fail".to_string(),
                args: vec![],
            })
            .await
            .unwrap();
        match client.recv::<Response>().await.unwrap() {
            Response::Done(Err(fault)) => {
                assert_eq!(fault.kind, "permission_denied");
                assert_eq!(fault.message, "disk full");
            }
            other => unreachable!("Expected fault, got {other:?}"),
        }

        // The loop survived the fault; a further call still works.
        client
            .send(&Request::Call {
                method: "store".to_string(),
                args: vec!["v2".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(
            client.recv::<Response>().await.unwrap(),
            Response::Done(Ok(Value::Int(1)))
        );

        client.send(&Request::Shutdown).await.unwrap();
        assert_eq!(client.recv::<Response>().await.unwrap(), Response::Closing);
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_undeclared_method_terminates_loop() {
        let (mut client, dispatcher) = setup();
        let serve = tokio::spawn(dispatcher.serve());

        assert_eq!(client.recv::<Response>().await.unwrap(), Response::Ready);

        client
            .send(&Request::Call {
                method: "_secret".to_string(),
                args: vec![],
            })
            .await
            .unwrap();

        let result = serve.await.unwrap();
        assert!(matches!(result, Err(DispatchError::Violation(_))));
    }

    #[tokio::test]
    async fn test_arity_mismatch_terminates_loop() {
        let (mut client, dispatcher) = setup();
        let serve = tokio::spawn(dispatcher.serve());

        assert_eq!(client.recv::<Response>().await.unwrap(), Response::Ready);

        client
            .send(&Request::Call {
                method: "store".to_string(),
                args: vec!["a".to_string(), "b".to_string()],
            })
            .await
            .unwrap();

        let result = serve.await.unwrap();
        assert!(matches!(result, Err(DispatchError::Violation(_))));
    }

    #[tokio::test]
    async fn test_vanished_peer_is_clean_termination() {
        let (client, dispatcher) = setup();
        let serve = tokio::spawn(dispatcher.serve());
        drop(client);

        serve.await.unwrap().unwrap();
    }
}
