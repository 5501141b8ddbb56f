//! Request and response message types.

use crate::allowlist::{CallFault, Value};
use serde::{Deserialize, Serialize};

/// Messages sent from the unprivileged proxy to the elevated dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Invoke a declared method.
    ///
    /// Arguments travel as raw strings; the dispatcher coerces them with
    /// the method's declared coercion list. The vector length is the
    /// explicit argument count, so a declaration drift between the two
    /// sides is detected instead of desynchronizing the stream.
    Call {
        /// Name of the declared method.
        method: String,
        /// Raw string-encoded positional arguments.
        args: Vec<String>,
    },

    /// Ask the dispatcher to acknowledge and terminate its serve loop.
    Shutdown,
}

/// Messages sent from the elevated dispatcher to the unprivileged proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Readiness sentinel, written exactly once before the serve loop.
    Ready,

    /// Acknowledgement of [`Request::Shutdown`]; the channel closes after
    /// this message.
    Closing,

    /// Outcome of one [`Request::Call`]: the method's return value, or the
    /// fault it raised.
    Done(Result<Value, CallFault>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_request_shape() {
        let msg = Request::Call {
            method: "install_version".to_string(),
            args: vec!["1.2.3".to_string()],
        };

        match msg {
            Request::Call { method, args } => {
                assert_eq!(method, "install_version");
                assert_eq!(args, vec!["1.2.3"]);
            }
            _ => unreachable!("Expected Call"),
        }
    }

    #[test]
    fn test_fault_survives_the_wire() {
        let msg = Response::Done(Err(CallFault::permission_denied("disk full")));

        let bytes = bincode::serialize(&msg).unwrap();
        let back: Response = bincode::deserialize(&bytes).unwrap();

        match back {
            Response::Done(Err(fault)) => {
                assert_eq!(fault.kind, "permission_denied");
                assert_eq!(fault.message, "disk full");
            }
            _ => unreachable!("Expected Done(Err)"),
        }
    }

    #[test]
    fn test_sentinels_are_distinct() {
        let ready = bincode::serialize(&Response::Ready).unwrap();
        let closing = bincode::serialize(&Response::Closing).unwrap();
        assert_ne!(ready, closing);
    }
}
