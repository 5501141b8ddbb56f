//! Channel error types.

use std::io;
use thiserror::Error;

/// Errors from the framed channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// IO error on the underlying socket.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// The peer's end of the channel is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A frame exceeded the size limit.
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
}

impl ChannelError {
    /// Whether this error means the peer has vanished (end-of-stream or a
    /// broken pipe), as opposed to a malformed exchange.
    pub fn is_peer_gone(&self) -> bool {
        match self {
            ChannelError::ConnectionClosed => true,
            ChannelError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
