//! Length-prefixed bincode framing over a unix stream.

use super::error::ChannelError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

/// Maximum frame size. Calls and results are tiny; anything near this limit
/// means a corrupted or hostile stream.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// One end of the duplex channel between the two processes.
///
/// Owns the stream exclusively: the protocol is half-duplex ping-pong, so
/// there is no reader/writer split and no sharing between tasks. A send or
/// receive in progress holds `&mut self`, which is exactly the exclusion
/// the protocol requires.
pub struct FramedChannel {
    stream: UnixStream,
    closed: bool,
}

impl FramedChannel {
    /// Wrap a connected stream.
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Write one message as a length-prefixed bincode frame.
    pub async fn send<M: Serialize>(&mut self, msg: &M) -> Result<(), ChannelError> {
        let data = bincode::serialize(msg)?;
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(ChannelError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
        }

        let len = data.len() as u32;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one length-prefixed frame and decode it.
    ///
    /// End-of-stream, whether at a frame boundary or mid-frame, maps to
    /// [`ChannelError::ConnectionClosed`].
    pub async fn recv<M: DeserializeOwned>(&mut self) -> Result<M, ChannelError> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(ChannelError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(ChannelError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
        }

        let mut buf = vec![0u8; len];
        match self.stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(ChannelError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(bincode::deserialize(&buf)?)
    }

    /// Shut down the write side of the stream. Idempotent; failures are
    /// logged and swallowed since the peer may already be gone.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown().await {
            debug!("channel shutdown: {}", e);
        }
    }
}

impl std::fmt::Debug for FramedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedChannel")
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::{Request, Response};

    fn pair() -> (FramedChannel, FramedChannel) {
        let (a, b) = UnixStream::pair().unwrap();
        (FramedChannel::new(a), FramedChannel::new(b))
    }

    #[tokio::test]
    async fn test_request_response_roundtrip() {
        let (mut client, mut server) = pair();

        let request = Request::Call {
            method: "install_version".to_string(),
            args: vec!["1.2.3".to_string()],
        };
        client.send(&request).await.unwrap();

        let received: Request = server.recv().await.unwrap();
        assert_eq!(received, request);

        server.send(&Response::Ready).await.unwrap();
        let response: Response = client.recv().await.unwrap();
        assert_eq!(response, Response::Ready);
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let (mut client, server) = pair();
        drop(server);

        let err = client.recv::<Response>().await.unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (mut client, _server) = pair();
        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let (mut client, server) = pair();

        // Hand-write a frame header claiming an absurd length.
        let mut raw = server.stream;
        let len = (MAX_MESSAGE_SIZE as u32) + 1;
        raw.write_all(&len.to_be_bytes()).await.unwrap();
        raw.flush().await.unwrap();

        let err = client.recv::<Response>().await.unwrap_err();
        assert!(matches!(err, ChannelError::MessageTooLarge(_, _)));
    }
}
