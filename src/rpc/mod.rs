//! The wire protocol between the unprivileged proxy and the elevated
//! dispatcher.
//!
//! # Message Flow
//!
//! ```text
//! ┌─────────────────┐      Request       ┌─────────────────┐
//! │   Unprivileged  │───────────────────>│    Elevated     │
//! │      Proxy      │                    │   Dispatcher    │
//! │                 │<───────────────────│                 │
//! └─────────────────┘      Response      └─────────────────┘
//! ```
//!
//! The protocol is strictly half-duplex ping-pong: the dispatcher writes
//! [`protocol::Response::Ready`] exactly once after startup, and from then
//! on every request receives exactly one response before the next request
//! may be sent. Nothing is ever pipelined.
//!
//! # Message Framing
//!
//! Messages use length-prefixed bincode:
//! ```text
//! [4 bytes: message length (big-endian u32)]
//! [N bytes: bincode-serialized message]
//! ```

mod error;
mod framing;
pub mod protocol;

pub use error::ChannelError;
pub use framing::{FramedChannel, MAX_MESSAGE_SIZE};
