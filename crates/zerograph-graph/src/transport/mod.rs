//! Frame-level transport abstraction.
//!
//! A transport moves individual frames of a multi-part request/reply
//! exchange. Frames sent with `more = true` belong to the same message as the
//! next frame; the frame sent with `more = false` completes it. Received
//! frames report the same flag so the caller knows when a reply is complete.

use async_trait::async_trait;
use bytes::Bytes;

use zerograph_core::Result;

pub mod memory;
pub mod zmq;

pub use memory::MemoryTransport;
pub use zmq::ZmqTransport;

/// One received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Bytes,
    /// More frames of the same reply follow.
    pub more: bool,
}

/// A request/reply socket carrying multi-frame messages.
#[async_trait]
pub trait Transport: Send {
    /// Send one frame; `more` marks that further frames of this message follow.
    async fn send(&mut self, frame: Bytes, more: bool) -> Result<()>;

    /// Receive the next frame of the current reply.
    async fn recv(&mut self) -> Result<Frame>;

    /// Drop any half-finished exchange and re-establish the connection.
    async fn reconnect(&mut self) -> Result<()>;

    /// Human-readable endpoint, for logging.
    fn endpoint(&self) -> String;
}
