//! ZeroMQ REQ socket transport.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use zerograph_core::{ClientConfig, GraphError, Result};

use super::{Frame, Transport};

/// REQ socket connected to a Zerograph service.
///
/// Outgoing frames are held until the final frame of the message arrives,
/// then sent as one multi-part message. An incoming multi-part message is
/// handed out frame by frame.
pub struct ZmqTransport {
    endpoint: String,
    connect_timeout: Duration,
    socket: ReqSocket,
    outgoing: Vec<Bytes>,
    incoming: VecDeque<Bytes>,
}

impl ZmqTransport {
    /// Connect to the service described by `config`.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let connect_timeout = config.connect_timeout();
        let socket = open_socket(&endpoint, connect_timeout).await?;
        tracing::debug!(endpoint = %endpoint, "ZeroMQ socket connected");
        Ok(Self {
            endpoint,
            connect_timeout,
            socket,
            outgoing: Vec::new(),
            incoming: VecDeque::new(),
        })
    }
}

async fn open_socket(endpoint: &str, connect_timeout: Duration) -> Result<ReqSocket> {
    let mut socket = ReqSocket::new();
    match tokio::time::timeout(connect_timeout, socket.connect(endpoint)).await {
        Ok(Ok(())) => Ok(socket),
        Ok(Err(e)) => Err(GraphError::Connection(format!(
            "Failed to connect to {endpoint}: {e}"
        ))),
        Err(_) => Err(GraphError::Timeout(format!(
            "Timeout occurred while trying to connect to {endpoint}"
        ))),
    }
}

#[async_trait]
impl Transport for ZmqTransport {
    async fn send(&mut self, frame: Bytes, more: bool) -> Result<()> {
        self.outgoing.push(frame);
        if more {
            return Ok(());
        }

        let mut frames = std::mem::take(&mut self.outgoing).into_iter();
        let mut message = match frames.next() {
            Some(first) => ZmqMessage::from(first),
            None => return Ok(()),
        };
        for frame in frames {
            message.push_back(frame);
        }
        self.socket
            .send(message)
            .await
            .map_err(|e| GraphError::Connection(format!("Send to {} failed: {e}", self.endpoint)))
    }

    async fn recv(&mut self) -> Result<Frame> {
        if self.incoming.is_empty() {
            let message = self.socket.recv().await.map_err(|e| {
                GraphError::Connection(format!("Receive from {} failed: {e}", self.endpoint))
            })?;
            self.incoming = message.into_vec().into();
        }
        let data = self.incoming.pop_front().unwrap_or_default();
        Ok(Frame {
            data,
            more: !self.incoming.is_empty(),
        })
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.outgoing.clear();
        self.incoming.clear();
        self.socket = open_socket(&self.endpoint, self.connect_timeout).await?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}
