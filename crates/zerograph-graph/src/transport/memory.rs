//! In-process transport with scripted replies.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use zerograph_core::{GraphError, Result};

use super::{Frame, Transport};

/// A transport that records what it is sent and answers from a script.
///
/// Clones share state, so a test can keep one handle to script replies and
/// inspect sent frames while the graph owns another. When the script runs
/// out, `recv` waits forever, which lets receive timeouts be exercised.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    sent: Vec<(Bytes, bool)>,
    replies: VecDeque<Vec<Bytes>>,
    incoming: VecDeque<Bytes>,
    reconnects: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply made of the given frames.
    pub fn push_reply<I, F>(&self, frames: I)
    where
        I: IntoIterator<Item = F>,
        F: Into<Bytes>,
    {
        let frames = frames.into_iter().map(Into::into).collect();
        self.state.lock().replies.push_back(frames);
    }

    /// Queue a single-frame reply.
    pub fn push_payload(&self, payload: impl Into<String>) {
        self.push_reply([payload.into()]);
    }

    /// Every frame sent so far, with its "more" flag.
    pub fn sent(&self) -> Vec<(Bytes, bool)> {
        self.state.lock().sent.clone()
    }

    /// Non-empty frames sent so far, decoded as request lines.
    pub fn sent_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|(frame, _)| !frame.is_empty())
            .map(|(frame, _)| String::from_utf8_lossy(frame).into_owned())
            .collect()
    }

    pub fn reconnects(&self) -> usize {
        self.state.lock().reconnects
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: Bytes, more: bool) -> Result<()> {
        self.state.lock().sent.push((frame, more));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame> {
        let next = {
            let mut state = self.state.lock();
            if state.incoming.is_empty() {
                if let Some(reply) = state.replies.pop_front() {
                    // A reply always has at least one frame on the wire.
                    state.incoming = if reply.is_empty() {
                        VecDeque::from([Bytes::new()])
                    } else {
                        reply.into()
                    };
                }
            }
            state
                .incoming
                .pop_front()
                .map(|data| (data, !state.incoming.is_empty()))
        };
        match next {
            Some((data, more)) => Ok(Frame { data, more }),
            None => {
                std::future::pending::<()>().await;
                Err(GraphError::Connection("memory transport closed".into()))
            }
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.incoming.clear();
        state.reconnects += 1;
        Ok(())
    }

    fn endpoint(&self) -> String {
        "memory://".to_string()
    }
}
