/// In-memory transport for unit tests
use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::transport::{FrameSink, FrameStream, InboundFrame, Transport};
use crate::errors::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    Accept,
    Refuse,
}

/// Server side of one accepted mock socket
///
/// Dropping it ends the client's inbound stream, which the connection sees
/// as a peer close.
pub struct MockServer {
    frames: fmpsc::UnboundedSender<Result<InboundFrame, ChannelError>>,
    sent: fmpsc::UnboundedReceiver<String>,
}

impl MockServer {
    pub fn push(&self, text: &str) {
        let _ = self
            .frames
            .unbounded_send(Ok(InboundFrame::Text(text.to_string())));
    }

    pub fn push_json(&self, value: Value) {
        self.push(&value.to_string());
    }

    pub fn close_with(&self, code: u16, reason: &str) {
        let _ = self.frames.unbounded_send(Ok(InboundFrame::Close {
            code: Some(code),
            reason: Some(reason.to_string()),
        }));
    }

    pub fn fail(&self, info: &str) {
        let _ = self
            .frames
            .unbounded_send(Err(ChannelError::Transport(info.to_string())));
    }

    /// Next frame the client sent, `None` once the client side closed
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.next().await
    }
}

pub struct MockTransport {
    mode: Mutex<MockMode>,
    opens: AtomicUsize,
    open_times: Mutex<Vec<Instant>>,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockTransport {
    /// Accepts every open; each accepted socket's server side is delivered on the receiver
    pub fn accepting() -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            mode: Mutex::new(MockMode::Accept),
            opens: AtomicUsize::new(0),
            open_times: Mutex::new(Vec::new()),
            servers,
        });
        (transport, rx)
    }

    /// Refuses every open
    pub fn refusing() -> Arc<Self> {
        let (transport, _servers) = Self::accepting();
        transport.set_mode(MockMode::Refuse);
        transport
    }

    pub fn set_mode(&self, mode: MockMode) {
        *self.mode.lock() = mode;
    }

    /// Number of sockets requested so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.open_times.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, address: &str) -> Result<(FrameSink, FrameStream), ChannelError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_times.lock().push(Instant::now());

        let mode = *self.mode.lock();
        match mode {
            MockMode::Refuse => Err(ChannelError::Transport(format!(
                "connection to {} refused",
                address
            ))),
            MockMode::Accept => {
                let (frames_tx, frames_rx) = fmpsc::unbounded();
                let (sent_tx, sent_rx) = fmpsc::unbounded();
                let _ = self.servers.send(MockServer {
                    frames: frames_tx,
                    sent: sent_rx,
                });

                let sink = sent_tx.sink_map_err(|e| ChannelError::Transport(e.to_string()));
                Ok((Box::pin(sink), Box::pin(frames_rx)))
            }
        }
    }
}
