/// Pluggable socket opener
///
/// A transport turns an address into a text-frame sink and an inbound frame
/// stream. The production transport speaks WebSocket; tests plug in
/// in-memory pairs.
use async_trait::async_trait;
use futures::{future, Sink, Stream};
use futures_util::{SinkExt, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::errors::ChannelError;

/// Frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close {
        code: Option<u16>,
        reason: Option<String>,
    },
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ChannelError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<InboundFrame, ChannelError>> + Send>>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform the handshake with `address`
    async fn open(&self, address: &str) -> Result<(FrameSink, FrameStream), ChannelError>;
}

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, address: &str) -> Result<(FrameSink, FrameStream), ChannelError> {
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(address))
            .await
            .map_err(|_| {
                ChannelError::Transport(format!(
                    "handshake with {} timed out after {:?}",
                    address, self.connect_timeout
                ))
            })?
            .map_err(|e| ChannelError::Transport(format!("failed to connect: {}", e)))?;

        let (ws_sender, ws_receiver) = ws_stream.split();

        let sink = ws_sender
            .sink_map_err(|e| ChannelError::Transport(e.to_string()))
            .with(|text: String| future::ok::<_, ChannelError>(Message::Text(text)));

        // Ping/pong is answered by tungstenite itself; only text and close matter here
        let stream = ws_receiver.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(InboundFrame::Text(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ))),
                Ok(Message::Close(frame)) => Some(Ok(match frame {
                    Some(frame) => InboundFrame::Close {
                        code: Some(u16::from(frame.code)),
                        reason: Some(frame.reason.to_string()),
                    },
                    None => InboundFrame::Close {
                        code: None,
                        reason: None,
                    },
                })),
                Ok(_) => None,
                Err(e) => Some(Err(ChannelError::Transport(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
