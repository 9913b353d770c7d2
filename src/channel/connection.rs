/// One physical socket and its pump task
///
/// A `Connection` is opened once and never reused. It reports to its owner
/// over an unbounded channel, tagging every notification with the epoch it
/// was created for. `close` detaches the connection before asking the pump
/// to shut down, so nothing it reports afterwards reaches the owner.
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::lifecycle::Epoch;
use super::state::ConnectionState;
use super::transport::{InboundFrame, Transport};
use crate::errors::ChannelError;
use crate::logger::{self, LogTag};

/// How long a graceful close may take before the socket is dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Notification from a connection to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened {
        epoch: Epoch,
    },
    Frame {
        epoch: Epoch,
        text: String,
    },
    Error {
        epoch: Epoch,
        info: String,
    },
    Closed {
        epoch: Epoch,
        code: Option<u16>,
        reason: Option<String>,
    },
}

impl ConnectionEvent {
    pub fn epoch(&self) -> Epoch {
        match self {
            ConnectionEvent::Opened { epoch }
            | ConnectionEvent::Frame { epoch, .. }
            | ConnectionEvent::Error { epoch, .. }
            | ConnectionEvent::Closed { epoch, .. } => *epoch,
        }
    }
}

/// Sends notifications unless the connection has been detached
#[derive(Clone)]
struct Notifier {
    events: mpsc::UnboundedSender<ConnectionEvent>,
    detached: Arc<AtomicBool>,
}

impl Notifier {
    fn emit(&self, event: ConnectionEvent) {
        if !self.detached.load(Ordering::Acquire) {
            let _ = self.events.send(event);
        }
    }
}

/// Cloneable sending half of a connection
///
/// Refuses frames unless the connection it came from is `Open`.
#[derive(Clone)]
pub struct ConnectionSender {
    state: Arc<Mutex<ConnectionState>>,
    outbound: mpsc::UnboundedSender<String>,
}

impl ConnectionSender {
    /// Queue one text frame on the open socket
    pub fn send(&self, frame: String) -> Result<(), ChannelError> {
        if *self.state.lock() != ConnectionState::Open {
            return Err(ChannelError::NotConnected);
        }
        self.outbound
            .send(frame)
            .map_err(|_| ChannelError::NotConnected)
    }
}

pub struct Connection {
    epoch: Epoch,
    state: Arc<Mutex<ConnectionState>>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
    detached: Arc<AtomicBool>,
}

impl Connection {
    /// Start the handshake with `address`; returns immediately in `Connecting`
    ///
    /// Handshake failures arrive as `Error` followed by `Closed`.
    pub fn open(
        epoch: Epoch,
        address: &str,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let detached = Arc::new(AtomicBool::new(false));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let notifier = Notifier {
            events,
            detached: detached.clone(),
        };

        tokio::spawn(run_connection(
            epoch,
            address.to_string(),
            transport,
            notifier,
            state.clone(),
            outbound_rx,
            shutdown_rx,
        ));

        Self {
            epoch,
            state,
            outbound: outbound_tx,
            shutdown: Some(shutdown_tx),
            detached,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[cfg(test)]
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    #[cfg(test)]
    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Sending half for handles that transmit without going through the owner
    pub fn sender(&self) -> ConnectionSender {
        ConnectionSender {
            state: self.state.clone(),
            outbound: self.outbound.clone(),
        }
    }

    /// Detach, then request a graceful shutdown; idempotent
    pub fn close(&mut self) {
        self.detached.store(true, Ordering::Release);
        if let Some(shutdown) = self.shutdown.take() {
            {
                let mut state = self.state.lock();
                if state.is_active() {
                    *state = ConnectionState::Closing;
                }
            }
            // The pump may already be gone; nothing left to stop then
            let _ = shutdown.send(());
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    epoch: Epoch,
    address: String,
    transport: Arc<dyn Transport>,
    notifier: Notifier,
    state: Arc<Mutex<ConnectionState>>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let opened = tokio::select! {
        result = transport.open(&address) => result,
        _ = &mut shutdown_rx => {
            *state.lock() = ConnectionState::Disconnected;
            return;
        }
    };

    let (mut sink, mut stream) = match opened {
        Ok(pair) => pair,
        Err(e) => {
            *state.lock() = ConnectionState::Disconnected;
            notifier.emit(ConnectionEvent::Error {
                epoch,
                info: e.to_string(),
            });
            notifier.emit(ConnectionEvent::Closed {
                epoch,
                code: None,
                reason: None,
            });
            return;
        }
    };

    *state.lock() = ConnectionState::Open;
    notifier.emit(ConnectionEvent::Opened { epoch });

    let (code, reason) = loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                *state.lock() = ConnectionState::Closing;
                if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
                    logger::debug(
                        LogTag::Channel,
                        &format!("Graceful close of {} timed out (epoch {})", address, epoch),
                    );
                }
                break (None, None);
            }

            Some(frame) = outbound_rx.recv() => {
                if let Err(e) = sink.send(frame).await {
                    notifier.emit(ConnectionEvent::Error { epoch, info: e.to_string() });
                    break (None, None);
                }
            }

            inbound = stream.next() => match inbound {
                Some(Ok(InboundFrame::Text(text))) => {
                    notifier.emit(ConnectionEvent::Frame { epoch, text });
                }
                Some(Ok(InboundFrame::Close { code, reason })) => {
                    break (code, reason);
                }
                Some(Err(e)) => {
                    notifier.emit(ConnectionEvent::Error { epoch, info: e.to_string() });
                    break (None, None);
                }
                None => break (None, None),
            }
        }
    };

    *state.lock() = ConnectionState::Disconnected;
    notifier.emit(ConnectionEvent::Closed {
        epoch,
        code,
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::MockTransport;

    #[tokio::test]
    async fn test_frames_arrive_in_order_with_epoch() {
        let (transport, mut servers) = MockTransport::accepting();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let conn = Connection::open(7, "mock://a", transport, events_tx);
        assert_eq!(events_rx.recv().await, Some(ConnectionEvent::Opened { epoch: 7 }));
        assert_eq!(conn.state(), ConnectionState::Open);

        let server = servers.recv().await.unwrap();
        server.push("one");
        server.push("two");

        for expected in ["one", "two"] {
            match events_rx.recv().await {
                Some(ConnectionEvent::Frame { epoch, text }) => {
                    assert_eq!(epoch, 7);
                    assert_eq!(text, expected);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_refused_open_reports_error_then_close() {
        let transport = MockTransport::refusing();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let conn = Connection::open(1, "mock://down", transport, events_tx);
        assert!(matches!(events_rx.recv().await, Some(ConnectionEvent::Error { epoch: 1, .. })));
        assert!(matches!(events_rx.recv().await, Some(ConnectionEvent::Closed { epoch: 1, .. })));
        assert!(matches!(conn.sender().send("x".into()), Err(ChannelError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_detaches_before_shutdown() {
        let (transport, mut servers) = MockTransport::accepting();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut conn = Connection::open(3, "mock://a", transport, events_tx);
        assert_eq!(events_rx.recv().await, Some(ConnectionEvent::Opened { epoch: 3 }));
        let mut server = servers.recv().await.unwrap();

        let sender = conn.sender();
        sender.send("hello".into()).unwrap();
        assert_eq!(server.next_sent().await.as_deref(), Some("hello"));

        conn.close();
        assert!(matches!(sender.send("late".into()), Err(ChannelError::NotConnected)));
        assert!(conn.is_detached());
        server.push("late frame");
        drop(server);

        // The pump ends and its Closed notification is swallowed
        while conn.state() != ConnectionState::Disconnected {
            tokio::task::yield_now().await;
        }
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_peer_close_frame_is_reported() {
        let (transport, mut servers) = MockTransport::accepting();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let _conn = Connection::open(2, "mock://a", transport, events_tx);
        events_rx.recv().await;
        let server = servers.recv().await.unwrap();
        server.close_with(1001, "going away");

        assert_eq!(
            events_rx.recv().await,
            Some(ConnectionEvent::Closed {
                epoch: 2,
                code: Some(1001),
                reason: Some("going away".to_string()),
            })
        );
    }
}
