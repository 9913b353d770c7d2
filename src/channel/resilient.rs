/// Resilient channel: a connection wrapped in a reconnection policy and a
/// subscription registry
///
/// One actor task per channel owns the connection, the lifecycle state and
/// the reconnect timer. Commands, connection notifications and timer
/// firings all funnel into that task and are handled one at a time, which
/// is what keeps teardown race-free. Handles are cheap clones; dropping the
/// last one shuts the actor down.
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::connection::{Connection, ConnectionEvent, ConnectionSender};
use super::lifecycle::{Lifecycle, Step};
use super::message::EventEnvelope;
use super::metrics::{ChannelMetrics, ChannelMetricsSnapshot};
use super::policy::ReconnectPolicy;
use super::registry::{Callback, SubscriptionHandle, SubscriptionRegistry};
use super::state::{ChannelNotice, ChannelStatus, ConnectionState};
use super::transport::{Transport, WebSocketTransport};
use crate::errors::ChannelError;
use crate::logger::{self, LogTag};

const NOTICE_CAPACITY: usize = 256;

/// Static description of a channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    /// Short label used in log lines
    pub name: String,
    pub address: String,
    pub policy: ReconnectPolicy,
    pub log_tag: LogTag,
}

impl ChannelSettings {
    pub fn new(name: impl Into<String>, address: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            policy,
            log_tag: LogTag::Channel,
        }
    }

    pub fn with_log_tag(mut self, tag: LogTag) -> Self {
        self.log_tag = tag;
        self
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
}

struct Shared {
    settings: ChannelSettings,
    commands: mpsc::UnboundedSender<Command>,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    outbound: Arc<Mutex<Option<ConnectionSender>>>,
    status: watch::Receiver<ChannelStatus>,
    notices: broadcast::Sender<ChannelNotice>,
    metrics: Arc<ChannelMetrics>,
}

/// Handle to a resilient channel
///
/// Must be created inside a tokio runtime; the actor is spawned on it.
#[derive(Clone)]
pub struct ResilientChannel {
    shared: Arc<Shared>,
}

impl ResilientChannel {
    pub fn new(settings: ChannelSettings, transport: Arc<dyn Transport>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ChannelStatus::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let registry = Arc::new(Mutex::new(SubscriptionRegistry::new()));
        let outbound = Arc::new(Mutex::new(None));
        let metrics = ChannelMetrics::new();

        let actor = ChannelActor {
            settings: settings.clone(),
            transport,
            lifecycle: Lifecycle::new(settings.policy),
            connection: None,
            timer: None,
            events_tx,
            timer_tx,
            registry: registry.clone(),
            outbound: outbound.clone(),
            status: status_tx,
            notices: notices.clone(),
            metrics: metrics.clone(),
        };
        tokio::spawn(actor.run(commands_rx, events_rx, timer_rx));

        Self {
            shared: Arc::new(Shared {
                settings,
                commands: commands_tx,
                registry,
                outbound,
                status: status_rx,
                notices,
                metrics,
            }),
        }
    }

    /// Channel over the production WebSocket transport
    pub fn websocket(settings: ChannelSettings) -> Self {
        Self::new(settings, Arc::new(WebSocketTransport::default()))
    }

    pub fn name(&self) -> &str {
        &self.shared.settings.name
    }

    pub fn address(&self) -> &str {
        &self.shared.settings.address
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.shared.settings.policy
    }

    /// Open a connection unless one is connecting or open
    ///
    /// Resets the reconnect budget. Progress is reported through
    /// `watch_status` and `notices`, never as an error here.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close the connection and cancel any pending reconnect
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    fn command(&self, command: Command) {
        if let Err(e) = self.shared.commands.send(command) {
            logger::debug(
                self.shared.settings.log_tag.clone(),
                &format!("[{}] actor gone, dropped {:?}", self.name(), e.0),
            );
        }
    }

    pub fn subscribe<F>(&self, event_type: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.subscribe_shared(event_type, Arc::new(callback))
    }

    /// Register a shared callback; registering the same `Arc` twice is a no-op
    pub fn subscribe_shared(&self, event_type: &str, callback: Callback) -> SubscriptionHandle {
        self.shared.registry.lock().subscribe(event_type, callback)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.shared.registry.lock().unsubscribe(handle)
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.shared.registry.lock().subscriber_count(event_type)
    }

    /// Transmit one envelope on the open connection, fire-and-forget
    ///
    /// `Closed` once the actor is gone, `NotConnected` unless the connection is open.
    pub fn send(&self, envelope: &EventEnvelope) -> Result<(), ChannelError> {
        if self.shared.commands.is_closed() {
            return Err(ChannelError::Closed);
        }
        let outbound = self.shared.outbound.lock();
        let Some(sender) = outbound.as_ref() else {
            logger::debug(
                self.shared.settings.log_tag.clone(),
                &format!(
                    "[{}] not connected, '{}' not sent",
                    self.name(),
                    envelope.event_type
                ),
            );
            return Err(ChannelError::NotConnected);
        };

        let frame = envelope.encode()?;
        sender.send(frame)?;
        self.shared.metrics.inc_sent();
        Ok(())
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared.status.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.status.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.borrow().is_connected()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<ChannelNotice> {
        self.shared.notices.subscribe()
    }

    pub fn metrics(&self) -> ChannelMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

// ============================================================================
// ACTOR
// ============================================================================

struct ChannelActor {
    settings: ChannelSettings,
    transport: Arc<dyn Transport>,
    lifecycle: Lifecycle,
    connection: Option<Connection>,
    timer: Option<(u64, JoinHandle<()>)>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    timer_tx: mpsc::UnboundedSender<u64>,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    outbound: Arc<Mutex<Option<ConnectionSender>>>,
    status: watch::Sender<ChannelStatus>,
    notices: broadcast::Sender<ChannelNotice>,
    metrics: Arc<ChannelMetrics>,
}

impl ChannelActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut timers: mpsc::UnboundedReceiver<u64>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Connect) => {
                        let steps = self.lifecycle.connect();
                        self.apply(steps);
                    }
                    Some(Command::Disconnect) => self.handle_disconnect(),
                    None => {
                        // Every handle dropped
                        let steps = self.lifecycle.disconnect();
                        self.apply(steps);
                        self.publish_status();
                        break;
                    }
                },

                Some(event) = events.recv() => self.handle_event(event),

                Some(token) = timers.recv() => {
                    if matches!(self.timer, Some((t, _)) if t == token) {
                        self.timer = None;
                    }
                    let steps = self.lifecycle.on_reconnect_due(token);
                    self.apply(steps);
                }
            }
            self.publish_status();
        }

        logger::debug(
            self.settings.log_tag.clone(),
            &format!("[{}] actor stopped", self.settings.name),
        );
    }

    fn handle_disconnect(&mut self) {
        let had_connection = self.lifecycle.current_epoch().is_some();
        let steps = self.lifecycle.disconnect();
        self.apply(steps);

        if had_connection {
            logger::info(
                self.settings.log_tag.clone(),
                &format!("[{}] disconnected from {}", self.settings.name, self.settings.address),
            );
            self.notify(ChannelNotice::Disconnected {
                code: None,
                reason: None,
                intentional: true,
            });
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened { epoch } => {
                if !self.lifecycle.on_open(epoch) {
                    return;
                }
                if let Some(conn) = self.connection.as_ref().filter(|c| c.epoch() == epoch) {
                    *self.outbound.lock() = Some(conn.sender());
                }
                self.metrics.inc_opened();
                logger::info(
                    self.settings.log_tag.clone(),
                    &format!("[{}] connected to {}", self.settings.name, self.settings.address),
                );
                self.notify(ChannelNotice::Connected { epoch });
            }

            ConnectionEvent::Frame { epoch, text } => {
                if self.lifecycle.is_current(epoch) {
                    self.dispatch(&text);
                }
            }

            ConnectionEvent::Error { epoch, info } => {
                if self.lifecycle.on_error(epoch, &info) {
                    logger::warning(
                        self.settings.log_tag.clone(),
                        &format!("[{}] connection error: {}", self.settings.name, info),
                    );
                }
            }

            ConnectionEvent::Closed {
                epoch,
                code,
                reason,
            } => {
                if !self.lifecycle.is_current(epoch) {
                    return;
                }
                *self.outbound.lock() = None;
                if self.connection.as_ref().map(Connection::epoch) == Some(epoch) {
                    self.connection = None;
                }

                let steps = self.lifecycle.on_close(epoch, code, reason.as_deref());
                logger::debug(
                    self.settings.log_tag.clone(),
                    &format!(
                        "[{}] connection closed (epoch {}, code {:?})",
                        self.settings.name, epoch, code
                    ),
                );
                self.notify(ChannelNotice::Disconnected {
                    code,
                    reason,
                    intentional: false,
                });
                self.apply(steps);
            }
        }
    }

    fn apply(&mut self, steps: Vec<Step>) {
        for step in steps {
            match step {
                Step::Open { epoch } => {
                    logger::debug(
                        self.settings.log_tag.clone(),
                        &format!(
                            "[{}] opening {} (epoch {})",
                            self.settings.name, self.settings.address, epoch
                        ),
                    );
                    // Replacing a finished connection drops it
                    self.connection = Some(Connection::open(
                        epoch,
                        &self.settings.address,
                        self.transport.clone(),
                        self.events_tx.clone(),
                    ));
                }

                Step::Close { epoch } => {
                    *self.outbound.lock() = None;
                    if let Some(mut conn) = self.connection.take() {
                        if conn.epoch() != epoch {
                            logger::debug(
                                self.settings.log_tag.clone(),
                                &format!(
                                    "[{}] closing epoch {} while {} was requested",
                                    self.settings.name,
                                    conn.epoch(),
                                    epoch
                                ),
                            );
                        }
                        conn.close();
                    }
                }

                Step::ScheduleReconnect {
                    token,
                    attempt,
                    delay,
                } => {
                    let timer_tx = self.timer_tx.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = timer_tx.send(token);
                    });
                    if let Some((_, old)) = self.timer.replace((token, handle)) {
                        old.abort();
                    }

                    self.metrics.inc_reconnects();
                    logger::info(
                        self.settings.log_tag.clone(),
                        &format!(
                            "[{}] reconnecting in {}ms (attempt {})",
                            self.settings.name,
                            delay.as_millis(),
                            attempt
                        ),
                    );
                    self.notify(ChannelNotice::ReconnectScheduled { attempt, delay });
                }

                Step::CancelReconnect { token } => {
                    if let Some((armed, handle)) = self.timer.take() {
                        handle.abort();
                        if armed != token {
                            logger::debug(
                                self.settings.log_tag.clone(),
                                &format!(
                                    "[{}] cancelled timer {} while {} was requested",
                                    self.settings.name, armed, token
                                ),
                            );
                        }
                    }
                }

                Step::Exhausted { attempts } => {
                    let err = ChannelError::ReconnectBudgetExhausted { attempts };
                    logger::warning(
                        self.settings.log_tag.clone(),
                        &format!("[{}] {}; call connect() to retry", self.settings.name, err),
                    );
                    self.notify(ChannelNotice::ReconnectExhausted { attempts });
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        self.metrics.inc_received();

        let envelope = match EventEnvelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.inc_decode_failures();
                logger::warning(
                    self.settings.log_tag.clone(),
                    &format!("[{}] dropped frame: {}", self.settings.name, e),
                );
                self.notify(ChannelNotice::DecodeFailed {
                    error: e.to_string(),
                });
                return;
            }
        };

        // Clone the list so callbacks may (un)subscribe without deadlocking
        let listeners = self.registry.lock().listeners(&envelope.event_type);
        if listeners.is_empty() {
            self.metrics.inc_unhandled();
            logger::verbose(
                self.settings.log_tag.clone(),
                &format!(
                    "[{}] no subscribers for '{}'",
                    self.settings.name, envelope.event_type
                ),
            );
            return;
        }

        for callback in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&envelope))).is_err() {
                logger::error(
                    self.settings.log_tag.clone(),
                    &format!(
                        "[{}] subscriber for '{}' panicked",
                        self.settings.name, envelope.event_type
                    ),
                );
            }
        }
        self.metrics.inc_dispatched();
    }

    fn notify(&self, notice: ChannelNotice) {
        // No receivers is fine
        let _ = self.notices.send(notice);
    }

    fn publish_status(&self) {
        let status = self.lifecycle.status();
        self.status.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}
