/// General update channel
///
/// Broad live-update notifications (flow and device state). Consumers
/// subscribe by message type; the channel retries a bounded number of times
/// and then waits for an explicit `connect`.
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{
    ChannelSettings, ChannelStatus, EventEnvelope, ReconnectPolicy, ResilientChannel,
    SubscriptionHandle, Transport, WebSocketTransport,
};
use crate::config::UpdatesConfig;
use crate::errors::ChannelError;
use crate::logger::{self, LogTag};

pub const DEFAULT_ADDRESS: &str = "ws://localhost:8080";

/// Process-wide instance, only present once installed
static SHARED: OnceCell<UpdateChannel> = OnceCell::new();

#[derive(Clone)]
pub struct UpdateChannel {
    channel: ResilientChannel,
}

impl UpdateChannel {
    /// Channel to `address` over WebSocket
    pub fn new(address: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::with_transport(address, policy, Arc::new(WebSocketTransport::default()))
    }

    pub fn with_transport(
        address: impl Into<String>,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let settings =
            ChannelSettings::new("updates", address, policy).with_log_tag(LogTag::Updates);
        Self {
            channel: ResilientChannel::new(settings, transport),
        }
    }

    pub fn from_config(config: &UpdatesConfig) -> Self {
        Self::new(config.url.clone(), policy_from_config(config))
    }

    pub fn connect(&self) {
        self.channel.connect();
    }

    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    /// Subscribe to raw envelopes of `event_type`
    pub fn on<F>(&self, event_type: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.channel.subscribe(event_type, callback)
    }

    /// Subscribe with the `event` field decoded into `T`
    ///
    /// Frames whose `event` does not decode are logged and skipped for this
    /// subscriber only.
    pub fn on_typed<T, F>(&self, event_type: &str, callback: F) -> SubscriptionHandle
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(event_type, move |envelope| match envelope.event_as::<T>() {
                Ok(event) => callback(event),
                Err(e) => logger::warning(
                    LogTag::Updates,
                    &format!("'{}' event skipped: {}", envelope.event_type, e),
                ),
            })
    }

    pub fn off(&self, handle: &SubscriptionHandle) -> bool {
        self.channel.unsubscribe(handle)
    }

    /// Send an application message; object payloads are merged into the frame
    pub fn send(&self, event_type: &str, payload: Value) -> Result<(), ChannelError> {
        self.channel.send(&EventEnvelope::new(event_type, payload))
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn status(&self) -> ChannelStatus {
        self.channel.status()
    }

    /// Underlying channel, for notices, status watching and metrics
    pub fn channel(&self) -> &ResilientChannel {
        &self.channel
    }
}

pub fn policy_from_config(config: &UpdatesConfig) -> ReconnectPolicy {
    ReconnectPolicy::linear(
        Duration::from_millis(config.reconnect_base_delay_ms),
        config.max_reconnect_attempts,
    )
}

/// Install the process-wide update channel
///
/// Returns the channel back if one was already installed.
pub fn install_shared(channel: UpdateChannel) -> Result<(), UpdateChannel> {
    SHARED.set(channel)
}

/// The installed process-wide channel, if any
pub fn shared() -> Option<&'static UpdateChannel> {
    SHARED.get()
}
