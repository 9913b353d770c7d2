use serde::Serialize;
/// Channel metrics collection
///
/// Counters shared between the channel actor and its handles.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Sockets that reached the open state
    connections_opened: AtomicU64,

    /// Reconnects put on the timer
    reconnects_scheduled: AtomicU64,

    /// Text frames received on any connection
    frames_received: AtomicU64,

    /// Frames delivered to at least one subscriber
    frames_dispatched: AtomicU64,

    /// Decoded frames nobody subscribed to
    frames_unhandled: AtomicU64,

    /// Frames dropped because they failed to decode
    decode_failures: AtomicU64,

    /// Outbound frames handed to the socket
    messages_sent: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dispatched(&self) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unhandled(&self) {
        self.frames_unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot for display
    pub fn snapshot(&self) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            frames_unhandled: self.frames_unhandled.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot (serializable)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelMetricsSnapshot {
    pub connections_opened: u64,
    pub reconnects_scheduled: u64,
    pub frames_received: u64,
    pub frames_dispatched: u64,
    pub frames_unhandled: u64,
    pub decode_failures: u64,
    pub messages_sent: u64,
}
