/// Debug/health telemetry channel
///
/// A resilient channel bound to the telemetry endpoint that keeps two pieces
/// of derived state for the dashboard:
/// - a newest-first buffer of recent debug events
/// - the last-known health status of every node
///
/// Both survive reconnects. An optional workflow filter is applied before
/// either is touched. Consumers bind the connection to their own lifetime
/// with `attach`.
pub mod buffer;
pub mod filter;
pub mod health;
pub mod polling;
pub mod types;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::message::{DEBUG_EVENT, HEALTH_STATUS, WELCOME};
use crate::channel::{
    ChannelSettings, ChannelStatus, EventEnvelope, ReconnectPolicy, ResilientChannel, Transport,
    WebSocketTransport,
};
use crate::config::TelemetryConfig;
use crate::logger::{self, LogTag};

pub use buffer::DebugEventBuffer;
pub use filter::WorkflowFilter;
pub use health::{HealthSummary, HealthTable};
pub use polling::PollingFeed;
pub use types::{DebugEvent, HealthStatus, HealthStatusEvent, UnitPayload};

pub const DEFAULT_ADDRESS: &str = "ws://localhost:8082";
pub const DEFAULT_MAX_EVENTS: usize = 50;

/// State fed by dispatch and read by consumers
struct TelemetryState {
    filter: WorkflowFilter,
    events: RwLock<DebugEventBuffer>,
    health: RwLock<HealthTable>,
}

impl TelemetryState {
    fn on_debug_event(&self, envelope: &EventEnvelope) {
        let event: DebugEvent = match envelope.event_as() {
            Ok(event) => event,
            Err(e) => {
                logger::warning(LogTag::Telemetry, &format!("debug event skipped: {}", e));
                return;
            }
        };
        if !self.filter.matches(&event.workflow_id) {
            logger::verbose(
                LogTag::Telemetry,
                &format!("debug event for {} filtered out", event.workflow_id),
            );
            return;
        }
        self.events.write().push(event);
    }

    fn on_health_status(&self, envelope: &EventEnvelope) {
        let event: HealthStatusEvent = match envelope.event_as() {
            Ok(event) => event,
            Err(e) => {
                logger::warning(LogTag::Telemetry, &format!("health status skipped: {}", e));
                return;
            }
        };
        if !self.filter.matches(&event.workflow_id) {
            return;
        }
        logger::debug(
            LogTag::Telemetry,
            &format!("node {} is {}", event.node_id, event.status),
        );
        self.health.write().upsert(event);
    }
}

#[derive(Clone)]
pub struct TelemetryChannel {
    channel: ResilientChannel,
    state: Arc<TelemetryState>,
    attachments: Arc<Mutex<usize>>,
}

impl TelemetryChannel {
    /// Telemetry channel to `address` over WebSocket
    pub fn new(address: impl Into<String>, policy: ReconnectPolicy, max_events: usize) -> Self {
        Self::with_transport(
            address,
            policy,
            max_events,
            Arc::new(WebSocketTransport::default()),
        )
    }

    pub fn with_transport(
        address: impl Into<String>,
        policy: ReconnectPolicy,
        max_events: usize,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let settings =
            ChannelSettings::new("telemetry", address, policy).with_log_tag(LogTag::Telemetry);
        let channel = ResilientChannel::new(settings, transport);

        let state = Arc::new(TelemetryState {
            filter: WorkflowFilter::default(),
            events: RwLock::new(DebugEventBuffer::new(max_events)),
            health: RwLock::new(HealthTable::new()),
        });

        // Callbacks hold the state only; holding the channel would keep its actor alive
        let s = state.clone();
        channel.subscribe(DEBUG_EVENT, move |env| s.on_debug_event(env));
        let s = state.clone();
        channel.subscribe(HEALTH_STATUS, move |env| s.on_health_status(env));
        channel.subscribe(WELCOME, |env| {
            logger::debug(
                LogTag::Telemetry,
                &format!("welcome: {}", env.message().unwrap_or("")),
            );
        });

        Self {
            channel,
            state,
            attachments: Arc::new(Mutex::new(0)),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(
            config.url.clone(),
            policy_from_config(config),
            config.max_buffered_events,
        )
    }

    /// Bind the connection to the returned guard
    ///
    /// The first live attachment connects; dropping the last one
    /// disconnects.
    pub fn attach(&self) -> Attachment {
        let mut count = self.attachments.lock();
        *count += 1;
        if *count == 1 {
            self.channel.connect();
        }
        Attachment {
            owner: self.clone(),
        }
    }

    pub fn attachment_count(&self) -> usize {
        *self.attachments.lock()
    }

    pub fn connect(&self) {
        self.channel.connect();
    }

    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    /// Manual reconnect; same as `connect`
    pub fn reconnect(&self) {
        self.channel.connect();
    }

    /// Restrict derived state to one workflow, `None` for all
    ///
    /// Already buffered events are kept.
    pub fn set_workflow(&self, workflow_id: Option<String>) {
        self.state.filter.set(workflow_id);
    }

    pub fn workflow(&self) -> Option<String> {
        self.state.filter.get()
    }

    pub fn filter(&self) -> WorkflowFilter {
        self.state.filter.clone()
    }

    /// Buffered debug events, newest first
    pub fn events(&self) -> Vec<DebugEvent> {
        self.state.events.read().snapshot()
    }

    pub fn health(&self) -> HashMap<String, HealthStatusEvent> {
        self.state.health.read().snapshot()
    }

    pub fn node_health(&self, node_id: &str) -> Option<HealthStatusEvent> {
        self.state.health.read().get(node_id).cloned()
    }

    pub fn health_summary(&self) -> HealthSummary {
        self.state.health.read().summary()
    }

    /// Empty the event buffer; health is kept
    pub fn clear(&self) {
        self.state.events.write().clear();
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Last connection-level error, cleared once a connection opens
    pub fn error(&self) -> Option<String> {
        self.channel.status().last_error
    }

    pub fn status(&self) -> ChannelStatus {
        self.channel.status()
    }

    pub fn channel(&self) -> &ResilientChannel {
        &self.channel
    }

    /// Merge events fetched outside the socket; returns how many were new
    pub fn ingest(&self, events: Vec<DebugEvent>) -> usize {
        let mut buffer = self.state.events.write();
        let mut added = 0;
        for event in events {
            if !self.state.filter.matches(&event.workflow_id) {
                continue;
            }
            if buffer.push_unique(event) {
                added += 1;
            }
        }
        added
    }

    fn release(&self) {
        let mut count = self.attachments.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.channel.disconnect();
        }
    }
}

pub fn policy_from_config(config: &TelemetryConfig) -> ReconnectPolicy {
    ReconnectPolicy::fixed(Duration::from_millis(config.reconnect_delay_ms))
}

/// Keeps the telemetry connection alive while held
pub struct Attachment {
    owner: TelemetryChannel,
}

impl Attachment {
    pub fn channel(&self) -> &TelemetryChannel {
        &self.owner
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.owner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::{MockServer, MockTransport};
    use crate::channel::ConnectionState;
    use serde_json::{json, Value};

    fn debug_frame(workflow: &str, node: &str, ts: i64) -> Value {
        json!({
            "type": "debug:event",
            "timestamp": ts,
            "event": {
                "flowId": workflow,
                "nodeId": node,
                "timestamp": ts,
                "uso": {"header": {}, "payloadType": "text", "payloadSize": 2, "payloadPreview": "hi"}
            }
        })
    }

    fn health_frame(workflow: &str, node: &str, status: &str) -> Value {
        json!({
            "type": "health:status",
            "timestamp": 1,
            "event": {
                "flowId": workflow,
                "nodeId": node,
                "nodeType": "ws_in",
                "status": status,
                "timestamp": 1
            }
        })
    }

    fn channel(transport: Arc<MockTransport>) -> TelemetryChannel {
        TelemetryChannel::with_transport(
            "mock://telemetry",
            ReconnectPolicy::fixed(Duration::from_millis(3000)),
            DEFAULT_MAX_EVENTS,
            transport,
        )
    }

    async fn wait_open(telemetry: &TelemetryChannel) {
        let mut status = telemetry.channel().watch_status();
        status
            .wait_for(|s| s.state == ConnectionState::Open)
            .await
            .unwrap();
    }

    async fn wait_received(telemetry: &TelemetryChannel, n: u64) {
        while telemetry.channel().metrics().frames_received < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn attached(
        telemetry: &TelemetryChannel,
        servers: &mut tokio::sync::mpsc::UnboundedReceiver<MockServer>,
    ) -> (Attachment, MockServer) {
        let attachment = telemetry.attach();
        wait_open(telemetry).await;
        let server = servers.recv().await.unwrap();
        (attachment, server)
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_keeps_fifty_newest() {
        let (transport, mut servers) = MockTransport::accepting();
        let telemetry = channel(transport);
        let (_attachment, server) = attached(&telemetry, &mut servers).await;

        for ts in 1..=75 {
            server.push_json(debug_frame("wf-A", "n1", ts));
        }
        wait_received(&telemetry, 75).await;

        let events = telemetry.events();
        assert_eq!(events.len(), 50);
        assert_eq!(events.first().map(|e| e.timestamp), Some(75));
        assert_eq!(events.last().map(|e| e.timestamp), Some(26));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_applies_before_state() {
        let (transport, mut servers) = MockTransport::accepting();
        let telemetry = channel(transport);
        telemetry.set_workflow(Some("wf-A".into()));
        let (_attachment, server) = attached(&telemetry, &mut servers).await;

        server.push_json(debug_frame("wf-A", "n1", 1));
        server.push_json(debug_frame("wf-B", "n2", 2));
        server.push_json(health_frame("wf-B", "n2", "error"));
        server.push_json(debug_frame("wf-A", "n3", 3));
        server.push_json(health_frame("wf-A", "n1", "healthy"));
        wait_received(&telemetry, 5).await;

        let events = telemetry.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.workflow_id == "wf-A"));
        assert_eq!(events[0].node_id, "n3");

        let health = telemetry.health();
        assert_eq!(health.len(), 1);
        assert!(health.contains_key("n1"));

        // Widening the filter only affects later frames; an empty id clears it
        telemetry.set_workflow(Some(String::new()));
        assert_eq!(telemetry.workflow(), None);
        server.push_json(debug_frame("wf-B", "n2", 4));
        wait_received(&telemetry, 6).await;
        assert_eq!(telemetry.events().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_upsert_and_welcome_noop() {
        let (transport, mut servers) = MockTransport::accepting();
        let telemetry = channel(transport);
        let (_attachment, server) = attached(&telemetry, &mut servers).await;

        server.push_json(json!({
            "type": "welcome",
            "timestamp": 1,
            "message": "Connected to Debug Events stream"
        }));
        server.push_json(health_frame("wf-A", "n1", "healthy"));
        server.push_json(health_frame("wf-A", "n1", "error"));
        wait_received(&telemetry, 3).await;

        let health = telemetry.health();
        assert_eq!(health.len(), 1);
        assert_eq!(health["n1"].status, HealthStatus::Error);
        assert!(telemetry.events().is_empty());
        assert_eq!(telemetry.health_summary().error, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_keeps_health() {
        let (transport, mut servers) = MockTransport::accepting();
        let telemetry = channel(transport);
        let (_attachment, server) = attached(&telemetry, &mut servers).await;

        server.push_json(debug_frame("wf-A", "n1", 1));
        server.push_json(health_frame("wf-A", "n1", "degraded"));
        wait_received(&telemetry, 2).await;

        telemetry.clear();
        assert!(telemetry.events().is_empty());
        assert_eq!(
            telemetry.node_health("n1").map(|e| e.status),
            Some(HealthStatus::Degraded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_survives_reconnect() {
        let (transport, mut servers) = MockTransport::accepting();
        let telemetry = channel(transport.clone());
        let (_attachment, server) = attached(&telemetry, &mut servers).await;

        server.push_json(debug_frame("wf-A", "n1", 1));
        server.push_json(health_frame("wf-A", "n1", "healthy"));
        wait_received(&telemetry, 2).await;

        drop(server);
        let _second = servers.recv().await.unwrap();
        wait_open(&telemetry).await;

        assert_eq!(transport.opens(), 2);
        assert_eq!(telemetry.events().len(), 1);
        assert_eq!(telemetry.health().len(), 1);
        assert_eq!(telemetry.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_attachment_drop_disconnects() {
        let (transport, mut servers) = MockTransport::accepting();
        let telemetry = channel(transport.clone());

        let first = telemetry.attach();
        let second = telemetry.attach();
        wait_open(&telemetry).await;
        let mut server = servers.recv().await.unwrap();
        assert_eq!(telemetry.attachment_count(), 2);

        drop(first);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(telemetry.is_connected());

        drop(second);
        assert_eq!(server.next_sent().await, None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(telemetry.channel().state(), ConnectionState::Disconnected);
        assert_eq!(transport.opens(), 1);

        // Re-attaching starts a fresh connection
        let _again = telemetry.attach();
        wait_open(&telemetry).await;
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_dedupes_and_filters() {
        let (transport, _servers) = MockTransport::accepting();
        let telemetry = channel(transport);
        telemetry.set_workflow(Some("wf-A".into()));

        let events: Vec<DebugEvent> = vec![
            serde_json::from_value(debug_frame("wf-A", "n1", 1)["event"].clone()).unwrap(),
            serde_json::from_value(debug_frame("wf-A", "n1", 1)["event"].clone()).unwrap(),
            serde_json::from_value(debug_frame("wf-B", "n1", 2)["event"].clone()).unwrap(),
            serde_json::from_value(debug_frame("wf-A", "n2", 3)["event"].clone()).unwrap(),
        ];

        assert_eq!(telemetry.ingest(events.clone()), 2);
        assert_eq!(telemetry.ingest(events), 0);
        assert_eq!(telemetry.events().len(), 2);
    }

    #[test]
    fn test_policy_from_config_defaults() {
        assert_eq!(
            policy_from_config(&TelemetryConfig::default()),
            ReconnectPolicy::fixed(Duration::from_millis(3000))
        );
    }
}
