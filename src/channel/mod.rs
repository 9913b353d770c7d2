/// Resilient live-event channel
///
/// Layers, leaf first:
/// - `transport`: opens a socket and yields a frame sink/stream
/// - `connection`: owns one socket, reports epoch-tagged notifications
/// - `lifecycle`: pure reconnection state machine
/// - `resilient`: actor tying connection, lifecycle and subscriptions together
pub mod connection;
pub mod lifecycle;
pub mod message;
pub mod metrics;
pub mod policy;
pub mod registry;
pub mod resilient;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Connection, ConnectionEvent, ConnectionSender};
pub use lifecycle::Epoch;
pub use message::EventEnvelope;
pub use metrics::ChannelMetricsSnapshot;
pub use policy::ReconnectPolicy;
pub use registry::{Callback, SubscriptionHandle};
pub use resilient::{ChannelSettings, ResilientChannel};
pub use state::{ChannelNotice, ChannelStatus, ConnectionState};
pub use transport::{FrameSink, FrameStream, InboundFrame, Transport, WebSocketTransport};
