/// Connection state and the status snapshot published by a channel
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// State of the channel's current connection
///
/// `Closing` is only held by a `Connection` while its socket shuts down.
/// A channel detaches the connection before closing it, so channel status
/// goes from `Open` to `Disconnected` in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    /// A socket exists and a new attempt must not start
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub state: ConnectionState,

    /// Reconnect attempts since the last successful open
    pub attempts: u32,

    /// Bounded retry gave up; only an explicit connect resumes
    pub exhausted: bool,

    /// Last connection-level error, cleared on open
    pub last_error: Option<String>,
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            exhausted: false,
            last_error: None,
        }
    }
}

/// Lifecycle notifications broadcast to observers
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotice {
    Connected {
        epoch: u64,
    },
    Disconnected {
        code: Option<u16>,
        reason: Option<String>,
        intentional: bool,
    },
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
    },
    ReconnectExhausted {
        attempts: u32,
    },
    DecodeFailed {
        error: String,
    },
}
