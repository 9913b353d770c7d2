/// Error taxonomy for the live-event channels and the REST collaborator
///
/// Nothing here is fatal to the host process: transport failures drive the
/// reconnection policy, decode failures drop a single frame, and only
/// `NotConnected` is returned synchronously to a caller.
use thiserror::Error;

// =============================================================================
// CHANNEL ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Socket-level failure: refused, handshake failure, peer reset
    #[error("transport error: {0}")]
    Transport(String),

    /// A received frame does not follow the wire protocol
    #[error("decode error: {0}")]
    Decode(String),

    /// `send` attempted while the connection is not open
    #[error("not connected")]
    NotConnected,

    /// Bounded-retry channel gave up; an explicit connect is required
    #[error("reconnect budget exhausted after {attempts} attempts")]
    ReconnectBudgetExhausted { attempts: u32 },

    /// The channel's actor task has shut down
    #[error("channel closed")]
    Closed,
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        ChannelError::Decode(e.to_string())
    }
}

// =============================================================================
// API ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from the server; the local session has been cleared
    #[error("unauthorized: session invalidated")]
    Unauthorized,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_display() {
        assert_eq!(ChannelError::NotConnected.to_string(), "not connected");
        assert_eq!(
            ChannelError::ReconnectBudgetExhausted { attempts: 5 }.to_string(),
            "reconnect budget exhausted after 5 attempts"
        );
        assert_eq!(ChannelError::Closed.to_string(), "channel closed");
    }

    #[test]
    fn test_decode_error_from_serde() {
        let err: ChannelError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, ChannelError::Decode(_)));
    }
}
