/// Wire protocol - envelope decode/encode
///
/// Every frame is one JSON object:
/// `{ "type": string, "event"?: object, "timestamp": number, "message"?: string }`
///
/// The decoded envelope keeps the whole object as its payload, so both the
/// fixed fields (`event`, `message`) and any application-defined field stay
/// reachable by subscribers.
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::ChannelError;

// ============================================================================
// RECOGNIZED TYPES
// ============================================================================

/// Server handshake, carries `message`
pub const WELCOME: &str = "welcome";

/// One data unit observed crossing a node, carries a debug event in `event`
pub const DEBUG_EVENT: &str = "debug:event";

/// Latest status of one node, carries a health status event in `event`
pub const HEALTH_STATUS: &str = "health:status";

// ============================================================================
// ENVELOPE
// ============================================================================

/// Decoded unit of one inbound (or outbound) frame
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Value of the `type` field, dispatched by exact string match
    pub event_type: String,

    /// The full frame object
    pub payload: Value,

    /// Server timestamp (unix milliseconds), 0 when the frame carries none
    pub timestamp: i64,
}

impl EventEnvelope {
    /// Build an outbound envelope stamped with the current time
    ///
    /// Object payloads are merged into the frame; any other payload is
    /// carried under `event`.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        let event_type = event_type.into();
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut frame = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("event".to_string(), other);
                map
            }
        };
        frame.insert("type".to_string(), Value::String(event_type.clone()));
        frame.insert("timestamp".to_string(), Value::from(timestamp));

        Self {
            event_type,
            payload: Value::Object(frame),
            timestamp,
        }
    }

    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        let value: Value = serde_json::from_str(text)?;

        let object = value
            .as_object()
            .ok_or_else(|| ChannelError::Decode("frame is not a JSON object".to_string()))?;

        let event_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Decode("missing string field 'type'".to_string()))?
            .to_string();

        let timestamp = match object.get("timestamp") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(_) => {
                return Err(ChannelError::Decode(
                    "field 'timestamp' is not a number".to_string(),
                ))
            }
        };

        Ok(Self {
            event_type,
            payload: value,
            timestamp,
        })
    }

    /// Serialize to a text frame
    pub fn encode(&self) -> Result<String, ChannelError> {
        let mut frame = match &self.payload {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("event".to_string(), other.clone());
                map
            }
        };
        frame.insert("type".to_string(), Value::String(self.event_type.clone()));
        frame.insert("timestamp".to_string(), Value::from(self.timestamp));

        serde_json::to_string(&Value::Object(frame)).map_err(ChannelError::from)
    }

    /// The `event` field, if any
    pub fn event(&self) -> Option<&Value> {
        self.payload.get("event")
    }

    /// The `message` field, if any
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    /// Deserialize the `event` field into a typed value
    pub fn event_as<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        let event = self.event().ok_or_else(|| {
            ChannelError::Decode(format!("'{}' frame has no 'event' field", self.event_type))
        })?;
        T::deserialize(event).map_err(ChannelError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_welcome() {
        let env = EventEnvelope::decode(
            r#"{"type":"welcome","timestamp":1700000000000,"message":"Connected to Debug Events stream"}"#,
        )
        .unwrap();

        assert_eq!(env.event_type, WELCOME);
        assert_eq!(env.timestamp, 1_700_000_000_000);
        assert_eq!(env.message(), Some("Connected to Debug Events stream"));
        assert!(env.event().is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_frames() {
        assert!(matches!(EventEnvelope::decode("not json"), Err(ChannelError::Decode(_))));
        assert!(matches!(EventEnvelope::decode("[1,2]"), Err(ChannelError::Decode(_))));
        assert!(matches!(
            EventEnvelope::decode(r#"{"event":{}}"#),
            Err(ChannelError::Decode(_))
        ));
        assert!(matches!(
            EventEnvelope::decode(r#"{"type":7}"#),
            Err(ChannelError::Decode(_))
        ));
        assert!(matches!(
            EventEnvelope::decode(r#"{"type":"x","timestamp":"soon"}"#),
            Err(ChannelError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_or_float_timestamp() {
        let env = EventEnvelope::decode(r#"{"type":"flow:started","flowId":"f1"}"#).unwrap();
        assert_eq!(env.timestamp, 0);
        assert_eq!(env.payload["flowId"], "f1");

        let env = EventEnvelope::decode(r#"{"type":"x","timestamp":12.9}"#).unwrap();
        assert_eq!(env.timestamp, 12);
    }

    #[test]
    fn test_new_merges_object_payload() {
        let env = EventEnvelope::new("device:command", json!({"clientId": "esp-1", "cmd": "reboot"}));
        let text = env.encode().unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(back["type"], "device:command");
        assert_eq!(back["clientId"], "esp-1");
        assert_eq!(back["timestamp"], env.timestamp);

        let scalar = EventEnvelope::new("ping", json!(42));
        assert_eq!(scalar.event(), Some(&json!(42)));
    }

    #[test]
    fn test_event_as_typed() {
        #[derive(serde::Deserialize)]
        struct State {
            running: bool,
        }

        let env = EventEnvelope::decode(r#"{"type":"flow:state","event":{"running":true}}"#).unwrap();
        assert!(env.event_as::<State>().unwrap().running);

        let bare = EventEnvelope::decode(r#"{"type":"flow:state"}"#).unwrap();
        assert!(bare.event_as::<State>().is_err());
    }
}
