/// Telemetry event types
///
/// The server spells the workflow fields `flowId`/`flowName` and the unit
/// payload `uso`; the longer names are accepted too.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Metadata of the data unit that crossed a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPayload {
    #[serde(default)]
    pub header: Value,
    pub payload_type: String,
    #[serde(default)]
    pub payload_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_preview: Option<String>,
}

/// One data unit observed at a debug node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEvent {
    #[serde(rename = "flowId", alias = "workflowId")]
    pub workflow_id: String,

    #[serde(
        rename = "flowName",
        alias = "workflowName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub workflow_name: Option<String>,

    pub node_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_label: Option<String>,

    pub timestamp: i64,

    /// Last unit of a streamed payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,

    #[serde(rename = "uso", alias = "unitPayload")]
    pub unit_payload: UnitPayload,
}

impl DebugEvent {
    /// Same node, timestamp and preview; used to skip re-polled events
    pub fn is_duplicate_of(&self, other: &DebugEvent) -> bool {
        self.node_id == other.node_id
            && self.timestamp == other.timestamp
            && self.unit_payload.payload_preview == other.unit_payload.payload_preview
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Latest reported status of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusEvent {
    #[serde(rename = "flowId", alias = "workflowId")]
    pub workflow_id: String,

    #[serde(
        rename = "flowName",
        alias = "workflowName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub workflow_name: Option<String>,

    pub node_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_label: Option<String>,

    pub node_type: String,

    pub status: HealthStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_clients: Option<u32>,

    pub timestamp: i64,
}
