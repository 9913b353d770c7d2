/// Last-known health status per node
///
/// Entries are replaced in arrival order and never evicted.
use serde::Serialize;
use std::collections::HashMap;

use super::types::{HealthStatus, HealthStatusEvent};

#[derive(Debug, Clone, Default)]
pub struct HealthTable {
    nodes: HashMap<String, HealthStatusEvent>,
}

/// Node counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub healthy: usize,
    pub degraded: usize,
    pub error: usize,
}

impl HealthSummary {
    pub fn total(&self) -> usize {
        self.healthy + self.degraded + self.error
    }

    /// Worst status present, `None` when no node has reported
    pub fn overall(&self) -> Option<HealthStatus> {
        if self.error > 0 {
            Some(HealthStatus::Error)
        } else if self.degraded > 0 {
            Some(HealthStatus::Degraded)
        } else if self.healthy > 0 {
            Some(HealthStatus::Healthy)
        } else {
            None
        }
    }
}

impl HealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is stored for the event's node
    pub fn upsert(&mut self, event: HealthStatusEvent) {
        self.nodes.insert(event.node_id.clone(), event);
    }

    pub fn get(&self, node_id: &str) -> Option<&HealthStatusEvent> {
        self.nodes.get(node_id)
    }

    pub fn snapshot(&self) -> HashMap<String, HealthStatusEvent> {
        self.nodes.clone()
    }

    pub fn summary(&self) -> HealthSummary {
        let mut summary = HealthSummary::default();
        for event in self.nodes.values() {
            match event.status {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Degraded => summary.degraded += 1,
                HealthStatus::Error => summary.error += 1,
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(node: &str, status: HealthStatus, timestamp: i64) -> HealthStatusEvent {
        HealthStatusEvent {
            workflow_id: "wf-A".into(),
            workflow_name: None,
            node_id: node.into(),
            node_label: None,
            node_type: "ws_in".into(),
            status,
            message: None,
            connected_clients: None,
            timestamp,
        }
    }

    #[test]
    fn test_later_arrival_replaces() {
        let mut table = HealthTable::new();
        table.upsert(status("n1", HealthStatus::Healthy, 10));
        table.upsert(status("n1", HealthStatus::Error, 20));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("n1").map(|e| e.status), Some(HealthStatus::Error));
    }

    #[test]
    fn test_arrival_order_wins_over_timestamp() {
        let mut table = HealthTable::new();
        table.upsert(status("n1", HealthStatus::Error, 20));
        table.upsert(status("n1", HealthStatus::Healthy, 5));

        assert_eq!(table.get("n1").map(|e| e.status), Some(HealthStatus::Healthy));
    }

    #[test]
    fn test_summary_counts() {
        let mut table = HealthTable::new();
        assert_eq!(table.summary().overall(), None);

        table.upsert(status("n1", HealthStatus::Healthy, 1));
        table.upsert(status("n2", HealthStatus::Degraded, 1));
        table.upsert(status("n3", HealthStatus::Healthy, 1));

        let summary = table.summary();
        assert_eq!(
            summary,
            HealthSummary {
                healthy: 2,
                degraded: 1,
                error: 0
            }
        );
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.overall(), Some(HealthStatus::Degraded));
    }
}
