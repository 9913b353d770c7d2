/// Bounded newest-first buffer of debug events
use std::collections::VecDeque;

use super::types::DebugEvent;

#[derive(Debug, Clone)]
pub struct DebugEventBuffer {
    events: VecDeque<DebugEvent>,
    capacity: usize,
}

impl DebugEventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend `event`, evicting the oldest entry past capacity
    pub fn push(&mut self, event: DebugEvent) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    /// Prepend unless an equal event is already buffered; true when added
    pub fn push_unique(&mut self, event: DebugEvent) -> bool {
        if self.events.iter().any(|e| e.is_duplicate_of(&event)) {
            return false;
        }
        self.push(event);
        true
    }

    /// Newest first
    pub fn snapshot(&self) -> Vec<DebugEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::types::UnitPayload;
    use serde_json::Value;

    fn event(n: i64) -> DebugEvent {
        DebugEvent {
            workflow_id: "wf-A".into(),
            workflow_name: None,
            node_id: format!("n{}", n % 3),
            node_label: None,
            timestamp: n,
            is_final: None,
            unit_payload: UnitPayload {
                header: Value::Null,
                payload_type: "text".into(),
                payload_size: 1,
                payload_preview: Some(format!("p{}", n)),
            },
        }
    }

    #[test]
    fn test_keeps_newest_up_to_capacity() {
        let mut buffer = DebugEventBuffer::new(50);
        for n in 1..=120 {
            buffer.push(event(n));
            assert!(buffer.len() <= 50);
        }

        let timestamps: Vec<i64> = buffer.snapshot().iter().map(|e| e.timestamp).collect();
        let expected: Vec<i64> = (71..=120).rev().collect();
        assert_eq!(timestamps, expected);
    }

    #[test]
    fn test_push_unique_skips_duplicates() {
        let mut buffer = DebugEventBuffer::new(5);
        assert!(buffer.push_unique(event(1)));
        assert!(!buffer.push_unique(event(1)));

        let mut other_preview = event(1);
        other_preview.unit_payload.payload_preview = Some("different".into());
        assert!(buffer.push_unique(other_preview));
        assert_eq!(buffer.len(), 2);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 5);
    }
}
