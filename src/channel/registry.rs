/// Subscription registry
///
/// Event-type string → ordered list of callbacks. Handles are stable values
/// so consumers unsubscribe without holding on to the callback itself.
use std::collections::HashMap;
use std::sync::Arc;

use super::message::EventEnvelope;

/// Subscriber callback, invoked on the channel's actor task
pub type Callback = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    event_type: String,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

struct Registration {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    by_type: HashMap<String, Vec<Registration>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event_type`
    ///
    /// The same `Arc` registered twice for one type keeps its first
    /// registration and returns the original handle.
    pub fn subscribe(&mut self, event_type: &str, callback: Callback) -> SubscriptionHandle {
        let list = self.by_type.entry(event_type.to_string()).or_default();

        if let Some(existing) = list
            .iter()
            .find(|r| same_callback(&r.callback, &callback))
        {
            return SubscriptionHandle {
                id: existing.id,
                event_type: event_type.to_string(),
            };
        }

        self.next_id += 1;
        let id = self.next_id;
        list.push(Registration { id, callback });

        SubscriptionHandle {
            id,
            event_type: event_type.to_string(),
        }
    }

    /// Remove a registration; false when it was already gone
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        let Some(list) = self.by_type.get_mut(&handle.event_type) else {
            return false;
        };

        let before = list.len();
        list.retain(|r| r.id != handle.id);
        let removed = list.len() != before;

        if list.is_empty() {
            self.by_type.remove(&handle.event_type);
        }
        removed
    }

    /// Callbacks for `event_type` in registration order
    pub fn listeners(&self, event_type: &str) -> Vec<Callback> {
        self.by_type
            .get(event_type)
            .map(|list| list.iter().map(|r| r.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.by_type.get(event_type).map(Vec::len).unwrap_or(0)
    }

    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.by_type.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

fn same_callback(a: &Callback, b: &Callback) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
