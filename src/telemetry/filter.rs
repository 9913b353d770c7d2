/// Workflow filter shared between the consumer and the dispatch path
///
/// Read at every dispatch; a change applies to frames dispatched after it.
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    workflow_id: Arc<RwLock<Option<String>>>,
}

impl WorkflowFilter {
    pub fn new(workflow_id: Option<String>) -> Self {
        Self {
            workflow_id: Arc::new(RwLock::new(normalize(workflow_id))),
        }
    }

    /// `None` or an empty id accepts every workflow
    pub fn set(&self, workflow_id: Option<String>) {
        *self.workflow_id.write() = normalize(workflow_id);
    }

    pub fn get(&self) -> Option<String> {
        self.workflow_id.read().clone()
    }

    pub fn matches(&self, workflow_id: &str) -> bool {
        match self.workflow_id.read().as_deref() {
            Some(wanted) => wanted == workflow_id,
            None => true,
        }
    }
}

fn normalize(workflow_id: Option<String>) -> Option<String> {
    workflow_id.filter(|id| !id.is_empty())
}
