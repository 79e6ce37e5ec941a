//! Registry of upstream task ids the relay has forwarded.
//!
//! A stop request is only honored for an id this relay has seen on one of its
//! live streams. Ids are forgotten when their stream ends; the registry is
//! bounded and drops the oldest entries first.

use docstream_domain::{DocumentId, UpstreamTaskId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
struct Entries {
    by_task: HashMap<UpstreamTaskId, DocumentId>,
    order: VecDeque<UpstreamTaskId>,
}

/// Bounded set of live upstream task ids
#[derive(Debug)]
pub struct TaskRegistry {
    entries: Mutex<Entries>,
    capacity: usize,
}

impl TaskRegistry {
    /// Create a registry holding at most `capacity` ids
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    /// Record an id announced on the stream for `document_id`
    ///
    /// Returns `true` when the id was not known before.
    pub fn observe(&self, task_id: &UpstreamTaskId, document_id: &DocumentId) -> bool {
        let mut entries = self.entries.lock();
        if entries.by_task.contains_key(task_id) {
            return false;
        }
        while entries.order.len() >= self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.by_task.remove(&oldest);
                }
                None => break,
            }
        }
        entries.order.push_back(task_id.clone());
        entries.by_task.insert(task_id.clone(), document_id.clone());
        true
    }

    /// Document the id belongs to, if the id is live
    pub fn lookup(&self, task_id: &UpstreamTaskId) -> Option<DocumentId> {
        self.entries.lock().by_task.get(task_id).cloned()
    }

    /// Forget an id once its stream has ended
    pub fn forget(&self, task_id: &UpstreamTaskId) {
        let mut entries = self.entries.lock();
        if entries.by_task.remove(task_id).is_some() {
            entries.order.retain(|id| id != task_id);
        }
    }

    /// Number of live ids
    pub fn len(&self) -> usize {
        self.entries.lock().by_task.len()
    }

    /// Whether no id is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
