use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, SimError};
use crate::event::{ClustersEvent, EventQueue, StatesEvent};

#[derive(Debug, Default)]
struct Queues {
    states: VecDeque<StatesEvent>,
    clusters: VecDeque<ClustersEvent>,
}

/// Process-local event queue.
///
/// Clones share the same queues, so a producer thread can hold one handle
/// while the simulation owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventQueue {
    inner: Arc<Mutex<Queues>>,
}

impl InMemoryEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Queues>> {
        self.inner
            .lock()
            .map_err(|_| SimError::Queue("in-memory queue lock poisoned".to_string()))
    }

    /// Number of pending `(states, clusters)` events.
    pub fn pending(&self) -> Result<(usize, usize)> {
        let q = self.lock()?;
        Ok((q.states.len(), q.clusters.len()))
    }
}

impl EventQueue for InMemoryEventQueue {
    fn write_states(&self, event: StatesEvent) -> Result<()> {
        self.lock()?.states.push_back(event);
        Ok(())
    }

    fn read_states(&self) -> Result<Option<StatesEvent>> {
        Ok(self.lock()?.states.pop_front())
    }

    fn write_clusters(&self, event: ClustersEvent) -> Result<()> {
        self.lock()?.clusters.push_back(event);
        Ok(())
    }

    fn read_clusters(&self) -> Result<Option<ClustersEvent>> {
        Ok(self.lock()?.clusters.pop_front())
    }

    fn cleanup(&self) -> Result<()> {
        let mut q = self.lock()?;
        q.states.clear();
        q.clusters.clear();
        Ok(())
    }
}
