//! Event transport feeding external state and cluster updates into a run.
//!
//! Two FIFO channels, one per event kind. Producers may be concurrent; the
//! simulation loop is the only consumer and pops at most one event of each
//! kind per tick.

pub mod memory;
pub mod spool;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::InMemoryEventQueue;
pub use spool::SpoolEventQueue;

use crate::error::Result;

/// A batch of partial agent states, keyed by agent name.
///
/// States stay raw JSON until applied so one malformed entry does not
/// reject the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatesEvent {
    pub states: BTreeMap<String, Value>,
}

/// A full replacement cluster configuration, keyed by cluster name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClustersEvent {
    pub clusters: BTreeMap<String, Value>,
}

/// FIFO queues for state and cluster events.
pub trait EventQueue {
    fn write_states(&self, event: StatesEvent) -> Result<()>;

    /// Pops the oldest state event, if any.
    fn read_states(&self) -> Result<Option<StatesEvent>>;

    fn write_clusters(&self, event: ClustersEvent) -> Result<()>;

    /// Pops the oldest cluster event, if any.
    fn read_clusters(&self) -> Result<Option<ClustersEvent>>;

    /// Drops every pending event.
    fn cleanup(&self) -> Result<()>;
}

impl<T: EventQueue + ?Sized> EventQueue for Box<T> {
    fn write_states(&self, event: StatesEvent) -> Result<()> {
        (**self).write_states(event)
    }

    fn read_states(&self) -> Result<Option<StatesEvent>> {
        (**self).read_states()
    }

    fn write_clusters(&self, event: ClustersEvent) -> Result<()> {
        (**self).write_clusters(event)
    }

    fn read_clusters(&self) -> Result<Option<ClustersEvent>> {
        (**self).read_clusters()
    }

    fn cleanup(&self) -> Result<()> {
        (**self).cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_shapes() {
        let event: StatesEvent =
            serde_json::from_value(json!({"states": {"AGENT0": {"power_rating": 10.0}}})).unwrap();
        assert_eq!(event.states["AGENT0"]["power_rating"], 10.0);

        let event: ClustersEvent = serde_json::from_value(json!({"clusters": {}})).unwrap();
        assert!(event.clusters.is_empty());
    }
}
