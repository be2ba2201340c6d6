use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{Result, SimError};
use crate::event::{ClustersEvent, EventQueue, StatesEvent};

const STATES_DIR: &str = "states";
const CLUSTERS_DIR: &str = "clusters";

/// Directory-backed event queue shared between processes.
///
/// Each event is one JSON file under `<root>/states` or `<root>/clusters`.
/// File names start with a zero-padded timestamp so lexical order is
/// arrival order. Files are written under a temporary name and renamed into
/// place, so a reader never sees a half-written event.
#[derive(Debug)]
pub struct SpoolEventQueue {
    root: PathBuf,
    counter: AtomicU64,
}

impl SpoolEventQueue {
    /// Opens (and creates if needed) a spool rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in [STATES_DIR, CLUSTERS_DIR] {
            fs::create_dir_all(root.join(kind))?;
        }
        Ok(Self {
            root,
            counter: AtomicU64::new(0),
        })
    }

    fn push<T: Serialize>(&self, kind: &str, event: &T) -> Result<()> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SimError::Queue(e.to_string()))?
            .as_nanos();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let stem = format!("{nanos:024}-{:010}-{seq:08}", process::id());
        let dir = self.root.join(kind);
        let tmp = dir.join(format!(".{stem}.tmp"));
        fs::write(&tmp, serde_json::to_vec(event)?)?;
        fs::rename(&tmp, dir.join(format!("{stem}.json")))?;
        Ok(())
    }

    fn pending_files(&self, kind: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.root.join(kind))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pops the oldest well-formed event. Malformed files are dropped.
    fn pop<T: DeserializeOwned>(&self, kind: &str) -> Result<Option<T>> {
        for path in self.pending_files(kind)? {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // another consumer got there first
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
            match serde_json::from_slice(&bytes) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => warn!(file = %path.display(), error = %e, "dropping malformed event"),
            }
        }
        Ok(None)
    }

    fn clear(&self, kind: &str) -> Result<()> {
        for path in self.pending_files(kind)? {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl EventQueue for SpoolEventQueue {
    fn write_states(&self, event: StatesEvent) -> Result<()> {
        self.push(STATES_DIR, &event)
    }

    fn read_states(&self) -> Result<Option<StatesEvent>> {
        self.pop(STATES_DIR)
    }

    fn write_clusters(&self, event: ClustersEvent) -> Result<()> {
        self.push(CLUSTERS_DIR, &event)
    }

    fn read_clusters(&self) -> Result<Option<ClustersEvent>> {
        self.pop(CLUSTERS_DIR)
    }

    fn cleanup(&self) -> Result<()> {
        self.clear(STATES_DIR)?;
        self.clear(CLUSTERS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn states(tag: f64) -> StatesEvent {
        StatesEvent {
            states: [("AGENT0".to_string(), json!({"power_rating": tag}))].into(),
        }
    }

    #[test]
    fn test_fifo_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let producer = SpoolEventQueue::open(dir.path()).unwrap();
        producer.write_states(states(1.0)).unwrap();
        producer.write_states(states(2.0)).unwrap();

        let consumer = SpoolEventQueue::open(dir.path()).unwrap();
        assert_eq!(consumer.read_states().unwrap(), Some(states(1.0)));
        assert_eq!(consumer.read_states().unwrap(), Some(states(2.0)));
        assert_eq!(consumer.read_states().unwrap(), None);
        assert_eq!(consumer.read_clusters().unwrap(), None);
    }

    #[test]
    fn test_malformed_event_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let queue = SpoolEventQueue::open(dir.path()).unwrap();
        fs::write(dir.path().join("states").join("0-broken.json"), b"{not json").unwrap();
        queue.write_states(states(3.0)).unwrap();

        assert_eq!(queue.read_states().unwrap(), Some(states(3.0)));
        assert!(queue.pending_files(STATES_DIR).unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_empties_both_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let queue = SpoolEventQueue::open(dir.path()).unwrap();
        queue.write_states(states(1.0)).unwrap();
        queue.write_clusters(ClustersEvent::default()).unwrap();
        queue.cleanup().unwrap();
        assert_eq!(queue.read_states().unwrap(), None);
        assert_eq!(queue.read_clusters().unwrap(), None);
    }
}
