//! Bounded FIFO offline queue for heartbeats that failed to transmit.
//!
//! Persisted to disk (atomic write-replace) so a restart doesn't lose
//! telemetry collected while the server was unreachable. When full, the
//! oldest entry is dropped so the most recent telemetry survives — the
//! queue never grows unbounded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::HeartbeatRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedHeartbeat {
    pub request: HeartbeatRequest,
}

#[derive(Debug)]
pub struct OfflineQueue {
    path: PathBuf,
    max_len: usize,
    entries: Vec<QueuedHeartbeat>,
}

impl OfflineQueue {
    /// Load the queue from disk, or start empty if the file doesn't exist
    /// or fails to parse — a corrupt queue file should never block startup.
    #[must_use]
    pub fn load(path: PathBuf, max_len: usize) -> Self {
        let entries = read_entries(&path).unwrap_or_default();
        Self { path, max_len, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push a heartbeat that failed to transmit. Drops the oldest entry
    /// first if the queue is already at capacity.
    pub fn push(&mut self, request: HeartbeatRequest) -> std::io::Result<()> {
        if self.entries.len() >= self.max_len {
            self.entries.remove(0);
        }
        self.entries.push(QueuedHeartbeat { request });
        self.save()
    }

    /// Remove and return the oldest entry without persisting — callers
    /// drain the queue best-effort and re-enqueue on failure via `push`.
    pub fn pop_front(&mut self) -> Option<QueuedHeartbeat> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let serialized = serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_owned());
        crate::fsutil::write_atomic(&self.path, &serialized)
    }
}

fn read_entries(path: &Path) -> Option<Vec<QueuedHeartbeat>> {
    if !path.exists() {
        return None;
    }
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::HeartbeatRequest;

    fn sample(idle: u64) -> HeartbeatRequest {
        HeartbeatRequest {
            idle_seconds: idle,
            cpu_usage: None,
            memory_usage: None,
            timestamp: None,
            ip: None,
        }
    }

    #[test]
    fn push_past_capacity_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = OfflineQueue::load(dir.path().join("queue.json"), 2);
        queue.push(sample(1)).unwrap();
        queue.push(sample(2)).unwrap();
        queue.push(sample(3)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().unwrap().request.idle_seconds, 2);
        assert_eq!(queue.pop_front().unwrap().request.idle_seconds, 3);
    }

    #[test]
    fn reloading_restores_persisted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        {
            let mut queue = OfflineQueue::load(path.clone(), 10);
            queue.push(sample(42)).unwrap();
        }
        let mut reloaded = OfflineQueue::load(path, 10);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.pop_front().unwrap().request.idle_seconds, 42);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = OfflineQueue::load(dir.path().join("missing.json"), 10);
        assert!(queue.is_empty());
    }
}
