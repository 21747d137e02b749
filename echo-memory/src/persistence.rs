//! Snapshot persistence
//!
//! Serializes the full hypergraph (nodes + edges, embeddings as raw arrays)
//! to a versioned JSON record under the configured storage directory, and
//! restores it on startup. A missing, corrupt, or future-versioned snapshot
//! never blocks startup; the engine comes up empty with a warning instead.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::node::{MemoryEdge, MemoryNode};

/// On-disk snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_FILE: &str = "snapshot.json";

/// Serialized form of the full store
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version marker
    pub version: u32,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Every stored node
    pub nodes: Vec<MemoryNode>,
    /// Every stored edge
    pub edges: Vec<MemoryEdge>,
}

impl Snapshot {
    /// Wrap exported collections in the current format version
    pub fn new(nodes: Vec<MemoryNode>, edges: Vec<MemoryEdge>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            nodes,
            edges,
        }
    }
}

/// Writes and restores snapshots at a storage directory
#[derive(Debug, Clone)]
pub struct SnapshotGateway {
    dir: PathBuf,
}

impl SnapshotGateway {
    /// Create a gateway, creating the storage directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the snapshot record
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Serialize and atomically replace the snapshot file
    ///
    /// Writes to a temp file first and renames into place, so an interrupted
    /// save never clobbers the previous snapshot.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, self.snapshot_path())?;
        log::debug!(
            "Saved snapshot: {} nodes, {} edges",
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Ok(())
    }

    /// Save with a single retry
    pub fn save_with_retry(&self, snapshot: &Snapshot) -> Result<()> {
        if let Err(first) = self.save(snapshot) {
            log::warn!("Snapshot save failed, retrying once: {first}");
            return self.save(snapshot);
        }
        Ok(())
    }

    /// Load the snapshot if a readable one exists
    ///
    /// Missing files mean a fresh store. Unreadable or over-versioned files
    /// are logged and treated as absent.
    pub fn load(&self) -> Option<Snapshot> {
        let path = self.snapshot_path();
        if !path.exists() {
            log::debug!("No snapshot at {}, starting empty", path.display());
            return None;
        }

        match self.read_snapshot(&path) {
            Ok(snapshot) => {
                log::info!(
                    "Loaded snapshot with {} nodes and {} edges",
                    snapshot.nodes.len(),
                    snapshot.edges.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("Ignoring unreadable snapshot at {}: {e}", path.display());
                None
            }
        }
    }

    fn read_snapshot(&self, path: &Path) -> Result<Snapshot> {
        let bytes = fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(MemoryError::snapshot(format!(
                "unsupported snapshot version {} (newest known: {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MemoryNode, MemoryType};
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let a = MemoryNode::builder()
            .content("persisted fact")
            .memory_type(MemoryType::Semantic)
            .echo_value(0.8)
            .embeddings(vec![0.1, 0.2, 0.3])
            .build()
            .unwrap();
        let b = MemoryNode::new("persisted event", MemoryType::Episodic);
        let edge = crate::node::MemoryEdge::new(a.id, b.id, "derived_from").with_weight(0.7);
        Snapshot::new(vec![a, b], vec![edge])
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let gateway = SnapshotGateway::new(dir.path()).unwrap();

        let snapshot = sample_snapshot();
        gateway.save(&snapshot).unwrap();

        let restored = gateway.load().unwrap();
        assert_eq!(restored.version, SNAPSHOT_VERSION);
        assert_eq!(restored.nodes.len(), 2);
        assert_eq!(restored.edges.len(), 1);

        let original = &snapshot.nodes[0];
        let loaded = restored
            .nodes
            .iter()
            .find(|n| n.id == original.id)
            .unwrap();
        assert_eq!(loaded.content, original.content);
        assert_eq!(loaded.memory_type, original.memory_type);
        assert_eq!(loaded.echo_value, original.echo_value);
        assert_eq!(loaded.embeddings, original.embeddings);
        assert_eq!(restored.edges[0].weight, 0.7);
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = TempDir::new().unwrap();
        let gateway = SnapshotGateway::new(dir.path().join("nested")).unwrap();
        assert!(gateway.load().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let gateway = SnapshotGateway::new(dir.path()).unwrap();

        fs::write(gateway.snapshot_path(), b"{ not json").unwrap();
        assert!(gateway.load().is_none());
    }

    #[test]
    fn test_future_version_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let gateway = SnapshotGateway::new(dir.path()).unwrap();

        let mut snapshot = sample_snapshot();
        snapshot.version = SNAPSHOT_VERSION + 1;
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        fs::write(gateway.snapshot_path(), bytes).unwrap();

        assert!(gateway.load().is_none());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let gateway = SnapshotGateway::new(dir.path()).unwrap();

        gateway.save(&sample_snapshot()).unwrap();
        let single = Snapshot::new(
            vec![MemoryNode::new("only one left", MemoryType::Declarative)],
            vec![],
        );
        gateway.save_with_retry(&single).unwrap();

        let restored = gateway.load().unwrap();
        assert_eq!(restored.nodes.len(), 1);
        assert_eq!(restored.nodes[0].content, "only one left");
    }
}
