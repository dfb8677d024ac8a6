use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::graph::KnowledgeGraph;
use crate::graph::record::GraphRecord;

/// Snapshot format version. Bump when `Node`/`Relationship` serialization changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot directory name (created in project root).
pub const SNAPSHOT_DIR: &str = ".repo-graph";
/// Snapshot file name within SNAPSHOT_DIR.
pub const SNAPSHOT_FILE: &str = "graph.json";

/// Envelope wrapping the record stream with version and origin metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    pub version: u32,
    pub project_root: PathBuf,
    pub records: Vec<GraphRecord>,
}

/// `<project_root>/.repo-graph/graph.json`
pub fn snapshot_path(project_root: &Path) -> PathBuf {
    project_root.join(SNAPSHOT_DIR).join(SNAPSHOT_FILE)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Save the graph atomically: write a temp file in the snapshot directory,
/// then rename it over the final path.
pub fn save_snapshot(project_root: &Path, graph: &KnowledgeGraph) -> Result<PathBuf, SnapshotError> {
    let dir = project_root.join(SNAPSHOT_DIR);
    std::fs::create_dir_all(&dir).map_err(io_error(&dir))?;

    let envelope = SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        project_root: project_root.to_path_buf(),
        records: graph.to_records(),
    };

    let target = snapshot_path(project_root);
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_error(&dir))?;
    serde_json::to_writer(&mut tmp, &envelope)?;
    tmp.as_file_mut().flush().map_err(io_error(&dir))?;
    tmp.persist(&target)?;

    tracing::debug!(
        nodes = graph.node_count(),
        relationships = graph.relationship_count(),
        "snapshot written to {}",
        target.display()
    );
    Ok(target)
}

/// Load and validate a snapshot.
///
/// The record stream is replayed through [`KnowledgeGraph::from_records`], so
/// a snapshot with duplicate ids or dangling relationships is rejected.
pub fn load_snapshot(project_root: &Path) -> Result<KnowledgeGraph, SnapshotError> {
    let target = snapshot_path(project_root);
    let bytes = std::fs::read(&target).map_err(io_error(&target))?;
    let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            found: envelope.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(KnowledgeGraph::from_records(envelope.records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::RelationshipKind;
    use crate::graph::node::{Node, NodeKind};

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let file = Node::new(NodeKind::File, "app.py", "app.py", 0);
        let func = Node::new(NodeKind::Function, "app.py", "main", 1);
        let (file_id, func_id) = (file.id.clone(), func.id.clone());
        graph.add_node(file);
        graph.add_node(func);
        graph.connect(RelationshipKind::Contains, &file_id, &func_id);
        graph
    }

    #[test]
    fn test_roundtrip_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let graph = sample_graph();
        let path = save_snapshot(dir.path(), &graph).unwrap();
        assert!(path.ends_with(".repo-graph/graph.json"));

        let loaded = load_snapshot(dir.path()).expect("snapshot should load");
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.relationship_count(), 1);
        assert!(loaded.node("Function:app.py:main:1").is_some());
    }

    #[test]
    fn test_load_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_snapshot(dir.path()),
            Err(SnapshotError::Io { .. })
        ));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(SNAPSHOT_DIR)).unwrap();
        std::fs::write(
            snapshot_path(dir.path()),
            r#"{"version": 999, "project_root": "/x", "records": []}"#,
        )
        .unwrap();
        assert!(matches!(
            load_snapshot(dir.path()),
            Err(SnapshotError::Version { found: 999, .. })
        ));
    }

    #[test]
    fn test_dangling_relationship_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(SNAPSHOT_DIR)).unwrap();
        let body = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "project_root": "/x",
            "records": [
                {"type": "Node", "id": "File:a.py:a.py:0", "kind": "File",
                 "properties": {"name": "a.py"}},
                {"type": "Relationship", "id": "CALLS:a->b", "kind": "CALLS",
                 "source": "File:a.py:a.py:0", "target": "Function:gone.py:f:1"}
            ]
        });
        std::fs::write(snapshot_path(dir.path()), body.to_string()).unwrap();
        assert!(matches!(
            load_snapshot(dir.path()),
            Err(SnapshotError::Graph(_))
        ));
    }
}
