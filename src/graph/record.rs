use serde::{Deserialize, Serialize};

use super::edge::Relationship;
use super::node::Node;

/// One entry of an externally supplied node/edge stream.
///
/// Records that come from outside the pipeline (a snapshot on disk, an
/// alternative storage backend) are discriminated by the `type` tag and then
/// replayed through [`KnowledgeGraph::from_records`](super::KnowledgeGraph::from_records),
/// which rejects duplicate ids and dangling endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GraphRecord {
    Node(Node),
    Relationship(Relationship),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::RelationshipKind;
    use crate::graph::node::NodeKind;

    #[test]
    fn test_records_are_tagged() {
        let node = GraphRecord::Node(Node::new(NodeKind::Function, "a.py", "f", 1));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "Node");
        assert_eq!(json["kind"], "Function");

        let rel = GraphRecord::Relationship(Relationship::new(RelationshipKind::Calls, "x", "y"));
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "Relationship");
        assert_eq!(json["kind"], "CALLS");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let bad = r#"{"type": "Hyperedge", "id": "x"}"#;
        assert!(serde_json::from_str::<GraphRecord>(bad).is_err());
    }
}
