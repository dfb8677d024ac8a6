pub mod edge;
pub mod node;
pub mod record;

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use crate::error::GraphError;

use edge::{Relationship, RelationshipKind};
use node::{Node, NodeKind};
use record::GraphRecord;

/// The in-memory knowledge graph: a directed petgraph `StableGraph` plus
/// O(1) lookup indexes by id, by kind, and by `(kind, source, target)` edge key.
///
/// Node and relationship iteration follows insertion order, which keeps query
/// output and snapshots deterministic for a fixed input.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: StableGraph<Node, Relationship, Directed>,
    id_index: HashMap<String, NodeIndex>,
    kind_index: HashMap<NodeKind, Vec<NodeIndex>>,
    edge_keys: HashSet<(RelationshipKind, NodeIndex, NodeIndex)>,
}

impl KnowledgeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. If a node with the same id already exists, the existing
    /// index is returned and the new node is dropped.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&existing) = self.id_index.get(&node.id) {
            debug_assert_eq!(
                self.graph[existing].kind, node.kind,
                "node id {} reused with a different kind",
                node.id
            );
            return existing;
        }
        let kind = node.kind;
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.kind_index.entry(kind).or_default().push(idx);
        idx
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.id_index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Mutable access for property updates. The kind of a node must not change.
    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let idx = *self.id_index.get(id)?;
        self.graph.node_weight_mut(idx)
    }

    /// Insert a relationship, skipping it when an edge with the same
    /// `(kind, source, target)` already exists.
    ///
    /// Returns `Ok(true)` when the edge was inserted, `Ok(false)` when it was a
    /// duplicate, and an error when either endpoint is missing.
    pub fn try_add_relationship(&mut self, rel: Relationship) -> Result<bool, GraphError> {
        let source = match self.id_index.get(&rel.source) {
            Some(&idx) => idx,
            None => {
                return Err(GraphError::DanglingEdge {
                    id: rel.id,
                    missing: rel.source,
                });
            }
        };
        let target = match self.id_index.get(&rel.target) {
            Some(&idx) => idx,
            None => {
                return Err(GraphError::DanglingEdge {
                    id: rel.id,
                    missing: rel.target,
                });
            }
        };
        if !self.edge_keys.insert((rel.kind, source, target)) {
            return Ok(false);
        }
        self.graph.add_edge(source, target, rel);
        Ok(true)
    }

    /// Insert a relationship built by the pipeline itself.
    ///
    /// A missing endpoint here is a builder bug: it asserts in debug builds and
    /// is dropped with a warning in release builds.
    pub fn add_relationship(&mut self, rel: Relationship) -> bool {
        match self.try_add_relationship(rel) {
            Ok(inserted) => inserted,
            Err(err) => {
                debug_assert!(false, "{err}");
                tracing::warn!("dropping relationship: {err}");
                false
            }
        }
    }

    /// Shorthand for an edge without properties.
    pub fn connect(&mut self, kind: RelationshipKind, source: &str, target: &str) -> bool {
        self.add_relationship(Relationship::new(kind, source, target))
    }

    pub fn has_relationship(&self, kind: RelationshipKind, source: &str, target: &str) -> bool {
        match (self.id_index.get(source), self.id_index.get(target)) {
            (Some(&s), Some(&t)) => self.edge_keys.contains(&(kind, s, t)),
            _ => false,
        }
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// All relationships in insertion order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.graph
            .edge_indices()
            .filter_map(move |idx| self.graph.edge_weight(idx))
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.kind_index
            .get(&kind)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.graph[idx])
    }

    /// Outgoing edges of `id` together with their target nodes.
    pub fn outgoing<'a>(
        &'a self,
        id: &str,
    ) -> impl Iterator<Item = (&'a Relationship, &'a Node)> + use<'a> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// Incoming edges of `id` together with their source nodes.
    pub fn incoming<'a>(
        &'a self,
        id: &str,
    ) -> impl Iterator<Item = (&'a Relationship, &'a Node)> + use<'a> {
        self.neighbours(id, Direction::Incoming)
    }

    fn neighbours<'a>(
        &'a self,
        id: &str,
        direction: Direction,
    ) -> impl Iterator<Item = (&'a Relationship, &'a Node)> + use<'a> {
        let start = self.id_index.get(id).copied();
        start.into_iter().flat_map(move |idx| {
            self.graph
                .edges_directed(idx, direction)
                .map(move |edge| {
                    let other = match direction {
                        Direction::Outgoing => edge.target(),
                        Direction::Incoming => edge.source(),
                    };
                    (edge.weight(), &self.graph[other])
                })
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relationship_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn count_nodes(&self, kind: NodeKind) -> usize {
        self.kind_index.get(&kind).map_or(0, Vec::len)
    }

    pub fn count_relationships(&self, kind: RelationshipKind) -> usize {
        self.relationships().filter(|r| r.kind == kind).count()
    }

    /// Verify the graph invariants: one node per id, indexes in sync with the
    /// backing graph, and every edge endpoint matching its stored node id.
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        if self.graph.node_count() != self.id_index.len() {
            return Err(GraphError::IndexMismatch(format!(
                "{} nodes but {} indexed ids",
                self.graph.node_count(),
                self.id_index.len()
            )));
        }
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            if self.id_index.get(&node.id) != Some(&idx) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        for edge in self.graph.edge_references() {
            let rel = edge.weight();
            if self.graph[edge.source()].id != rel.source {
                return Err(GraphError::DanglingEdge {
                    id: rel.id.clone(),
                    missing: rel.source.clone(),
                });
            }
            if self.graph[edge.target()].id != rel.target {
                return Err(GraphError::DanglingEdge {
                    id: rel.id.clone(),
                    missing: rel.target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Flatten the graph into a record stream: all nodes, then all relationships.
    pub fn to_records(&self) -> Vec<GraphRecord> {
        self.nodes()
            .cloned()
            .map(GraphRecord::Node)
            .chain(self.relationships().cloned().map(GraphRecord::Relationship))
            .collect()
    }

    /// Rebuild a graph from an external record stream.
    ///
    /// Nodes are inserted before relationships regardless of record order.
    /// Duplicate node ids and relationships with a missing endpoint are
    /// rejected rather than silently repaired.
    pub fn from_records(records: Vec<GraphRecord>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        let mut relationships = Vec::new();
        for record in records {
            match record {
                GraphRecord::Node(node) => {
                    if graph.contains_node(&node.id) {
                        return Err(GraphError::DuplicateNode(node.id));
                    }
                    graph.add_node(node);
                }
                GraphRecord::Relationship(rel) => relationships.push(rel),
            }
        }
        for rel in relationships {
            graph.try_add_relationship(rel)?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, line: usize) -> Node {
        Node::new(NodeKind::Function, "src/app.py", name, line)
    }

    #[test]
    fn test_add_duplicate_node_returns_same_index() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_node(function("main", 1));
        let b = graph.add_node(function("main", 1));
        assert_eq!(a, b, "duplicate add_node should return the same index");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_edge_insertion_is_idempotent() {
        let mut graph = KnowledgeGraph::new();
        let a = function("a", 1);
        let b = function("b", 5);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        graph.add_node(a);
        graph.add_node(b);
        assert!(graph.connect(RelationshipKind::Calls, &a_id, &b_id));
        assert!(!graph.connect(RelationshipKind::Calls, &a_id, &b_id));
        assert_eq!(graph.relationship_count(), 1, "same triple must yield one edge");
        // A different kind between the same pair is a different edge.
        assert!(graph.connect(RelationshipKind::Contains, &a_id, &b_id));
        assert_eq!(graph.relationship_count(), 2);
    }

    #[test]
    fn test_try_add_relationship_rejects_missing_endpoint() {
        let mut graph = KnowledgeGraph::new();
        let a = function("a", 1);
        let a_id = a.id.clone();
        graph.add_node(a);
        let err = graph
            .try_add_relationship(Relationship::new(RelationshipKind::Calls, &a_id, "nope"))
            .unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { .. }));
        assert_eq!(graph.relationship_count(), 0);
    }

    #[test]
    fn test_outgoing_and_incoming() {
        let mut graph = KnowledgeGraph::new();
        let file = Node::new(NodeKind::File, "src/app.py", "app.py", 0);
        let f = function("run", 3);
        let (file_id, f_id) = (file.id.clone(), f.id.clone());
        graph.add_node(file);
        graph.add_node(f);
        graph.connect(RelationshipKind::Contains, &file_id, &f_id);

        let out: Vec<_> = graph.outgoing(&file_id).map(|(_, n)| n.name()).collect();
        assert_eq!(out, vec!["run"]);
        let inc: Vec<_> = graph.incoming(&f_id).map(|(r, _)| r.kind).collect();
        assert_eq!(inc, vec![RelationshipKind::Contains]);
        assert_eq!(graph.outgoing("missing").count(), 0);
    }

    #[test]
    fn test_records_roundtrip_preserves_graph() {
        let mut graph = KnowledgeGraph::new();
        let a = function("a", 1);
        let b = function("b", 2);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        graph.add_node(a);
        graph.add_node(b);
        graph.connect(RelationshipKind::Calls, &a_id, &b_id);

        let rebuilt = KnowledgeGraph::from_records(graph.to_records()).unwrap();
        assert_eq!(rebuilt.node_count(), 2);
        assert!(rebuilt.has_relationship(RelationshipKind::Calls, &a_id, &b_id));
        assert!(rebuilt.check_integrity().is_ok());
    }

    #[test]
    fn test_from_records_rejects_duplicates_and_dangling() {
        let dup = vec![
            GraphRecord::Node(function("a", 1)),
            GraphRecord::Node(function("a", 1)),
        ];
        assert!(matches!(
            KnowledgeGraph::from_records(dup),
            Err(GraphError::DuplicateNode(_))
        ));

        let dangling = vec![
            GraphRecord::Node(function("a", 1)),
            GraphRecord::Relationship(Relationship::new(
                RelationshipKind::Calls,
                "Function:src/app.py:a:1",
                "Function:src/app.py:ghost:9",
            )),
        ];
        assert!(matches!(
            KnowledgeGraph::from_records(dangling),
            Err(GraphError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn test_nodes_of_kind() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(function("a", 1));
        graph.add_node(function("b", 2));
        graph.add_node(Node::new(NodeKind::Class, "src/app.py", "C", 4));
        assert_eq!(graph.count_nodes(NodeKind::Function), 2);
        assert_eq!(graph.nodes_of_kind(NodeKind::Class).count(), 1);
        assert_eq!(graph.nodes_of_kind(NodeKind::Enum).count(), 0);
    }
}
