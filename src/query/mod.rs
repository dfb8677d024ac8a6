//! Read-only query engine over a [`KnowledgeGraph`].
//!
//! Query text is recognised by [`parser::parse_query`], evaluated by
//! [`execute::execute`], and successful results are memoised in a small LRU
//! keyed by `(text, limit, offset)`.

pub mod execute;
pub mod parser;
pub mod paths;

use lru::LruCache;
use serde::Serialize;

use crate::cache::capacity;
use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::graph::KnowledgeGraph;
use crate::graph::edge::Relationship;
use crate::graph::node::Node;

pub use parser::{Query, parse_query};
pub use paths::GraphPath;

/// Row window applied after matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Everything a query produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Distinct nodes referenced by the returned rows.
    pub nodes: Vec<Node>,
    /// Distinct relationships referenced by the returned rows.
    pub relationships: Vec<Relationship>,
    /// One JSON object per row, keyed by RETURN column.
    pub data: Vec<serde_json::Value>,
    /// Paths found by a variable-length pattern; empty for other shapes.
    pub paths: Vec<GraphPath>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.data.len()
    }
}

type CacheKey = (String, Option<usize>, usize);

pub struct QueryEngine<'g> {
    graph: &'g KnowledgeGraph,
    config: QueryConfig,
    cache: LruCache<CacheKey, QueryResult>,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g KnowledgeGraph, config: QueryConfig) -> Self {
        let cache = LruCache::new(capacity(config.query_cache_capacity));
        Self {
            graph,
            config,
            cache,
        }
    }

    /// Parse and evaluate `text`. Errors are never cached, and the engine
    /// stays usable after one.
    pub fn execute_query(
        &mut self,
        text: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, QueryError> {
        let key = (text.trim().to_owned(), options.limit, options.offset);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(query = %key.0, "query cache hit");
            return Ok(hit.clone());
        }

        let query = parse_query(&key.0, self.config.default_max_depth)?;
        let result = execute::execute(self.graph, &query, &self.config, &options);
        tracing::debug!(query = %key.0, rows = result.row_count(), "query executed");
        self.cache.put(key, result.clone());
        Ok(result)
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::RelationshipKind;
    use crate::graph::node::NodeKind;

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for i in 0..7 {
            graph.add_node(Node::new(NodeKind::Function, "lib.py", &format!("func_{i}"), i + 1));
        }
        for i in 0..3 {
            graph.add_node(Node::new(NodeKind::Method, "lib.py", &format!("method_{i}"), i + 20));
        }
        graph.add_node(Node::new(NodeKind::Class, "lib.py", "UserService", 19));
        graph
    }

    fn call_chain() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for (name, line) in [("a", 1), ("b", 2), ("c", 3)] {
            graph.add_node(Node::new(NodeKind::Function, "m.py", name, line));
        }
        graph.connect(RelationshipKind::Calls, "Function:m.py:a:1", "Function:m.py:b:2");
        graph.connect(RelationshipKind::Calls, "Function:m.py:b:2", "Function:m.py:c:3");
        graph.connect(RelationshipKind::Calls, "Function:m.py:c:3", "Function:m.py:a:1");
        graph
    }

    #[test]
    fn test_count_by_label() {
        let graph = sample_graph();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let result = engine
            .execute_query("MATCH (f:Function) RETURN COUNT(f)", QueryOptions::default())
            .unwrap();
        assert_eq!(result.data, vec![serde_json::json!({"COUNT(f)": 7})]);
    }

    #[test]
    fn test_filter_contains() {
        let graph = sample_graph();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let result = engine
            .execute_query(
                "MATCH (c:Class) WHERE c.name CONTAINS 'Service' RETURN c.name",
                QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(result.data, vec![serde_json::json!({"c.name": "UserService"})]);
        assert_eq!(result.nodes.len(), 1);

        let none = engine
            .execute_query(
                "MATCH (c:Class) WHERE c.missing CONTAINS 'x' RETURN c",
                QueryOptions::default(),
            )
            .unwrap();
        assert!(none.data.is_empty(), "a missing property never matches");
    }

    #[test]
    fn test_contains_ignores_case() {
        let graph = sample_graph();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let result = engine
            .execute_query(
                "MATCH (c:Class) WHERE c.name CONTAINS 'service' RETURN c.name",
                QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(result.data, vec![serde_json::json!({"c.name": "UserService"})]);

        let exact = engine
            .execute_query(
                "MATCH (c:Class) WHERE c.name = 'userservice' RETURN c.name",
                QueryOptions::default(),
            )
            .unwrap();
        assert!(exact.data.is_empty(), "equality stays case-sensitive");
    }

    #[test]
    fn test_dense_call_graph_paths_are_capped() {
        let mut graph = KnowledgeGraph::new();
        let ids: Vec<String> = (0..22)
            .map(|i| {
                let node = Node::new(NodeKind::Function, "dense.py", &format!("f{i}"), i + 1);
                let id = node.id.clone();
                graph.add_node(node);
                id
            })
            .collect();
        for from in &ids {
            for to in ids.iter().filter(|to| *to != from) {
                graph.connect(RelationshipKind::Calls, from, to);
            }
        }
        let config = QueryConfig {
            max_path_steps: 5_000,
            ..QueryConfig::default()
        };
        let mut engine = QueryEngine::new(&graph, config);
        let result = engine
            .execute_query(
                "MATCH (a:Function {name: 'f0'})-[:CALLS*]->(b:Function)",
                QueryOptions::default(),
            )
            .unwrap();
        assert!(!result.paths.is_empty());
        assert!(result.paths.len() <= 21 * 10);
        assert!(result.paths.iter().all(|p| (1..=5).contains(&p.length())));
    }

    #[test]
    fn test_limit_and_offset() {
        let graph = sample_graph();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let all = engine
            .execute_query("MATCH (f:Function) RETURN f.name", QueryOptions::default())
            .unwrap();
        assert_eq!(all.row_count(), 7);
        let page = engine
            .execute_query(
                "MATCH (f:Function) RETURN f.name",
                QueryOptions {
                    limit: Some(2),
                    offset: 5,
                },
            )
            .unwrap();
        assert_eq!(page.data, all.data[5..7].to_vec());
    }

    #[test]
    fn test_unknown_label_matches_nothing() {
        let graph = sample_graph();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let result = engine
            .execute_query("MATCH (x:Widget) RETURN x", QueryOptions::default())
            .unwrap();
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_variable_length_paths_on_cycle() {
        let graph = call_chain();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let result = engine
            .execute_query(
                "MATCH (a:Function {name: 'a'})-[:CALLS*1..3]->(b:Function)",
                QueryOptions::default(),
            )
            .unwrap();
        let lengths: Vec<usize> = result.paths.iter().map(GraphPath::length).collect();
        assert_eq!(lengths, vec![1, 2], "a->b and a->b->c; the cycle back to a is cut");
        assert_eq!(result.row_count(), 2);
        assert!(result.data[0].get("a").is_some() && result.data[0].get("b").is_some());
    }

    #[test]
    fn test_edges_with_relationship_variable() {
        let graph = call_chain();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        let result = engine
            .execute_query(
                "MATCH (a:Function {name: 'a'})-[r:CALLS]->(b:Function) RETURN b.name, r",
                QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.data[0]["b.name"], "b");
        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.nodes.len(), 1, "only projected variables are collected");
    }

    #[test]
    fn test_cache_only_keeps_successes() {
        let graph = sample_graph();
        let mut engine = QueryEngine::new(&graph, QueryConfig::default());
        assert!(engine.execute_query("DROP EVERYTHING", QueryOptions::default()).is_err());
        assert_eq!(engine.cached_results(), 0);

        let first = engine
            .execute_query("MATCH (m:Method) RETURN m", QueryOptions::default())
            .unwrap();
        let second = engine
            .execute_query("MATCH (m:Method) RETURN m", QueryOptions::default())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cached_results(), 1);

        engine.clear_cache();
        assert_eq!(engine.cached_results(), 0);
    }
}
