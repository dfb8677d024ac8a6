use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::config::QueryConfig;
use crate::graph::KnowledgeGraph;
use crate::graph::edge::Relationship;
use crate::graph::node::Node;

use super::parser::{
    Aggregate, AggregateFn, Comparison, DepthRange, LabelFilter, NodePattern, Predicate,
    Projection, Query, RelPattern,
};
use super::paths::PathSearch;
use super::{QueryOptions, QueryResult};

/// What a variable is bound to in one result row.
#[derive(Clone, Copy)]
enum Binding<'g> {
    Node(&'g Node),
    Relationship(&'g Relationship),
    /// The relationships along a variable-length path.
    Hops(&'g [&'g Relationship]),
}

type Row<'g> = HashMap<&'g str, Binding<'g>>;

/// Text value of a node property as compared by patterns and predicates.
/// `id` and `kind` are addressable like stored properties.
fn node_value(node: &Node, property: &str) -> Option<String> {
    match property {
        "id" => Some(node.id.clone()),
        "kind" | "label" => Some(node.kind.as_str().to_owned()),
        _ => node.property(property).map(|v| v.to_text()),
    }
}

fn node_json_value(node: &Node, property: &str) -> Value {
    match property {
        "id" => Value::String(node.id.clone()),
        "kind" | "label" => Value::String(node.kind.as_str().to_owned()),
        _ => node.property(property).map_or(Value::Null, |v| v.to_json()),
    }
}

fn relationship_json_value(rel: &Relationship, property: &str) -> Value {
    match property {
        "id" => Value::String(rel.id.clone()),
        "type" | "kind" => Value::String(rel.kind.as_str().to_owned()),
        "source" => Value::String(rel.source.clone()),
        "target" => Value::String(rel.target.clone()),
        _ => rel.property(property).map_or(Value::Null, |v| v.to_json()),
    }
}

fn matches_pattern(node: &Node, pattern: &NodePattern) -> bool {
    pattern.label.admits(node.kind)
        && pattern
            .properties
            .iter()
            .all(|(key, expected)| node_value(node, key).as_deref() == Some(expected.as_str()))
}

fn matching_nodes<'g>(graph: &'g KnowledgeGraph, pattern: &NodePattern) -> Vec<&'g Node> {
    match &pattern.label {
        LabelFilter::Only(kind) => graph
            .nodes_of_kind(*kind)
            .filter(|n| matches_pattern(n, pattern))
            .collect(),
        _ => graph.nodes().filter(|n| matches_pattern(n, pattern)).collect(),
    }
}

fn satisfies(node: &Node, predicate: &Predicate) -> bool {
    let Some(value) = node_value(node, &predicate.property) else {
        return false;
    };
    match predicate.comparison {
        Comparison::Contains => value
            .to_lowercase()
            .contains(&predicate.value.to_lowercase()),
        Comparison::Equals => value == predicate.value,
    }
}

fn project(row: &Row, projections: &[Projection]) -> Value {
    let mut out = Map::new();
    for projection in projections {
        let value = match (row.get(projection.var.as_str()), &projection.property) {
            (Some(Binding::Node(node)), None) => node.to_json(),
            (Some(Binding::Node(node)), Some(p)) => node_json_value(node, p),
            (Some(Binding::Relationship(rel)), None) => rel.to_json(),
            (Some(Binding::Relationship(rel)), Some(p)) => relationship_json_value(rel, p),
            (Some(Binding::Hops(hops)), None) => {
                Value::Array(hops.iter().map(|r| r.to_json()).collect())
            }
            (Some(Binding::Hops(hops)), Some(p)) => {
                Value::Array(hops.iter().map(|r| relationship_json_value(r, p)).collect())
            }
            (None, _) => Value::Null,
        };
        out.insert(projection.column(), value);
    }
    Value::Object(out)
}

fn window<T>(items: Vec<T>, options: &QueryOptions) -> Vec<T> {
    let limit = options.limit.unwrap_or(usize::MAX);
    items.into_iter().skip(options.offset).take(limit).collect()
}

/// Collects the rows of one query plus the distinct nodes and relationships
/// they reference.
#[derive(Default)]
struct Collector {
    result: QueryResult,
    seen_nodes: HashSet<String>,
    seen_relationships: HashSet<String>,
}

impl Collector {
    fn add_row(&mut self, row: &Row, projections: &[Projection]) {
        for projection in projections {
            match row.get(projection.var.as_str()) {
                Some(Binding::Node(node)) => self.node(node),
                Some(Binding::Relationship(rel)) => self.relationship(rel),
                Some(Binding::Hops(hops)) => hops.iter().for_each(|r| self.relationship(r)),
                None => {}
            }
        }
        self.result.data.push(project(row, projections));
    }

    fn node(&mut self, node: &Node) {
        if self.seen_nodes.insert(node.id.clone()) {
            self.result.nodes.push(node.clone());
        }
    }

    fn relationship(&mut self, rel: &Relationship) {
        if self.seen_relationships.insert(rel.id.clone()) {
            self.result.relationships.push(rel.clone());
        }
    }
}

/// Evaluate a parsed query against `graph`. Read-only.
pub fn execute(
    graph: &KnowledgeGraph,
    query: &Query,
    config: &QueryConfig,
    options: &QueryOptions,
) -> QueryResult {
    match query {
        Query::Filter {
            node,
            predicate,
            projections,
        } => {
            let matched: Vec<&Node> = matching_nodes(graph, node)
                .into_iter()
                .filter(|n| satisfies(n, predicate))
                .collect();
            node_rows(&node.var, window(matched, options), projections)
        }
        Query::Nodes { node, projections } => {
            node_rows(&node.var, window(matching_nodes(graph, node), options), projections)
        }
        Query::Aggregate { node, aggregate } => {
            let matched = matching_nodes(graph, node);
            let mut result = QueryResult::default();
            let row = aggregate_row(&matched, aggregate);
            result.data = window(vec![row], options);
            result
        }
        Query::Edges {
            source,
            rel,
            target,
            projections,
        } => edge_rows(graph, source, rel, target, projections, options),
        Query::Paths {
            source,
            rel,
            depth,
            target,
            projections,
        } => path_rows(graph, source, rel, *depth, target, projections, config, options),
    }
}

fn node_rows(var: &str, nodes: Vec<&Node>, projections: &[Projection]) -> QueryResult {
    let mut collector = Collector::default();
    for node in nodes {
        let row: Row = HashMap::from([(var, Binding::Node(node))]);
        collector.add_row(&row, projections);
    }
    collector.result
}

fn aggregate_row(nodes: &[&Node], aggregate: &Aggregate) -> Value {
    let value = match aggregate.function {
        AggregateFn::Count => match &aggregate.target.property {
            None => Value::from(nodes.len()),
            Some(p) => Value::from(nodes.iter().filter(|n| node_value(n, p).is_some()).count()),
        },
        AggregateFn::Collect => Value::Array(match &aggregate.target.property {
            None => nodes.iter().map(|n| n.to_json()).collect(),
            Some(p) => nodes
                .iter()
                .map(|n| node_json_value(n, p))
                .filter(|v| !v.is_null())
                .collect(),
        }),
    };
    let mut row = Map::new();
    row.insert(aggregate.column(), value);
    Value::Object(row)
}

fn edge_rows(
    graph: &KnowledgeGraph,
    source: &NodePattern,
    rel: &RelPattern,
    target: &NodePattern,
    projections: &[Projection],
    options: &QueryOptions,
) -> QueryResult {
    let mut rows: Vec<Row> = Vec::new();
    for from in matching_nodes(graph, source) {
        for (edge, to) in graph.outgoing(&from.id) {
            if !rel.kind.admits(edge.kind) || !matches_pattern(to, target) {
                continue;
            }
            let mut row: Row = HashMap::from([
                (source.var.as_str(), Binding::Node(from)),
                (target.var.as_str(), Binding::Node(to)),
            ]);
            if let Some(var) = &rel.var {
                row.insert(var.as_str(), Binding::Relationship(edge));
            }
            rows.push(row);
        }
    }

    let mut collector = Collector::default();
    for row in window(rows, options) {
        collector.add_row(&row, projections);
    }
    collector.result
}

#[allow(clippy::too_many_arguments)]
fn path_rows(
    graph: &KnowledgeGraph,
    source: &NodePattern,
    rel: &RelPattern,
    depth: DepthRange,
    target: &NodePattern,
    projections: &[Projection],
    config: &QueryConfig,
    options: &QueryOptions,
) -> QueryResult {
    let sources: Vec<&Node> = matching_nodes(graph, source)
        .into_iter()
        .take(config.max_path_candidates)
        .collect();
    let targets: HashSet<&str> = matching_nodes(graph, target)
        .into_iter()
        .take(config.max_path_candidates)
        .map(|n| n.id.as_str())
        .collect();

    let outcome = PathSearch::new(graph, &rel.kind, depth, config.max_paths_per_pair)
        .with_step_budget(config.max_path_steps)
        .run(&sources, &targets);
    if outcome.budget_spent {
        tracing::warn!(
            steps = outcome.steps,
            "path search stopped at the step budget; results may be partial"
        );
    }
    let paths = window(outcome.paths, options);

    let relationships: HashMap<&str, &Relationship> = graph
        .relationships()
        .filter(|r| rel.kind.admits(r.kind))
        .map(|r| (r.id.as_str(), r))
        .collect();

    let mut collector = Collector::default();
    for path in &paths {
        let (Some(from), Some(to)) = (graph.node(path.source()), graph.node(path.target())) else {
            continue;
        };
        let hops: Vec<&Relationship> = path
            .relationships
            .iter()
            .filter_map(|id| relationships.get(id.as_str()).copied())
            .collect();
        let mut row: Row = HashMap::from([
            (source.var.as_str(), Binding::Node(from)),
            (target.var.as_str(), Binding::Node(to)),
        ]);
        if let Some(var) = &rel.var {
            row.insert(var.as_str(), Binding::Hops(&hops));
        }
        collector.add_row(&row, projections);
    }
    collector.result.paths = paths;
    collector.result
}
