use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::graph::KnowledgeGraph;
use crate::graph::edge::{Relationship, RelationshipKind};
use crate::graph::node::Node;

use super::parser::{DepthRange, LabelFilter};

/// One path found by a variable-length pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPath {
    /// Node ids from source to target.
    pub nodes: Vec<String>,
    /// Relationship ids, one per hop.
    pub relationships: Vec<String>,
}

impl GraphPath {
    pub fn length(&self) -> usize {
        self.relationships.len()
    }

    pub fn source(&self) -> &str {
        self.nodes.first().map_or("", String::as_str)
    }

    pub fn target(&self) -> &str {
        self.nodes.last().map_or("", String::as_str)
    }
}

/// Paths found by one [`PathSearch::run`], with the work it took.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub paths: Vec<GraphPath>,
    /// Edges traversed across all sources.
    pub steps: usize,
    /// The step budget ran out before every source was explored.
    pub budget_spent: bool,
}

/// Depth-first search for paths between candidate endpoints.
pub struct PathSearch<'g> {
    graph: &'g KnowledgeGraph,
    kind: &'g LabelFilter<RelationshipKind>,
    depth: DepthRange,
    per_pair: usize,
    step_budget: usize,
}

/// Mutable state of one search, shared across sources.
struct Walk<'t> {
    targets: &'t HashSet<&'t str>,
    nodes: Vec<String>,
    rels: Vec<String>,
    visited: HashSet<String>,
    per_target: HashMap<String, usize>,
    /// Targets reachable from the current source that are still below the cap.
    open_targets: usize,
    steps: usize,
    found: Vec<GraphPath>,
}

impl<'g> PathSearch<'g> {
    pub fn new(
        graph: &'g KnowledgeGraph,
        kind: &'g LabelFilter<RelationshipKind>,
        depth: DepthRange,
        per_pair: usize,
    ) -> Self {
        Self {
            graph,
            kind,
            depth,
            per_pair,
            step_budget: usize::MAX,
        }
    }

    /// Caps the number of edges traversed over a whole [`run`](Self::run).
    pub fn with_step_budget(mut self, steps: usize) -> Self {
        self.step_budget = steps;
        self
    }

    /// Paths from each source to any target, at most `per_pair` per
    /// (source, target) pair, with hop counts inside the depth bounds.
    ///
    /// A node is never revisited within one path, so cycles terminate.
    /// Descent from a source stops once every target is saturated, and the
    /// whole run stops when the step budget is spent.
    pub fn run(&self, sources: &[&Node], targets: &HashSet<&str>) -> SearchOutcome {
        let mut walk = Walk {
            targets,
            nodes: Vec::new(),
            rels: Vec::new(),
            visited: HashSet::new(),
            per_target: HashMap::new(),
            open_targets: 0,
            steps: 0,
            found: Vec::new(),
        };
        if self.per_pair == 0 {
            return SearchOutcome::default();
        }
        let mut budget_spent = false;
        for source in sources {
            if walk.steps >= self.step_budget {
                budget_spent = true;
                tracing::debug!(budget = self.step_budget, "path search budget spent");
                break;
            }
            walk.per_target.clear();
            walk.open_targets = targets.len() - usize::from(targets.contains(source.id.as_str()));
            walk.nodes = vec![source.id.clone()];
            walk.rels.clear();
            walk.visited = HashSet::from([source.id.clone()]);
            self.walk(&mut walk);
        }
        SearchOutcome {
            budget_spent: budget_spent || walk.steps >= self.step_budget,
            steps: walk.steps,
            paths: walk.found,
        }
    }

    /// Returns `false` once nothing more can be found from this source.
    fn walk(&self, walk: &mut Walk) -> bool {
        if walk.open_targets == 0 || walk.steps >= self.step_budget {
            return false;
        }
        if walk.rels.len() >= self.depth.max {
            return true;
        }
        let Some(current) = walk.nodes.last().cloned() else {
            return true;
        };
        let steps: Vec<(&Relationship, &Node)> = self
            .graph
            .outgoing(&current)
            .filter(|(rel, _)| self.kind.admits(rel.kind))
            .collect();
        for (rel, next) in steps {
            if walk.visited.contains(&next.id) {
                continue;
            }
            if walk.steps >= self.step_budget {
                return false;
            }
            walk.steps += 1;
            walk.nodes.push(next.id.clone());
            walk.rels.push(rel.id.clone());
            walk.visited.insert(next.id.clone());

            let depth = walk.rels.len();
            if depth >= self.depth.min && walk.targets.contains(next.id.as_str()) {
                let count = walk.per_target.entry(next.id.clone()).or_default();
                if *count < self.per_pair {
                    *count += 1;
                    if *count == self.per_pair {
                        walk.open_targets -= 1;
                    }
                    walk.found.push(GraphPath {
                        nodes: walk.nodes.clone(),
                        relationships: walk.rels.clone(),
                    });
                }
            }
            let more = self.walk(walk);

            walk.visited.remove(&next.id);
            walk.rels.pop();
            walk.nodes.pop();
            if !more {
                return false;
            }
        }
        true
    }
}
