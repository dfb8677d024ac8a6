//! Recognizer for the restricted Cypher dialect.
//!
//! Five query shapes are tried in a fixed order and the first match wins.
//! Keywords are case-insensitive; labels and relationship types are matched
//! case-insensitively against the graph's kinds.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::QueryError;
use crate::graph::edge::RelationshipKind;
use crate::graph::node::NodeKind;

/// Label or relationship-type constraint of a pattern element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter<K> {
    Any,
    Only(K),
    /// A label that names no kind; matches nothing.
    Unknown(String),
}

impl<K: Copy + PartialEq> LabelFilter<K> {
    pub fn admits(&self, kind: K) -> bool {
        match self {
            LabelFilter::Any => true,
            LabelFilter::Only(k) => *k == kind,
            LabelFilter::Unknown(_) => false,
        }
    }
}

/// `(var:Label {key: 'value', ...})`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    pub var: String,
    pub label: LabelFilter<NodeKind>,
    pub properties: Vec<(String, String)>,
}

/// Inclusive hop bounds of a variable-length pattern. `min` is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthRange {
    pub min: usize,
    pub max: usize,
}

/// `-[var:TYPE]->` or `-[var:TYPE*min..max]->`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelPattern {
    pub var: Option<String>,
    pub kind: LabelFilter<RelationshipKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Contains,
    Equals,
}

/// `WHERE var.prop CONTAINS 'text'` / `WHERE var.prop = 'text'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub var: String,
    pub property: String,
    pub comparison: Comparison,
    pub value: String,
}

/// One RETURN item: a whole variable or one of its properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub var: String,
    pub property: Option<String>,
}

impl Projection {
    /// Column name in result rows: the item as written.
    pub fn column(&self) -> String {
        match &self.property {
            Some(p) => format!("{}.{p}", self.var),
            None => self.var.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Collect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFn,
    pub target: Projection,
}

impl Aggregate {
    pub fn column(&self) -> String {
        let name = match self.function {
            AggregateFn::Count => "COUNT",
            AggregateFn::Collect => "COLLECT",
        };
        format!("{name}({})", self.target.column())
    }
}

/// A recognised query, one variant per shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `MATCH (v) WHERE v.p CONTAINS|= '..' RETURN ..`
    Filter {
        node: NodePattern,
        predicate: Predicate,
        projections: Vec<Projection>,
    },
    /// `MATCH (a)-[:T*min..max]->(b) [RETURN ..]`
    Paths {
        source: NodePattern,
        rel: RelPattern,
        depth: DepthRange,
        target: NodePattern,
        projections: Vec<Projection>,
    },
    /// `MATCH (v) RETURN COUNT(v)|COLLECT(v.p)`
    Aggregate { node: NodePattern, aggregate: Aggregate },
    /// `MATCH (v) RETURN ..`
    Nodes {
        node: NodePattern,
        projections: Vec<Projection>,
    },
    /// `MATCH (a)-[r:T]->(b) [RETURN ..]`
    Edges {
        source: NodePattern,
        rel: RelPattern,
        target: NodePattern,
        projections: Vec<Projection>,
    },
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// A node pattern whose capture groups are suffixed with `tag`.
fn node(tag: &str) -> String {
    format!(r"\(\s*(?P<var{tag}>\w+)\s*(?::\s*(?P<label{tag}>\w+))?\s*(?P<props{tag}>\{{[^}}]*\}})?\s*\)")
}

const RETURN_TAIL: &str = r"\s*;?\s*$";

macro_rules! shape {
    ($name:ident, $build:expr) => {
        fn $name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            CELL.get_or_init(|| Regex::new(&$build).expect("invalid query shape"))
        }
    };
}

shape!(
    filter_shape,
    format!(
        r#"(?is)^\s*MATCH\s+{}\s+WHERE\s+(?P<wvar>\w+)\.(?P<wprop>\w+)\s+(?P<op>CONTAINS|=)\s*(?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)")\s+RETURN\s+(?P<ret>.+?){RETURN_TAIL}"#,
        node("")
    )
);
shape!(
    paths_shape,
    format!(
        r"(?is)^\s*MATCH\s+{}\s*-\s*\[\s*(?P<rvar>\w+)?\s*(?::\s*(?P<rtype>\w+))?\s*\*(?P<depth>[^\]]*)\]\s*->\s*{}(?:\s+RETURN\s+(?P<ret>.+?))?{RETURN_TAIL}",
        node("a"),
        node("b")
    )
);
shape!(
    aggregate_shape,
    format!(
        r"(?is)^\s*MATCH\s+{}\s+RETURN\s+(?P<fn>COUNT|COLLECT)\s*\(\s*(?P<avar>\w+)(?:\.(?P<aprop>\w+))?\s*\){RETURN_TAIL}",
        node("")
    )
);
shape!(
    nodes_shape,
    format!(r"(?is)^\s*MATCH\s+{}\s+RETURN\s+(?P<ret>.+?){RETURN_TAIL}", node(""))
);
shape!(
    edges_shape,
    format!(
        r"(?is)^\s*MATCH\s+{}\s*-\s*\[\s*(?P<rvar>\w+)?\s*(?::\s*(?P<rtype>\w+))?\s*\]\s*->\s*{}(?:\s+RETURN\s+(?P<ret>.+?))?{RETURN_TAIL}",
        node("a"),
        node("b")
    )
);

fn property_entry() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r#"\s*(\w+)\s*:\s*(?:'([^']*)'|"([^"]*)"|(-?[\w.]+))\s*(?:,|$)"#)
            .expect("invalid property pattern")
    })
}

fn projection_item() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"^(\w+)(?:\.(\w+))?$").expect("invalid projection pattern"))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse `text` into one of the five shapes.
///
/// `default_max_depth` is the upper bound of a bare `*` (and of `*n..`).
pub fn parse_query(text: &str, default_max_depth: usize) -> Result<Query, QueryError> {
    if let Some(caps) = filter_shape().captures(text) {
        let node = node_pattern(&caps, "")?;
        let value = caps
            .name("sq")
            .or_else(|| caps.name("dq"))
            .map_or("", |m| m.as_str());
        let predicate = Predicate {
            var: caps["wvar"].to_owned(),
            property: caps["wprop"].to_owned(),
            comparison: if caps["op"].eq_ignore_ascii_case("CONTAINS") {
                Comparison::Contains
            } else {
                Comparison::Equals
            },
            value: value.to_owned(),
        };
        if predicate.var != node.var {
            return Err(QueryError::UnknownVariable(predicate.var));
        }
        let projections = projections(&caps["ret"], &[&node.var])?;
        return Ok(Query::Filter {
            node,
            predicate,
            projections,
        });
    }

    if let Some(caps) = paths_shape().captures(text) {
        let source = node_pattern(&caps, "a")?;
        let target = node_pattern(&caps, "b")?;
        let rel = rel_pattern(&caps);
        let depth = parse_depth(&caps["depth"], default_max_depth)?;
        let projections = returned(&caps, &source, &rel, &target)?;
        return Ok(Query::Paths {
            source,
            rel,
            depth,
            target,
            projections,
        });
    }

    if let Some(caps) = aggregate_shape().captures(text) {
        let node = node_pattern(&caps, "")?;
        let var = caps["avar"].to_owned();
        if var != node.var {
            return Err(QueryError::UnknownVariable(var));
        }
        let function = if caps["fn"].eq_ignore_ascii_case("COUNT") {
            AggregateFn::Count
        } else {
            AggregateFn::Collect
        };
        let target = Projection {
            var,
            property: caps.name("aprop").map(|m| m.as_str().to_owned()),
        };
        return Ok(Query::Aggregate {
            node,
            aggregate: Aggregate { function, target },
        });
    }

    if let Some(caps) = nodes_shape().captures(text) {
        let node = node_pattern(&caps, "")?;
        let projections = projections(&caps["ret"], &[&node.var])?;
        return Ok(Query::Nodes { node, projections });
    }

    if let Some(caps) = edges_shape().captures(text) {
        let source = node_pattern(&caps, "a")?;
        let target = node_pattern(&caps, "b")?;
        let rel = rel_pattern(&caps);
        let projections = returned(&caps, &source, &rel, &target)?;
        return Ok(Query::Edges {
            source,
            rel,
            target,
            projections,
        });
    }

    Err(QueryError::Unrecognized(text.trim().to_owned()))
}

fn node_pattern(caps: &Captures, tag: &str) -> Result<NodePattern, QueryError> {
    let var = caps[format!("var{tag}").as_str()].to_owned();
    let label = match caps.name(&format!("label{tag}")) {
        None => LabelFilter::Any,
        Some(m) => match NodeKind::from_label(m.as_str()) {
            Some(kind) => LabelFilter::Only(kind),
            None => LabelFilter::Unknown(m.as_str().to_owned()),
        },
    };
    let properties = match caps.name(&format!("props{tag}")) {
        Some(m) => property_map(m.as_str())?,
        None => Vec::new(),
    };
    Ok(NodePattern {
        var,
        label,
        properties,
    })
}

fn rel_pattern(caps: &Captures) -> RelPattern {
    let kind = match caps.name("rtype") {
        None => LabelFilter::Any,
        Some(m) => match RelationshipKind::from_label(m.as_str()) {
            Some(kind) => LabelFilter::Only(kind),
            None => LabelFilter::Unknown(m.as_str().to_owned()),
        },
    };
    RelPattern {
        var: caps.name("rvar").map(|m| m.as_str().to_owned()),
        kind,
    }
}

/// `{name: 'x', startLine: 3}` → `[("name", "x"), ("startLine", "3")]`
fn property_map(text: &str) -> Result<Vec<(String, String)>, QueryError> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| QueryError::InvalidProperty(text.to_owned()))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    // Entries must tile the map exactly; a gap is an unparsable entry.
    let mut entries = Vec::new();
    let mut end = 0;
    for caps in property_entry().captures_iter(inner) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() != end {
            break;
        }
        end = whole.end();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        entries.push((caps[1].to_owned(), value.to_owned()));
    }
    if !inner[end..].trim().is_empty() {
        let rest = inner[end..].trim().trim_start_matches(',').trim();
        return Err(QueryError::InvalidProperty(rest.to_owned()));
    }
    Ok(entries)
}

/// Bounds after `*`: empty, `n`, `n..m`, `..m` or `n..`.
pub fn parse_depth(text: &str, default_max_depth: usize) -> Result<DepthRange, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidDepth {
        text: format!("*{text}"),
        reason: reason.to_owned(),
    };
    let bound = |s: &str| -> Result<Option<usize>, QueryError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<usize>()
            .map(Some)
            .map_err(|_| invalid("bounds must be non-negative integers"))
    };

    let trimmed = text.trim();
    let (min, max) = match trimmed.split_once("..") {
        Some((lo, hi)) => (bound(lo)?.unwrap_or(1), bound(hi)?.unwrap_or(default_max_depth)),
        None => match bound(trimmed)? {
            Some(n) => (n, n),
            None => (1, default_max_depth),
        },
    };
    // Zero-hop paths are never returned.
    let min = min.max(1);
    if max < min {
        return Err(invalid("upper bound is below the lower bound"));
    }
    Ok(DepthRange { min, max })
}

fn projections(text: &str, bound: &[&str]) -> Result<Vec<Projection>, QueryError> {
    text.split(',')
        .map(|item| {
            let item = item.trim();
            let caps = projection_item()
                .captures(item)
                .ok_or_else(|| QueryError::Unrecognized(format!("RETURN {item}")))?;
            let var = caps[1].to_owned();
            if !bound.contains(&var.as_str()) {
                return Err(QueryError::UnknownVariable(var));
            }
            Ok(Projection {
                var,
                property: caps.get(2).map(|m| m.as_str().to_owned()),
            })
        })
        .collect()
}

/// RETURN items of a relationship pattern; every bound variable when omitted.
fn returned(
    caps: &Captures,
    source: &NodePattern,
    rel: &RelPattern,
    target: &NodePattern,
) -> Result<Vec<Projection>, QueryError> {
    let mut bound = vec![source.var.as_str(), target.var.as_str()];
    if let Some(var) = &rel.var {
        bound.push(var);
    }
    match caps.name("ret") {
        Some(m) => projections(m.as_str(), &bound),
        None => {
            bound.dedup();
            Ok(bound
                .into_iter()
                .map(|var| Projection {
                    var: var.to_owned(),
                    property: None,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Query {
        parse_query(text, 5).unwrap_or_else(|e| panic!("{text}: {e}"))
    }

    #[test]
    fn test_filter_shape() {
        let q = parse("match (f:Function) where f.name contains 'help' return f.name, f.filePath");
        let Query::Filter {
            node,
            predicate,
            projections,
        } = q
        else {
            panic!("expected filter shape");
        };
        assert_eq!(node.label, LabelFilter::Only(NodeKind::Function));
        assert_eq!(predicate.comparison, Comparison::Contains);
        assert_eq!(predicate.value, "help");
        assert_eq!(projections.len(), 2);
        assert_eq!(projections[1].column(), "f.filePath");

        let eq = parse(r#"MATCH (c:Class) WHERE c.name = "Base" RETURN c"#);
        assert!(matches!(eq, Query::Filter { predicate: Predicate { comparison: Comparison::Equals, .. }, .. }));
    }

    #[test]
    fn test_paths_shape_and_depths() {
        let q = parse("MATCH (a:Function)-[:CALLS*1..2]->(b:Function)");
        let Query::Paths {
            rel,
            depth,
            projections,
            ..
        } = q
        else {
            panic!("expected paths shape");
        };
        assert_eq!(rel.kind, LabelFilter::Only(RelationshipKind::Calls));
        assert_eq!(depth, DepthRange { min: 1, max: 2 });
        assert_eq!(projections.len(), 2, "RETURN defaults to every bound variable");

        assert_eq!(parse_depth("", 5).unwrap(), DepthRange { min: 1, max: 5 });
        assert_eq!(parse_depth("3", 5).unwrap(), DepthRange { min: 3, max: 3 });
        assert_eq!(parse_depth("..4", 5).unwrap(), DepthRange { min: 1, max: 4 });
        assert_eq!(parse_depth("2..", 5).unwrap(), DepthRange { min: 2, max: 5 });
        assert_eq!(parse_depth("0..2", 5).unwrap(), DepthRange { min: 1, max: 2 });
        assert!(matches!(parse_depth("3..1", 5), Err(QueryError::InvalidDepth { .. })));
        assert!(matches!(parse_depth("x", 5), Err(QueryError::InvalidDepth { .. })));
    }

    #[test]
    fn test_aggregate_shape() {
        let q = parse("MATCH (f:Function) RETURN COUNT(f)");
        let Query::Aggregate { aggregate, .. } = q else {
            panic!("expected aggregate shape");
        };
        assert_eq!(aggregate.function, AggregateFn::Count);
        assert_eq!(aggregate.column(), "COUNT(f)");

        let q = parse("MATCH (c:Class) RETURN collect(c.name)");
        let Query::Aggregate { aggregate, .. } = q else {
            panic!("expected aggregate shape");
        };
        assert_eq!(aggregate.column(), "COLLECT(c.name)");
    }

    #[test]
    fn test_nodes_and_edges_shapes() {
        let q = parse("MATCH (f:Function {name: 'helper', startLine: 1}) RETURN f");
        let Query::Nodes { node, .. } = q else {
            panic!("expected nodes shape");
        };
        assert_eq!(
            node.properties,
            vec![("name".to_owned(), "helper".to_owned()), ("startLine".to_owned(), "1".to_owned())]
        );

        let q = parse("MATCH (a)-[r:CALLS]->(b:Function) RETURN a.name, r, b.name");
        let Query::Edges { rel, projections, .. } = q else {
            panic!("expected edges shape");
        };
        assert_eq!(rel.var.as_deref(), Some("r"));
        assert_eq!(projections[1].column(), "r");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_query("DELETE everything", 5),
            Err(QueryError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_query("MATCH (f:Function) RETURN g.name", 5),
            Err(QueryError::UnknownVariable(v)) if v == "g"
        ));
        assert!(matches!(
            parse_query("MATCH (f:Function {name helper}) RETURN f", 5),
            Err(QueryError::InvalidProperty(_))
        ));
        assert!(matches!(
            parse_query("MATCH (f:Function {name: 'a' kind: 'b'}) RETURN f", 5),
            Err(QueryError::InvalidProperty(_))
        ));
    }

    #[test]
    fn test_property_values_may_contain_commas() {
        let Query::Nodes { node, .. } =
            parse("MATCH (v:Variable {name: 'x, y', startLine: 4}) RETURN v")
        else {
            panic!("expected nodes shape");
        };
        assert_eq!(
            node.properties,
            vec![
                ("name".to_owned(), "x, y".to_owned()),
                ("startLine".to_owned(), "4".to_owned()),
            ]
        );
    }

    #[test]
    fn test_unknown_label_is_kept() {
        let Query::Nodes { node, .. } = parse("MATCH (w:Widget) RETURN w") else {
            panic!("expected nodes shape");
        };
        assert_eq!(node.label, LabelFilter::Unknown("Widget".to_owned()));
        assert!(!node.label.admits(NodeKind::Class));
    }
}
