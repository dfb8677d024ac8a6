use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::PropertyValue;

/// The kind of directed edge between two nodes in the knowledge graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    /// Owner -> owned: project -> folder -> file -> definition, class -> method.
    Contains,
    /// Caller -> callee, resolved heuristically.
    Calls,
    /// Child class -> base class, or interface -> extended interface.
    Inherits,
    /// Child method -> the base-class method it replaces.
    Overrides,
    /// Class -> interface it implements.
    Implements,
    /// Decorator -> decorated function or class.
    Decorates,
    /// File -> imported file, or file -> external module.
    Imports,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 7] = [
        RelationshipKind::Contains,
        RelationshipKind::Calls,
        RelationshipKind::Inherits,
        RelationshipKind::Overrides,
        RelationshipKind::Implements,
        RelationshipKind::Decorates,
        RelationshipKind::Imports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Contains => "CONTAINS",
            RelationshipKind::Calls => "CALLS",
            RelationshipKind::Inherits => "INHERITS",
            RelationshipKind::Overrides => "OVERRIDES",
            RelationshipKind::Implements => "IMPLEMENTS",
            RelationshipKind::Decorates => "DECORATES",
            RelationshipKind::Imports => "IMPORTS",
        }
    }

    /// Parse a relationship type from a query pattern. Case-insensitive.
    pub fn from_label(label: &str) -> Option<RelationshipKind> {
        RelationshipKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed edge.
///
/// `source` and `target` are node ids, so a relationship can be serialized
/// and compared without the backing petgraph indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub kind: RelationshipKind,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Relationship {
    pub fn relationship_id(kind: RelationshipKind, source: &str, target: &str) -> String {
        format!("{}:{}->{}", kind.as_str(), source, target)
    }

    pub fn new(kind: RelationshipKind, source: &str, target: &str) -> Self {
        Self {
            id: Self::relationship_id(kind, source, target),
            kind,
            source: source.to_owned(),
            target: target.to_owned(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut props = serde_json::Map::new();
        for (key, value) in &self.properties {
            props.insert(key.clone(), value.to_json());
        }
        serde_json::json!({
            "id": self.id,
            "kind": self.kind.as_str(),
            "source": self.source,
            "target": self.target,
            "properties": props,
        })
    }
}
