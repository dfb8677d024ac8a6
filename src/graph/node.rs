use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of entity a graph node represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum NodeKind {
    /// The root of one indexing run.
    Project,
    /// A directory on the path between the project root and a file.
    Folder,
    /// A source or config file.
    File,
    /// A module that is not backed by an indexed file (external or builtin).
    Module,
    /// A class, struct or union declaration.
    Class,
    /// A free function, or an arrow/closure bound to a name.
    Function,
    /// A function declared inside a class, trait, or impl body.
    Method,
    /// A top-level variable or constant binding.
    Variable,
    /// An interface, protocol or trait.
    Interface,
    /// An enum declaration.
    Enum,
    /// A decorator/annotation application.
    Decorator,
}

impl NodeKind {
    pub const ALL: [NodeKind; 11] = [
        NodeKind::Project,
        NodeKind::Folder,
        NodeKind::File,
        NodeKind::Module,
        NodeKind::Class,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Variable,
        NodeKind::Interface,
        NodeKind::Enum,
        NodeKind::Decorator,
    ];

    /// The label used in ids and in query patterns (`(f:Function)`).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Project => "Project",
            NodeKind::Folder => "Folder",
            NodeKind::File => "File",
            NodeKind::Module => "Module",
            NodeKind::Class => "Class",
            NodeKind::Function => "Function",
            NodeKind::Method => "Method",
            NodeKind::Variable => "Variable",
            NodeKind::Interface => "Interface",
            NodeKind::Enum => "Enum",
            NodeKind::Decorator => "Decorator",
        }
    }

    /// Parse a query label. Case-insensitive.
    pub fn from_label(label: &str) -> Option<NodeKind> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(label))
    }

    /// Kinds that describe a named code construct and therefore carry `startLine`.
    pub fn is_code_definition(&self) -> bool {
        matches!(
            self,
            NodeKind::Class
                | NodeKind::Function
                | NodeKind::Method
                | NodeKind::Variable
                | NodeKind::Interface
                | NodeKind::Enum
                | NodeKind::Decorator
        )
    }

    /// Kinds that are allowed to have no incoming `CONTAINS` edge.
    pub fn is_containment_root(&self) -> bool {
        matches!(self, NodeKind::Project | NodeKind::File | NodeKind::Module)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar or list property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Render the value the way query predicates compare it.
    ///
    /// Lists render as their comma-joined items so that `CONTAINS` can match
    /// a single element.
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Int(n) => n.to_string(),
            PropertyValue::Float(x) => x.to_string(),
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::List(items) => items.join(","),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::Int(n) => serde_json::Value::from(*n),
            PropertyValue::Float(x) => serde_json::Value::from(*x),
            PropertyValue::Text(s) => serde_json::Value::String(s.clone()),
            PropertyValue::List(items) => serde_json::Value::from(items.clone()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Int(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable id derived from `(kind, filePath, name, startLine)`.
    pub id: String,
    pub kind: NodeKind,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// Derive the deterministic id for a node.
    ///
    /// Re-parsing the same file yields the same ids, so nodes from two runs can
    /// be compared as sets.
    pub fn node_id(kind: NodeKind, file_path: &str, name: &str, start_line: usize) -> String {
        format!("{}:{}:{}:{}", kind.as_str(), file_path, name, start_line)
    }

    /// Create a node with `name`, and `filePath`/`startLine` where they apply.
    pub fn new(kind: NodeKind, file_path: &str, name: &str, start_line: usize) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("name".to_owned(), PropertyValue::from(name));
        if !file_path.is_empty() {
            properties.insert("filePath".to_owned(), PropertyValue::from(file_path));
        }
        if kind.is_code_definition() {
            properties.insert("startLine".to_owned(), PropertyValue::from(start_line));
        }
        Self {
            id: Self::node_id(kind, file_path, name, start_line),
            kind,
            properties,
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(key.to_owned(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn name(&self) -> &str {
        self.property("name")
            .and_then(PropertyValue::as_str)
            .unwrap_or("")
    }

    pub fn file_path(&self) -> Option<&str> {
        self.property("filePath").and_then(PropertyValue::as_str)
    }

    pub fn start_line(&self) -> Option<i64> {
        self.property("startLine").and_then(PropertyValue::as_i64)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.property(key)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    /// JSON view used by query projections: `{id, kind, ...properties}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_owned(), serde_json::Value::String(self.id.clone()));
        map.insert(
            "kind".to_owned(),
            serde_json::Value::String(self.kind.as_str().to_owned()),
        );
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_deterministic() {
        let a = Node::new(NodeKind::Function, "a/x.py", "helper", 1);
        let b = Node::new(NodeKind::Function, "a/x.py", "helper", 1);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "Function:a/x.py:helper:1");
    }

    #[test]
    fn test_file_nodes_have_no_start_line() {
        let file = Node::new(NodeKind::File, "a/x.py", "x.py", 0);
        assert!(file.start_line().is_none(), "files are not code definitions");
        assert_eq!(file.file_path(), Some("a/x.py"));
    }

    #[test]
    fn test_label_parsing_is_case_insensitive() {
        assert_eq!(NodeKind::from_label("function"), Some(NodeKind::Function));
        assert_eq!(NodeKind::from_label("CLASS"), Some(NodeKind::Class));
        assert_eq!(NodeKind::from_label("Widget"), None);
    }

    #[test]
    fn test_property_value_untagged_roundtrip() {
        let json = r#"{"a": true, "b": 3, "c": "x", "d": ["p", "q"]}"#;
        let parsed: BTreeMap<String, PropertyValue> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["a"], PropertyValue::Bool(true));
        assert_eq!(parsed["b"], PropertyValue::Int(3));
        assert_eq!(parsed["c"], PropertyValue::from("x"));
        assert_eq!(parsed["d"].to_text(), "p,q");
    }
}
