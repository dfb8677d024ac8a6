use std::collections::HashSet;
use std::sync::OnceLock;

use tree_sitter::{Node, Query, Tree};

use crate::graph::node::NodeKind;

use super::languages::Grammar;
use super::{
    CallSite, Definition, ExtractorKind, FileExtraction, ImportInfo, ImportKind, ScopeMap,
    ValueKind, captured_ids, compile_query, end_line, named_children, node_text, preorder,
    start_line,
};

/// Functions that sit directly in a class body, bare or decorated.
const METHOD_QUERY: &str = r#"
    (class_definition
      body: (block (function_definition) @method))
    (class_definition
      body: (block (decorated_definition definition: (function_definition) @method)))
"#;

static METHODS: OnceLock<Option<Query>> = OnceLock::new();

fn method_query() -> Option<&'static Query> {
    METHODS
        .get_or_init(|| compile_query(Grammar::Python, METHOD_QUERY))
        .as_ref()
}

const INTERFACE_BASES: &[&str] = &["Protocol", "ABC"];
const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];

pub(crate) fn extract(tree: &Tree, source: &[u8], path: &str) -> FileExtraction {
    let methods: HashSet<usize> = method_query()
        .map(|q| captured_ids(q, "method", tree, source))
        .unwrap_or_default();

    let mut out = FileExtraction::new(ExtractorKind::TreeSitter);
    let mut scopes = ScopeMap::default();

    for node in preorder(tree.root_node()) {
        match node.kind() {
            "function_definition" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Function, start_line(node));
                def.end_line = Some(end_line(node));
                if methods.contains(&node.id()) {
                    def.kind = NodeKind::Method;
                    def.parent_class = enclosing_class(node, source);
                }
                let idx = push_decorated(&mut out, def, node, source);
                scopes.insert(node, idx);
            }
            "class_definition" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Class, start_line(node));
                def.end_line = Some(end_line(node));
                let (bases, abstract_meta) = superclasses(node, source);
                if abstract_meta || bases.iter().any(|b| INTERFACE_BASES.contains(&b.as_str())) {
                    def.kind = NodeKind::Interface;
                } else if bases.iter().any(|b| ENUM_BASES.contains(&b.as_str())) {
                    def.kind = NodeKind::Enum;
                }
                def.base_types = bases;
                // Nested classes keep their outer class as owner.
                def.parent_class = enclosing_class(node, source);
                push_decorated(&mut out, def, node, source);
            }
            "assignment" => {
                if !is_module_level_assignment(node) {
                    continue;
                }
                let Some(left) = node.child_by_field_name("left") else {
                    continue;
                };
                if left.kind() != "identifier" {
                    continue;
                }
                let name = node_text(left, source);
                let right = node.child_by_field_name("right");
                let kind = right.map_or(ValueKind::Unknown, value_kind);
                if let Some(lambda) = right.filter(|r| r.kind() == "lambda") {
                    let mut def = Definition::new(name, NodeKind::Function, start_line(node));
                    def.end_line = Some(end_line(node));
                    def.value_kind = Some(ValueKind::Function);
                    out.definitions.push(def);
                    scopes.insert(lambda, out.definitions.len() - 1);
                } else {
                    let mut def = Definition::new(name, NodeKind::Variable, start_line(node));
                    def.end_line = Some(end_line(node));
                    def.value_kind = Some(kind);
                    out.definitions.push(def);
                }
            }
            "call" => {
                if let Some(mut call) = call_site(node, source) {
                    call.enclosing = scopes.enclosing(node);
                    out.calls.push(call);
                }
            }
            "import_statement" => import_statement(node, source, path, &mut out.imports),
            "import_from_statement" => import_from(node, source, path, &mut out.imports),
            _ => {}
        }
    }

    out
}

fn field_text<'a>(node: Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source))
        .filter(|s| !s.is_empty())
}

/// Name of the nearest class whose body contains `node`.
fn enclosing_class(node: Node, source: &[u8]) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "class_definition" {
            return field_text(n, "name", source).map(str::to_owned);
        }
        current = n.parent();
    }
    None
}

/// Push `def` plus one Decorator definition per adjacent decorator.
/// Returns the index of `def`.
fn push_decorated(out: &mut FileExtraction, mut def: Definition, node: Node, source: &[u8]) -> usize {
    let decorators = adjacent_decorators(node, source);
    def.decorators = decorators.iter().map(|(name, _)| name.clone()).collect();
    let key = def.key();
    out.definitions.push(def);
    let idx = out.definitions.len() - 1;
    for (name, line) in decorators {
        let mut deco = Definition::new(name, NodeKind::Decorator, line);
        deco.decorates = Some(key.clone());
        out.definitions.push(deco);
    }
    idx
}

/// Decorators are the preceding siblings of a definition inside a
/// `decorated_definition`, outermost first.
fn adjacent_decorators(node: Node, source: &[u8]) -> Vec<(String, usize)> {
    let mut found = Vec::new();
    let mut current = node.prev_named_sibling();
    while let Some(sib) = current {
        match sib.kind() {
            "decorator" => {
                if let Some(name) = decorator_name(sib, source) {
                    found.push((name, start_line(sib)));
                }
            }
            "comment" => {}
            _ => break,
        }
        current = sib.prev_named_sibling();
    }
    found.reverse();
    found
}

fn decorator_name(decorator: Node, source: &[u8]) -> Option<String> {
    let expr = named_children(decorator)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    let target = if expr.kind() == "call" {
        expr.child_by_field_name("function")?
    } else {
        expr
    };
    let name = node_text(target, source).trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// Base class names (last dotted segment) and whether `metaclass=ABCMeta` was given.
fn superclasses(class: Node, source: &[u8]) -> (Vec<String>, bool) {
    let mut bases = Vec::new();
    let mut abstract_meta = false;
    let Some(list) = class.child_by_field_name("superclasses") else {
        return (bases, false);
    };
    for arg in named_children(list) {
        match arg.kind() {
            "identifier" | "attribute" => {
                let text = node_text(arg, source);
                let last = text.rsplit('.').next().unwrap_or(text);
                bases.push(last.to_owned());
            }
            "subscript" => {
                if let Some(value) = arg.child_by_field_name("value") {
                    let text = node_text(value, source);
                    bases.push(text.rsplit('.').next().unwrap_or(text).to_owned());
                }
            }
            "keyword_argument" => {
                let key = field_text(arg, "name", source).unwrap_or("");
                let value = field_text(arg, "value", source).unwrap_or("");
                if key == "metaclass" && value.ends_with("ABCMeta") {
                    abstract_meta = true;
                }
            }
            _ => {}
        }
    }
    (bases, abstract_meta)
}

fn is_module_level_assignment(assignment: Node) -> bool {
    assignment
        .parent()
        .filter(|p| p.kind() == "expression_statement")
        .and_then(|p| p.parent())
        .is_some_and(|gp| gp.kind() == "module")
}

fn value_kind(node: Node) -> ValueKind {
    match node.kind() {
        "string" | "concatenated_string" => ValueKind::String,
        "integer" | "float" => ValueKind::Number,
        "true" | "false" => ValueKind::Boolean,
        "list" | "tuple" | "set" | "list_comprehension" | "set_comprehension" => ValueKind::Array,
        "dictionary" | "dictionary_comprehension" => ValueKind::Object,
        "lambda" => ValueKind::Function,
        _ => ValueKind::Unknown,
    }
}

fn call_site(call: Node, source: &[u8]) -> Option<CallSite> {
    let function = call.child_by_field_name("function")?;
    let line = start_line(call);
    match function.kind() {
        "identifier" => Some(CallSite::simple(node_text(function, source), line)),
        "attribute" => {
            let object = function.child_by_field_name("object")?;
            let attr = function.child_by_field_name("attribute")?;
            Some(CallSite::attribute(
                node_text(attr, source),
                node_text(object, source),
                line,
            ))
        }
        _ => None,
    }
}

/// `import a.b`, `import numpy as np`
fn import_statement(node: Node, source: &[u8], path: &str, out: &mut Vec<ImportInfo>) {
    let line = start_line(node);
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        match name.kind() {
            "dotted_name" => {
                let module = node_text(name, source);
                out.push(ImportInfo::new(path, module, module, ImportKind::Module, line));
            }
            "aliased_import" => {
                let Some(module) = field_text(name, "name", source) else {
                    continue;
                };
                let alias = field_text(name, "alias", source).map(str::to_owned);
                out.push(
                    ImportInfo::new(path, module, module, ImportKind::Module, line).with_alias(alias),
                );
            }
            _ => {}
        }
    }
}

/// `from pkg.mod import a, b as c`, `from . import x`, `from m import *`
fn import_from(node: Node, source: &[u8], path: &str, out: &mut Vec<ImportInfo>) {
    let line = start_line(node);
    let Some(module) = field_text(node, "module_name", source) else {
        return;
    };

    if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
        out.push(ImportInfo::new(path, "*", module, ImportKind::Wildcard, line));
        return;
    }

    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        match name.kind() {
            "dotted_name" => {
                out.push(ImportInfo::new(
                    path,
                    node_text(name, source),
                    module,
                    ImportKind::From,
                    line,
                ));
            }
            "aliased_import" => {
                let Some(imported) = field_text(name, "name", source) else {
                    continue;
                };
                let alias = field_text(name, "alias", source).map(str::to_owned);
                out.push(
                    ImportInfo::new(path, imported, module, ImportKind::From, line).with_alias(alias),
                );
            }
            _ => {}
        }
    }
}
