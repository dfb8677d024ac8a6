use std::collections::HashSet;
use std::sync::OnceLock;

use tree_sitter::{Node, Query, Tree};

use crate::graph::node::NodeKind;

use super::languages::Grammar;
use super::{
    CallSite, Definition, ExtractorKind, FileExtraction, ImportInfo, ImportKind, ScopeMap,
    ValueKind, captured_ids, compile_query, end_line, named_children, node_text, preorder,
    start_line, unquote,
};

/// Go methods are top-level declarations with a receiver.
const METHOD_QUERY: &str = r#"
    (method_declaration) @method
"#;

static METHODS: OnceLock<Option<Query>> = OnceLock::new();

fn method_query() -> Option<&'static Query> {
    METHODS
        .get_or_init(|| compile_query(Grammar::Go, METHOD_QUERY))
        .as_ref()
}

pub(crate) fn extract(tree: &Tree, source: &[u8], path: &str) -> FileExtraction {
    let methods: HashSet<usize> = method_query()
        .map(|q| captured_ids(q, "method", tree, source))
        .unwrap_or_default();

    let mut out = FileExtraction::new(ExtractorKind::TreeSitter);
    let mut scopes = ScopeMap::default();

    for node in preorder(tree.root_node()) {
        match node.kind() {
            "function_declaration" | "method_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Function, start_line(node));
                def.end_line = Some(end_line(node));
                if methods.contains(&node.id()) {
                    def.kind = NodeKind::Method;
                    def.parent_class = node
                        .child_by_field_name("receiver")
                        .and_then(|r| receiver_type(r, source));
                }
                out.definitions.push(def);
                scopes.insert(node, out.definitions.len() - 1);
            }
            "type_spec" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let Some(ty) = node.child_by_field_name("type") else {
                    continue;
                };
                let (kind, base_types) = match ty.kind() {
                    "struct_type" => (NodeKind::Class, embedded_fields(ty, source)),
                    "interface_type" => (NodeKind::Interface, embedded_interfaces(ty, source)),
                    _ => continue,
                };
                let mut def = Definition::new(name, kind, start_line(node));
                def.end_line = Some(end_line(node));
                def.base_types = base_types;
                out.definitions.push(def);
            }
            "method_elem" | "method_spec" => {
                // Interface method sets.
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Method, start_line(node));
                def.end_line = Some(end_line(node));
                def.parent_class = interface_owner(node, source);
                out.definitions.push(def);
            }
            "var_spec" | "const_spec" => {
                if !is_top_level_spec(node) {
                    continue;
                }
                var_spec(node, source, &mut out, &mut scopes);
            }
            "call_expression" => {
                if let Some(mut call) = call_site(node, source) {
                    call.enclosing = scopes.enclosing(node);
                    out.calls.push(call);
                }
            }
            "import_spec" => import_spec(node, source, path, &mut out.imports),
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

/// Bare type name: strips pointers, package qualifiers and type arguments.
fn type_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "type_identifier" => Some(node_text(node, source).to_owned()),
        "pointer_type" => named_children(node)
            .into_iter()
            .next()
            .and_then(|t| type_name(t, source)),
        "qualified_type" => field_text(node, "name", source).map(str::to_owned),
        "generic_type" => node
            .child_by_field_name("type")
            .and_then(|t| type_name(t, source)),
        _ => None,
    }
}

/// `func (s *Server) Run()` -> `Server`
fn receiver_type(receiver: Node, source: &[u8]) -> Option<String> {
    named_children(receiver)
        .into_iter()
        .filter(|p| p.kind() == "parameter_declaration")
        .find_map(|p| {
            p.child_by_field_name("type")
                .and_then(|t| type_name(t, source))
        })
}

/// Embedded (anonymous) struct fields become base types.
fn embedded_fields(struct_type: Node, source: &[u8]) -> Vec<String> {
    let Some(list) = named_children(struct_type)
        .into_iter()
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return Vec::new();
    };
    named_children(list)
        .into_iter()
        .filter(|f| f.kind() == "field_declaration" && f.child_by_field_name("name").is_none())
        .filter_map(|f| f.child_by_field_name("type").and_then(|t| type_name(t, source)))
        .collect()
}

/// Interfaces embedded in an interface type.
fn embedded_interfaces(interface: Node, source: &[u8]) -> Vec<String> {
    let mut bases = Vec::new();
    for elem in named_children(interface) {
        if matches!(elem.kind(), "method_elem" | "method_spec" | "comment") {
            continue;
        }
        if let Some(name) = type_name(elem, source) {
            bases.push(name);
            continue;
        }
        bases.extend(
            named_children(elem)
                .into_iter()
                .filter_map(|t| type_name(t, source)),
        );
    }
    bases
}

fn interface_owner(method: Node, source: &[u8]) -> Option<String> {
    let mut current = method.parent();
    while let Some(n) = current {
        if n.kind() == "type_spec" {
            return field_text(n, "name", source).map(str::to_owned);
        }
        current = n.parent();
    }
    None
}

/// `var`/`const` spec directly under a file-level declaration, grouped or not.
fn is_top_level_spec(spec: Node) -> bool {
    let mut current = spec.parent();
    while let Some(n) = current {
        match n.kind() {
            "var_declaration" | "const_declaration" => {
                return n.parent().is_some_and(|p| p.kind() == "source_file");
            }
            "var_spec_list" | "const_spec_list" => current = n.parent(),
            _ => return false,
        }
    }
    false
}

fn var_spec(spec: Node, source: &[u8], out: &mut FileExtraction, scopes: &mut ScopeMap) {
    let values: Vec<Node> = spec
        .child_by_field_name("value")
        .map(named_children)
        .unwrap_or_default();
    let mut cursor = spec.walk();
    let names: Vec<Node> = spec.children_by_field_name("name", &mut cursor).collect();
    for (i, name) in names.into_iter().enumerate() {
        let value = values.get(i).copied();
        let text = node_text(name, source);
        if text == "_" {
            continue;
        }
        let kind = value.map_or(ValueKind::Unknown, value_kind);
        let node_kind = if kind == ValueKind::Function {
            NodeKind::Function
        } else {
            NodeKind::Variable
        };
        let mut def = Definition::new(text, node_kind, start_line(spec));
        def.end_line = Some(end_line(spec));
        def.value_kind = Some(kind);
        out.definitions.push(def);
        if let Some(v) = value.filter(|_| node_kind == NodeKind::Function) {
            scopes.insert(v, out.definitions.len() - 1);
        }
    }
}

fn value_kind(node: Node) -> ValueKind {
    match node.kind() {
        "interpreted_string_literal" | "raw_string_literal" => ValueKind::String,
        "int_literal" | "float_literal" | "imaginary_literal" => ValueKind::Number,
        "true" | "false" => ValueKind::Boolean,
        "func_literal" => ValueKind::Function,
        "composite_literal" => match node.child_by_field_name("type").map(|t| t.kind()) {
            Some("slice_type" | "array_type" | "implicit_length_array_type") => ValueKind::Array,
            Some(_) => ValueKind::Object,
            None => ValueKind::Unknown,
        },
        _ => ValueKind::Unknown,
    }
}

fn call_site(call: Node, source: &[u8]) -> Option<CallSite> {
    let function = call.child_by_field_name("function")?;
    let line = start_line(call);
    match function.kind() {
        "identifier" => Some(CallSite::simple(node_text(function, source), line)),
        "selector_expression" => {
            let operand = function.child_by_field_name("operand")?;
            let field = function.child_by_field_name("field")?;
            Some(CallSite::attribute(
                node_text(field, source),
                node_text(operand, source),
                line,
            ))
        }
        _ => None,
    }
}

/// `import "fmt"`, `import f "fmt"`, `import . "strings"`
fn import_spec(spec: Node, source: &[u8], path: &str, out: &mut Vec<ImportInfo>) {
    let Some(module) = spec
        .child_by_field_name("path")
        .map(|p| unquote(node_text(p, source)))
    else {
        return;
    };
    let package = module.rsplit('/').next().unwrap_or(module);
    let line = start_line(spec);
    match field_text(spec, "name", source) {
        Some(".") => out.push(ImportInfo::new(path, "*", module, ImportKind::Wildcard, line)),
        Some("_") | None => {
            out.push(ImportInfo::new(path, package, module, ImportKind::Module, line));
        }
        Some(alias) => out.push(
            ImportInfo::new(path, package, module, ImportKind::Module, line)
                .with_alias(Some(alias.to_owned())),
        ),
    }
}
