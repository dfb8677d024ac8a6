use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use tree_sitter::{Node, Query, Tree};

use crate::graph::node::NodeKind;

use super::languages::Grammar;
use super::{
    CallSite, Definition, ExtractorKind, FileExtraction, ImportInfo, ImportKind, ScopeMap,
    ValueKind, captured_ids, compile_query, end_line, named_children, node_text, preorder,
    start_line,
};

/// Functions declared in `impl` and `trait` bodies.
const METHOD_QUERY: &str = r#"
    (impl_item body: (declaration_list (function_item) @method))
    (trait_item body: (declaration_list (function_item) @method))
    (trait_item body: (declaration_list (function_signature_item) @method))
"#;

static METHODS: OnceLock<Option<Query>> = OnceLock::new();

fn method_query() -> Option<&'static Query> {
    METHODS
        .get_or_init(|| compile_query(Grammar::Rust, METHOD_QUERY))
        .as_ref()
}

pub(crate) fn extract(tree: &Tree, source: &[u8], path: &str) -> FileExtraction {
    let methods: HashSet<usize> = method_query()
        .map(|q| captured_ids(q, "method", tree, source))
        .unwrap_or_default();

    let mut out = FileExtraction::new(ExtractorKind::TreeSitter);
    let mut scopes = ScopeMap::default();
    // type name -> traits implemented for it in this file
    let mut trait_impls: HashMap<String, Vec<String>> = HashMap::new();

    for node in preorder(tree.root_node()) {
        match node.kind() {
            "function_item" | "function_signature_item" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Function, start_line(node));
                def.end_line = Some(end_line(node));
                if methods.contains(&node.id()) {
                    def.kind = NodeKind::Method;
                    def.parent_class = owner_type(node, source);
                } else if node.kind() == "function_signature_item" {
                    // Foreign function declarations outside a trait.
                    continue;
                }
                out.definitions.push(def);
                scopes.insert(node, out.definitions.len() - 1);
            }
            "struct_item" | "union_item" | "enum_item" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let kind = if node.kind() == "enum_item" {
                    NodeKind::Enum
                } else {
                    NodeKind::Class
                };
                let mut def = Definition::new(name, kind, start_line(node));
                def.end_line = Some(end_line(node));
                out.definitions.push(def);
            }
            "trait_item" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Interface, start_line(node));
                def.end_line = Some(end_line(node));
                if let Some(bounds) = node.child_by_field_name("bounds") {
                    def.base_types = named_children(bounds)
                        .into_iter()
                        .filter_map(|b| type_name(b, source))
                        .collect();
                }
                out.definitions.push(def);
            }
            "impl_item" => {
                let trait_name = node
                    .child_by_field_name("trait")
                    .and_then(|t| type_name(t, source));
                let self_type = node
                    .child_by_field_name("type")
                    .and_then(|t| type_name(t, source));
                if let (Some(trait_name), Some(self_type)) = (trait_name, self_type) {
                    trait_impls.entry(self_type).or_default().push(trait_name);
                }
            }
            "const_item" | "static_item" => {
                if !is_item_level(node) {
                    continue;
                }
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Variable, start_line(node));
                def.end_line = Some(end_line(node));
                def.value_kind = Some(
                    node.child_by_field_name("value")
                        .map_or(ValueKind::Unknown, value_kind),
                );
                out.definitions.push(def);
            }
            "call_expression" => {
                if let Some(mut call) = node
                    .child_by_field_name("function")
                    .and_then(|f| call_site(f, start_line(node), source))
                {
                    call.enclosing = scopes.enclosing(node);
                    out.calls.push(call);
                }
            }
            "use_declaration" => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    use_tree(argument, "", path, start_line(node), source, &mut out.imports);
                }
            }
            _ => {}
        }
    }

    // `impl Trait for Type` contributes `Trait` to the type's base types.
    for def in &mut out.definitions {
        if !matches!(def.kind, NodeKind::Class | NodeKind::Enum) {
            continue;
        }
        if let Some(traits) = trait_impls.get(&def.name) {
            for t in traits {
                if !def.base_types.contains(t) {
                    def.base_types.push(t.clone());
                }
            }
        }
    }

    out
}

fn field_text<'a>(node: Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source))
        .filter(|s| !s.is_empty())
}

/// Bare type name without path, generics or references.
fn type_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "type_identifier" | "identifier" => Some(node_text(node, source).to_owned()),
        "scoped_type_identifier" | "scoped_identifier" => field_text(node, "name", source)
            .map(str::to_owned),
        "generic_type" => node
            .child_by_field_name("type")
            .and_then(|t| type_name(t, source)),
        "reference_type" => node
            .child_by_field_name("type")
            .and_then(|t| type_name(t, source)),
        _ => None,
    }
}

/// The impl type or trait that owns a method.
fn owner_type(method: Node, source: &[u8]) -> Option<String> {
    let mut current = method.parent();
    while let Some(n) = current {
        match n.kind() {
            "impl_item" => {
                return n
                    .child_by_field_name("type")
                    .and_then(|t| type_name(t, source));
            }
            "trait_item" => return field_text(n, "name", source).map(str::to_owned),
            _ => current = n.parent(),
        }
    }
    None
}

/// Items at file level or directly inside an inline `mod` block.
fn is_item_level(node: Node) -> bool {
    match node.parent() {
        Some(p) if p.kind() == "source_file" => true,
        Some(p) if p.kind() == "declaration_list" => {
            p.parent().is_some_and(|gp| gp.kind() == "mod_item")
        }
        _ => false,
    }
}

fn value_kind(node: Node) -> ValueKind {
    match node.kind() {
        "string_literal" | "raw_string_literal" => ValueKind::String,
        "integer_literal" | "float_literal" => ValueKind::Number,
        "boolean_literal" => ValueKind::Boolean,
        "array_expression" => ValueKind::Array,
        "struct_expression" | "tuple_expression" => ValueKind::Object,
        "closure_expression" => ValueKind::Function,
        _ => ValueKind::Unknown,
    }
}

fn call_site(function: Node, line: usize, source: &[u8]) -> Option<CallSite> {
    match function.kind() {
        "identifier" => Some(CallSite::simple(node_text(function, source), line)),
        // `Type::new()`, `crate::util::helper()`
        "scoped_identifier" => {
            let name = field_text(function, "name", source)?;
            match function.child_by_field_name("path") {
                Some(p) => Some(CallSite::attribute(name, node_text(p, source), line)),
                None => Some(CallSite::simple(name, line)),
            }
        }
        // `self.save()`, `value.method()`
        "field_expression" => {
            let value = function.child_by_field_name("value")?;
            let field = field_text(function, "field", source)?;
            Some(CallSite::attribute(field, node_text(value, source), line))
        }
        // `parse::<T>()`
        "generic_function" => function
            .child_by_field_name("function")
            .and_then(|f| call_site(f, line, source)),
        _ => None,
    }
}

fn join_path(prefix: &str, part: &str) -> String {
    if prefix.is_empty() {
        part.to_owned()
    } else {
        format!("{prefix}::{part}")
    }
}

/// Flatten a `use` tree into one import per bound name.
fn use_tree(
    node: Node,
    prefix: &str,
    path: &str,
    line: usize,
    source: &[u8],
    out: &mut Vec<ImportInfo>,
) {
    match node.kind() {
        "identifier" | "crate" | "super" => {
            let name = node_text(node, source);
            let module = if prefix.is_empty() { name } else { prefix };
            out.push(ImportInfo::new(path, name, module, ImportKind::Use, line));
        }
        "self" => {
            // `use a::b::{self}` binds `b`.
            let name = prefix.rsplit("::").next().unwrap_or(prefix);
            if !name.is_empty() {
                out.push(ImportInfo::new(path, name, prefix, ImportKind::Use, line));
            }
        }
        "scoped_identifier" => {
            let Some(name) = field_text(node, "name", source) else {
                return;
            };
            let module = match node.child_by_field_name("path") {
                Some(p) => join_path(prefix, node_text(p, source)),
                None => prefix.to_owned(),
            };
            out.push(ImportInfo::new(path, name, module, ImportKind::Use, line));
        }
        "use_as_clause" => {
            let Some(target) = node.child_by_field_name("path") else {
                return;
            };
            let alias = field_text(node, "alias", source).map(str::to_owned);
            let before = out.len();
            use_tree(target, prefix, path, line, source, out);
            if let Some(import) = out.get_mut(before) {
                import.alias = alias;
            }
        }
        "scoped_use_list" => {
            let nested = match node.child_by_field_name("path") {
                Some(p) => join_path(prefix, node_text(p, source)),
                None => prefix.to_owned(),
            };
            if let Some(list) = node.child_by_field_name("list") {
                use_tree(list, &nested, path, line, source, out);
            }
        }
        "use_list" => {
            for item in named_children(node) {
                use_tree(item, prefix, path, line, source, out);
            }
        }
        "use_wildcard" => {
            let module = named_children(node)
                .into_iter()
                .next()
                .map(|p| join_path(prefix, node_text(p, source)))
                .unwrap_or_else(|| prefix.to_owned());
            out.push(ImportInfo::new(path, "*", module, ImportKind::Wildcard, line));
        }
        _ => {}
    }
}
