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

// ---------------------------------------------------------------------------
// Method-marking queries
// ---------------------------------------------------------------------------

const METHOD_QUERY_JS: &str = r#"
    (class_body (method_definition) @method)
"#;

/// TypeScript adds abstract members and interface method signatures.
const METHOD_QUERY_TS: &str = r#"
    (class_body (method_definition) @method)
    (class_body (abstract_method_signature) @method)
    (interface_body (method_signature) @method)
"#;

static JS_METHODS: OnceLock<Option<Query>> = OnceLock::new();
static TS_METHODS: OnceLock<Option<Query>> = OnceLock::new();
static TSX_METHODS: OnceLock<Option<Query>> = OnceLock::new();

fn method_query(grammar: Grammar) -> Option<&'static Query> {
    let (cell, pattern) = match grammar {
        Grammar::TypeScript => (&TS_METHODS, METHOD_QUERY_TS),
        Grammar::Tsx => (&TSX_METHODS, METHOD_QUERY_TS),
        _ => (&JS_METHODS, METHOD_QUERY_JS),
    };
    cell.get_or_init(|| compile_query(grammar, pattern)).as_ref()
}

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

pub(crate) fn extract(tree: &Tree, source: &[u8], path: &str, grammar: Grammar) -> FileExtraction {
    let methods: HashSet<usize> = method_query(grammar)
        .map(|q| captured_ids(q, "method", tree, source))
        .unwrap_or_default();

    let mut out = FileExtraction::new(ExtractorKind::TreeSitter);
    let mut scopes = ScopeMap::default();

    for node in preorder(tree.root_node()) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Function, start_line(node));
                def.end_line = Some(end_line(node));
                out.definitions.push(def);
                scopes.insert(node, out.definitions.len() - 1);
            }
            "class_declaration" | "abstract_class_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Class, start_line(node));
                def.end_line = Some(end_line(node));
                def.base_types = class_heritage(node, source);
                push_decorated(&mut out, def, node, source);
            }
            "interface_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Interface, start_line(node));
                def.end_line = Some(end_line(node));
                def.base_types = interface_extends(node, source);
                out.definitions.push(def);
            }
            "enum_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Enum, start_line(node));
                def.end_line = Some(end_line(node));
                out.definitions.push(def);
            }
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                if !methods.contains(&node.id()) {
                    // Object-literal methods are not definitions.
                    continue;
                }
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Method, start_line(node));
                def.end_line = Some(end_line(node));
                def.parent_class = enclosing_type(node, source);
                let idx = push_decorated(&mut out, def, node, source);
                scopes.insert(node, idx);
            }
            "public_field_definition" | "field_definition" => {
                let Some(value) = node.child_by_field_name("value") else {
                    continue;
                };
                if !FUNCTION_VALUES.contains(&value.kind()) {
                    continue;
                }
                let name_node = node
                    .child_by_field_name("name")
                    .or_else(|| node.child_by_field_name("property"));
                let Some(name) = name_node.map(|n| node_text(n, source)) else {
                    continue;
                };
                let mut def = Definition::new(name, NodeKind::Method, start_line(node));
                def.end_line = Some(end_line(node));
                def.parent_class = enclosing_type(node, source);
                def.value_kind = Some(ValueKind::Function);
                let idx = push_decorated(&mut out, def, node, source);
                scopes.insert(value, idx);
            }
            "variable_declarator" => {
                variable_declarator(node, source, path, &mut out, &mut scopes);
            }
            "call_expression" => {
                if let Some(mut call) = call_site(node, source) {
                    call.enclosing = scopes.enclosing(node);
                    out.calls.push(call);
                }
            }
            "new_expression" => {
                let Some(ctor) = node.child_by_field_name("constructor") else {
                    continue;
                };
                if ctor.kind() == "identifier" {
                    let mut call = CallSite::simple(node_text(ctor, source), start_line(node));
                    call.enclosing = scopes.enclosing(node);
                    out.calls.push(call);
                }
            }
            "import_statement" => import_statement(node, source, path, &mut out.imports),
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

/// `const x = ...` / `let f = () => ...` / `const fs = require('fs')`
fn variable_declarator(
    node: Node,
    source: &[u8],
    path: &str,
    out: &mut FileExtraction,
    scopes: &mut ScopeMap,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let value = node.child_by_field_name("value");

    if let Some(specifier) = value.and_then(|v| require_specifier(v, source)) {
        require_bindings(name_node, specifier, source, path, &mut out.imports);
        if name_node.kind() == "identifier" && is_top_level(node) {
            let mut def = Definition::new(
                node_text(name_node, source),
                NodeKind::Variable,
                start_line(node),
            );
            def.end_line = Some(end_line(node));
            def.import_path = Some(specifier.to_owned());
            def.value_kind = Some(ValueKind::Object);
            out.definitions.push(def);
        }
        return;
    }

    if name_node.kind() != "identifier" {
        return;
    }
    let name = node_text(name_node, source);

    match value {
        Some(v) if FUNCTION_VALUES.contains(&v.kind()) => {
            let mut def = Definition::new(name, NodeKind::Function, start_line(node));
            def.end_line = Some(end_line(node));
            def.value_kind = Some(ValueKind::Function);
            out.definitions.push(def);
            scopes.insert(v, out.definitions.len() - 1);
        }
        Some(v) if v.kind() == "class" => {
            let mut def = Definition::new(name, NodeKind::Class, start_line(node));
            def.end_line = Some(end_line(node));
            def.base_types = class_heritage(v, source);
            out.definitions.push(def);
        }
        _ if is_top_level(node) => {
            let mut def = Definition::new(name, NodeKind::Variable, start_line(node));
            def.end_line = Some(end_line(node));
            def.value_kind = Some(value.map_or(ValueKind::Unknown, value_kind));
            out.definitions.push(def);
        }
        _ => {}
    }
}

/// Declarator inside a `const`/`let`/`var` statement at program level
/// (optionally wrapped in `export`).
fn is_top_level(declarator: Node) -> bool {
    let Some(declaration) = declarator.parent() else {
        return false;
    };
    if !matches!(declaration.kind(), "lexical_declaration" | "variable_declaration") {
        return false;
    }
    match declaration.parent() {
        Some(p) if p.kind() == "program" => true,
        Some(p) if p.kind() == "export_statement" => {
            p.parent().is_some_and(|gp| gp.kind() == "program")
        }
        _ => false,
    }
}

fn value_kind(node: Node) -> ValueKind {
    match node.kind() {
        "string" | "template_string" => ValueKind::String,
        "number" => ValueKind::Number,
        "true" | "false" => ValueKind::Boolean,
        "array" => ValueKind::Array,
        "object" => ValueKind::Object,
        k if FUNCTION_VALUES.contains(&k) => ValueKind::Function,
        _ => ValueKind::Unknown,
    }
}

/// Name of the class, interface or class expression whose body holds `node`.
fn enclosing_type(node: Node, source: &[u8]) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if CLASS_KINDS.contains(&n.kind()) || n.kind() == "interface_declaration" {
            if let Some(name) = field_text(n, "name", source) {
                return Some(name.to_owned());
            }
            // `const Foo = class { ... }`
            return n
                .parent()
                .filter(|p| p.kind() == "variable_declarator")
                .and_then(|p| field_text(p, "name", source))
                .map(str::to_owned);
        }
        current = n.parent();
    }
    None
}

/// Bare type name: last segment of a dotted name, without type arguments.
fn type_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "type_identifier" => Some(node_text(node, source).to_owned()),
        "member_expression" | "nested_type_identifier" | "nested_identifier" => {
            let text = node_text(node, source);
            text.rsplit('.').next().map(str::to_owned)
        }
        "generic_type" => node
            .child_by_field_name("name")
            .and_then(|n| type_name(n, source)),
        _ => None,
    }
}

/// `extends Base implements A, B` for classes (both grammars).
fn class_heritage(class: Node, source: &[u8]) -> Vec<String> {
    let mut bases = Vec::new();
    let Some(heritage) = named_children(class)
        .into_iter()
        .find(|c| c.kind() == "class_heritage")
    else {
        return bases;
    };
    for clause in named_children(heritage) {
        match clause.kind() {
            "extends_clause" | "implements_clause" => {
                bases.extend(
                    named_children(clause)
                        .into_iter()
                        .filter_map(|t| type_name(t, source)),
                );
            }
            _ => bases.extend(type_name(clause, source)),
        }
    }
    bases
}

/// `interface A extends B, C`
fn interface_extends(interface: Node, source: &[u8]) -> Vec<String> {
    named_children(interface)
        .into_iter()
        .filter(|c| c.kind() == "extends_type_clause")
        .flat_map(named_children)
        .filter_map(|t| type_name(t, source))
        .collect()
}

// ---------------------------------------------------------------------------
// Decorators
// ---------------------------------------------------------------------------

fn push_decorated(out: &mut FileExtraction, mut def: Definition, node: Node, source: &[u8]) -> usize {
    let decorators = decorators_of(node, source);
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

/// Decorators attached to a class or member, in source order.
///
/// Depending on grammar and position they are children of the declaration,
/// children of the wrapping `export` statement, or preceding siblings inside
/// a class body.
fn decorators_of(node: Node, source: &[u8]) -> Vec<(String, usize)> {
    let mut nodes: Vec<Node> = named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .collect();

    if let Some(parent) = node.parent().filter(|p| p.kind() == "export_statement") {
        nodes.extend(
            named_children(parent)
                .into_iter()
                .filter(|c| c.kind() == "decorator"),
        );
    }

    let mut current = node.prev_named_sibling();
    while let Some(sib) = current {
        match sib.kind() {
            "decorator" => nodes.push(sib),
            "comment" => {}
            _ => break,
        }
        current = sib.prev_named_sibling();
    }

    nodes.sort_by_key(|n| n.start_byte());
    nodes.dedup_by_key(|n| n.id());
    nodes
        .into_iter()
        .filter_map(|d| decorator_name(d, source).map(|name| (name, start_line(d))))
        .collect()
}

fn decorator_name(decorator: Node, source: &[u8]) -> Option<String> {
    let expr = named_children(decorator)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    let target = if expr.kind() == "call_expression" {
        expr.child_by_field_name("function")?
    } else {
        expr
    };
    let name = node_text(target, source).trim();
    (!name.is_empty()).then(|| name.to_owned())
}

// ---------------------------------------------------------------------------
// Calls and imports
// ---------------------------------------------------------------------------

fn call_site(call: Node, source: &[u8]) -> Option<CallSite> {
    let function = call.child_by_field_name("function")?;
    let line = start_line(call);
    match function.kind() {
        "identifier" => {
            let name = node_text(function, source);
            // Module loading is recorded as an import, not a call.
            (name != "require").then(|| CallSite::simple(name, line))
        }
        "member_expression" => {
            let object = function.child_by_field_name("object")?;
            let property = function.child_by_field_name("property")?;
            Some(CallSite::attribute(
                node_text(property, source),
                node_text(object, source),
                line,
            ))
        }
        _ => None,
    }
}

/// The module specifier of a `require('x')` call.
fn require_specifier<'a>(value: Node, source: &'a [u8]) -> Option<&'a str> {
    if value.kind() != "call_expression" {
        return None;
    }
    let function = value.child_by_field_name("function")?;
    if node_text(function, source) != "require" {
        return None;
    }
    let args = value.child_by_field_name("arguments")?;
    let first = named_children(args).into_iter().next()?;
    (first.kind() == "string").then(|| unquote(node_text(first, source)))
}

fn require_bindings(
    pattern: Node,
    specifier: &str,
    source: &[u8],
    path: &str,
    out: &mut Vec<ImportInfo>,
) {
    let line = start_line(pattern);
    match pattern.kind() {
        "identifier" => out.push(ImportInfo::new(
            path,
            node_text(pattern, source),
            specifier,
            ImportKind::Require,
            line,
        )),
        "object_pattern" => {
            for prop in named_children(pattern) {
                match prop.kind() {
                    "shorthand_property_identifier_pattern" => out.push(ImportInfo::new(
                        path,
                        node_text(prop, source),
                        specifier,
                        ImportKind::Named,
                        line,
                    )),
                    "pair_pattern" => {
                        let Some(key) = field_text(prop, "key", source) else {
                            continue;
                        };
                        let alias = field_text(prop, "value", source).map(str::to_owned);
                        out.push(
                            ImportInfo::new(path, key, specifier, ImportKind::Named, line)
                                .with_alias(alias),
                        );
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// ESM `import` statements.
fn import_statement(node: Node, source: &[u8], path: &str, out: &mut Vec<ImportInfo>) {
    let Some(specifier) = node
        .child_by_field_name("source")
        .map(|s| unquote(node_text(s, source)))
    else {
        return;
    };
    let line = start_line(node);

    let Some(clause) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "import_clause")
    else {
        // Side-effect import: `import './styles.css'`
        out.push(ImportInfo::new(path, specifier, specifier, ImportKind::Module, line));
        return;
    };

    for part in named_children(clause) {
        match part.kind() {
            "identifier" => out.push(ImportInfo::new(
                path,
                node_text(part, source),
                specifier,
                ImportKind::Default,
                line,
            )),
            "namespace_import" => {
                let alias = named_children(part)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                    .map(|c| node_text(c, source).to_owned());
                out.push(
                    ImportInfo::new(path, "*", specifier, ImportKind::Namespace, line)
                        .with_alias(alias),
                );
            }
            "named_imports" => {
                for spec in named_children(part)
                    .into_iter()
                    .filter(|s| s.kind() == "import_specifier")
                {
                    let Some(name) = field_text(spec, "name", source) else {
                        continue;
                    };
                    let alias = field_text(spec, "alias", source).map(str::to_owned);
                    out.push(
                        ImportInfo::new(path, name, specifier, ImportKind::Named, line)
                            .with_alias(alias),
                    );
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::languages::GrammarRegistry;
    use crate::parser::{CallKind, FileExtraction};

    fn run(src: &str, grammar: Grammar) -> FileExtraction {
        let mut registry = GrammarRegistry::new();
        let tree = registry.parse(grammar, src).unwrap();
        extract(&tree, src.as_bytes(), "src/app.ts", grammar).finish()
    }

    fn find<'a>(out: &'a FileExtraction, name: &str) -> &'a Definition {
        out.definitions
            .iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("missing definition {name}"))
    }

    #[test]
    fn test_js_functions_classes_and_methods() {
        let src = "\
function helper() {}
function* gen() {}
const arrow = () => 1;
class Base { save() {} }
class Child extends Base {
  save() { helper(); }
  handle = () => this.save();
}
const obj = { notAMethod() {} };
";
        let out = run(src, Grammar::JavaScript);
        assert_eq!(find(&out, "helper").kind, NodeKind::Function);
        assert_eq!(find(&out, "gen").kind, NodeKind::Function);
        assert_eq!(find(&out, "arrow").kind, NodeKind::Function);
        assert_eq!(find(&out, "Child").base_types, vec!["Base".to_owned()]);
        let handle = find(&out, "handle");
        assert_eq!(handle.kind, NodeKind::Method, "arrow class field is a method");
        assert_eq!(handle.parent_class.as_deref(), Some("Child"));
        assert!(out.definitions.iter().all(|d| d.name != "notAMethod"));
        assert_eq!(find(&out, "obj").value_kind, Some(ValueKind::Object));

        let saves: Vec<_> = out
            .definitions
            .iter()
            .filter(|d| d.name == "save")
            .map(|d| (d.kind, d.parent_class.as_deref()))
            .collect();
        assert_eq!(
            saves,
            vec![(NodeKind::Method, Some("Base")), (NodeKind::Method, Some("Child"))]
        );

        let helper_call = out.calls.iter().find(|c| c.callee == "helper").unwrap();
        let child_save = out
            .definitions
            .iter()
            .position(|d| d.name == "save" && d.parent_class.as_deref() == Some("Child"));
        assert_eq!(helper_call.enclosing, child_save);
    }

    #[test]
    fn test_ts_interfaces_enums_and_implements() {
        let src = "\
interface Shape extends Named { area(): number; }
interface Named { name: string; }
enum Color { Red, Green }
export class Square implements Shape, Named {
  area(): number { return 1; }
}
";
        let out = run(src, Grammar::TypeScript);
        let shape = find(&out, "Shape");
        assert_eq!(shape.kind, NodeKind::Interface);
        assert_eq!(shape.base_types, vec!["Named".to_owned()]);
        assert_eq!(find(&out, "Color").kind, NodeKind::Enum);
        assert_eq!(
            find(&out, "Square").base_types,
            vec!["Shape".to_owned(), "Named".to_owned()]
        );
        let areas: Vec<_> = out
            .definitions
            .iter()
            .filter(|d| d.name == "area")
            .map(|d| (d.kind, d.parent_class.as_deref()))
            .collect();
        assert_eq!(
            areas,
            vec![(NodeKind::Method, Some("Shape")), (NodeKind::Method, Some("Square"))]
        );
    }

    #[test]
    fn test_ts_decorators() {
        let src = "\
@Component({ selector: 'x' })
export class Widget {
  @Input() label: string;
  @HostListener('click')
  onClick() {}
}
";
        let out = run(src, Grammar::TypeScript);
        assert_eq!(find(&out, "Widget").decorators, vec!["Component".to_owned()]);
        assert_eq!(find(&out, "onClick").decorators, vec!["HostListener".to_owned()]);
        let targets: Vec<_> = out
            .definitions
            .iter()
            .filter(|d| d.kind == NodeKind::Decorator)
            .map(|d| (d.name.as_str(), d.decorates.as_ref().unwrap().name.as_str()))
            .collect();
        assert!(targets.contains(&("Component", "Widget")));
        assert!(targets.contains(&("HostListener", "onClick")));
    }

    #[test]
    fn test_imports_and_require() {
        let src = "\
import React from 'react';
import { a as b, c } from './util';
import * as ns from '../lib';
import './side-effect';
const fs = require('fs');
const { join, resolve: res } = require('path');
";
        let out = run(src, Grammar::JavaScript);
        let summary: Vec<_> = out
            .imports
            .iter()
            .map(|i| (i.local_name(), i.from_module.as_str(), i.import_kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("React", "react", ImportKind::Default),
                ("b", "./util", ImportKind::Named),
                ("c", "./util", ImportKind::Named),
                ("ns", "../lib", ImportKind::Namespace),
                ("./side-effect", "./side-effect", ImportKind::Module),
                ("fs", "fs", ImportKind::Require),
                ("join", "path", ImportKind::Named),
                ("res", "path", ImportKind::Named),
            ]
        );
        assert_eq!(find(&out, "fs").import_path.as_deref(), Some("fs"));
        assert!(
            out.calls.iter().all(|c| c.callee != "require"),
            "require() is an import, not a call"
        );
    }

    #[test]
    fn test_tsx_component() {
        let src = "\
export const App = () => <div onClick={() => track('x')}>hi</div>;
";
        let out = run(src, Grammar::Tsx);
        assert_eq!(find(&out, "App").kind, NodeKind::Function);
        let call = out.calls.iter().find(|c| c.callee == "track").unwrap();
        assert_eq!(call.kind, CallKind::Simple);
        assert_eq!(call.enclosing, Some(0));
    }
}
