pub mod ecmascript;
pub mod fallback;
pub mod generated;
pub mod go;
pub mod languages;
pub mod python;
pub mod rust;

use std::collections::HashSet;

use tree_sitter::{Node, Query, QueryCursor, StreamingIterator, Tree};

use crate::graph::node::NodeKind;
use crate::language::LanguageKind;

use languages::Grammar;

// ---------------------------------------------------------------------------
// Extractor output
// ---------------------------------------------------------------------------

/// Coarse classification of the value bound to a variable definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Function,
    Unknown,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Function => "function",
            ValueKind::Unknown => "unknown",
        }
    }
}

/// Identifies a definition within its file: `(name, parentClass, startLine)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey {
    pub name: String,
    pub parent_class: Option<String>,
    pub start_line: usize,
}

/// One named code construct found while walking a syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub kind: NodeKind,
    /// 1-based.
    pub start_line: usize,
    pub end_line: Option<usize>,
    /// Owning class, interface, trait, impl type or Go receiver type.
    pub parent_class: Option<String>,
    /// Decorator names, outermost first, without `@` or call arguments.
    pub decorators: Vec<String>,
    /// Superclasses, implemented interfaces, embedded types, implemented traits.
    pub base_types: Vec<String>,
    /// Module specifier a variable was bound from (`const fs = require('fs')`).
    pub import_path: Option<String>,
    pub value_kind: Option<ValueKind>,
    /// For `Decorator` definitions: the definition it is applied to.
    pub decorates: Option<DefinitionKey>,
}

impl Definition {
    pub fn new(name: impl Into<String>, kind: NodeKind, start_line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            start_line,
            end_line: None,
            parent_class: None,
            decorators: Vec::new(),
            base_types: Vec::new(),
            import_path: None,
            value_kind: None,
            decorates: None,
        }
    }

    pub fn key(&self) -> DefinitionKey {
        DefinitionKey {
            name: self.name.clone(),
            parent_class: self.parent_class.clone(),
            start_line: self.start_line,
        }
    }
}

/// How an import statement binds names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import os.path` / `import numpy as np` / Go `import "fmt"`.
    Module,
    /// `from pkg import name`.
    From,
    /// `from pkg import *`, `use a::*`.
    Wildcard,
    /// `import React from 'react'`.
    Default,
    /// `import { a as b } from './m'`, `const { a } = require('m')`.
    Named,
    /// `import * as ns from 'm'`.
    Namespace,
    /// `const m = require('m')`.
    Require,
    /// Rust `use a::b::C`.
    Use,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Module => "module",
            ImportKind::From => "from",
            ImportKind::Wildcard => "wildcard",
            ImportKind::Default => "default",
            ImportKind::Named => "named",
            ImportKind::Namespace => "namespace",
            ImportKind::Require => "require",
            ImportKind::Use => "use",
        }
    }

    /// Import forms whose local name stands for a whole module rather than
    /// one of its members.
    pub fn binds_module(&self) -> bool {
        matches!(
            self,
            ImportKind::Module | ImportKind::Namespace | ImportKind::Require | ImportKind::Default
        )
    }
}

/// One imported binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub file_path: String,
    /// Name as exported by the source module (`*` for wildcard/namespace imports).
    pub imported_name: String,
    pub alias: Option<String>,
    /// Module specifier as written (`./util`, `os.path`, `crate::graph`).
    pub from_module: String,
    pub import_kind: ImportKind,
    pub line: usize,
}

impl ImportInfo {
    pub fn new(
        file_path: &str,
        imported_name: impl Into<String>,
        from_module: impl Into<String>,
        import_kind: ImportKind,
        line: usize,
    ) -> Self {
        Self {
            file_path: file_path.to_owned(),
            imported_name: imported_name.into(),
            alias: None,
            from_module: from_module.into(),
            import_kind,
            line,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias.filter(|a| !a.is_empty());
        self
    }

    /// The name this import binds in the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.imported_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `helper()`
    Simple,
    /// `obj.method()`, `pkg.func()`, `Type::func()`
    Attribute,
}

/// One call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Called name: the identifier, or the final member of an attribute chain.
    pub callee: String,
    /// Full text of the receiver expression for attribute calls.
    pub receiver: Option<String>,
    pub kind: CallKind,
    pub line: usize,
    /// Index into the file's definitions of the innermost enclosing function or method.
    pub enclosing: Option<usize>,
}

impl CallSite {
    pub fn simple(callee: impl Into<String>, line: usize) -> Self {
        Self {
            callee: callee.into(),
            receiver: None,
            kind: CallKind::Simple,
            line,
            enclosing: None,
        }
    }

    pub fn attribute(callee: impl Into<String>, receiver: impl Into<String>, line: usize) -> Self {
        Self {
            callee: callee.into(),
            receiver: Some(receiver.into()),
            kind: CallKind::Attribute,
            line,
            enclosing: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    TreeSitter,
    Regex,
}

impl ExtractorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorKind::TreeSitter => "tree-sitter",
            ExtractorKind::Regex => "regex",
        }
    }
}

/// Everything mined from one file in a single extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct FileExtraction {
    pub definitions: Vec<Definition>,
    pub imports: Vec<ImportInfo>,
    pub calls: Vec<CallSite>,
    pub extractor: ExtractorKind,
}

impl FileExtraction {
    pub fn new(extractor: ExtractorKind) -> Self {
        Self {
            definitions: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            extractor,
        }
    }

    /// Drop anonymous definitions and remap `enclosing` indexes accordingly.
    pub(crate) fn finish(mut self) -> Self {
        let mut remap = Vec::with_capacity(self.definitions.len());
        let mut kept = Vec::with_capacity(self.definitions.len());
        for def in self.definitions {
            if is_valid_name(&def.name) {
                remap.push(Some(kept.len()));
                kept.push(def);
            } else {
                remap.push(None);
            }
        }
        self.definitions = kept;
        for call in &mut self.calls {
            call.enclosing = call.enclosing.and_then(|i| remap.get(i).copied().flatten());
        }
        self.calls.retain(|c| is_valid_name(&c.callee));
        self
    }
}

fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed != "<anonymous>"
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Extract definitions, imports and call sites from one file.
///
/// With a syntax tree the language's tree-sitter strategy runs; without one
/// (grammar unavailable, parse failure, or no bundled grammar) the regex
/// scanner for the language family runs instead.
pub fn extract_file(
    path: &str,
    content: &str,
    tree: Option<(&Tree, Grammar)>,
    language: LanguageKind,
) -> FileExtraction {
    let source = content.as_bytes();
    let extraction = match tree {
        Some((tree, Grammar::Python)) => python::extract(tree, source, path),
        Some((tree, grammar @ (Grammar::JavaScript | Grammar::TypeScript | Grammar::Tsx))) => {
            ecmascript::extract(tree, source, path, grammar)
        }
        Some((tree, Grammar::Rust)) => rust::extract(tree, source, path),
        Some((tree, Grammar::Go)) => go::extract(tree, source, path),
        None => fallback::extract(content, path, language.family()),
    };
    extraction.finish()
}

// ---------------------------------------------------------------------------
// Shared tree helpers
// ---------------------------------------------------------------------------

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// 1-based start line.
pub(crate) fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// 1-based end line.
pub(crate) fn end_line(node: Node) -> usize {
    node.end_position().row + 1
}

/// Named children of `node`, in document order.
pub(crate) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// All nodes of the tree in document (pre-)order.
///
/// Iterative so that deeply nested sources cannot overflow the stack.
pub(crate) fn preorder(root: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        let children = named_children(node);
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Ids of every node captured as `capture` by `query`.
pub(crate) fn captured_ids(
    query: &Query,
    capture: &str,
    tree: &Tree,
    source: &[u8],
) -> HashSet<usize> {
    let mut ids = HashSet::new();
    let Some(index) = query.capture_index_for_name(capture) else {
        return ids;
    };
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    while let Some(m) = matches.next() {
        for cap in m.captures {
            if cap.index == index {
                ids.insert(cap.node.id());
            }
        }
    }
    ids
}

/// Compile a query, logging instead of panicking on a grammar mismatch.
pub(crate) fn compile_query(grammar: Grammar, pattern: &str) -> Option<Query> {
    let language = match grammar {
        Grammar::Python => tree_sitter_python::LANGUAGE.into(),
        Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
        Grammar::Go => tree_sitter_go::LANGUAGE.into(),
    };
    match Query::new(&language, pattern) {
        Ok(query) => Some(query),
        Err(err) => {
            tracing::warn!("invalid {} method query: {err}", grammar.name());
            None
        }
    }
}

/// Strip quotes from a string literal's text.
pub(crate) fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Maps a syntax node id to the index of the definition it produced, so call
/// sites can find their innermost enclosing function.
#[derive(Debug, Default)]
pub(crate) struct ScopeMap {
    functions: std::collections::HashMap<usize, usize>,
}

impl ScopeMap {
    pub(crate) fn insert(&mut self, node: Node, def_index: usize) {
        self.functions.insert(node.id(), def_index);
    }

    /// Innermost enclosing function/method definition of `node`.
    pub(crate) fn enclosing(&self, node: Node) -> Option<usize> {
        let mut current = node.parent();
        while let Some(n) = current {
            if let Some(&idx) = self.functions.get(&n.id()) {
                return Some(idx);
            }
            current = n.parent();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_drops_anonymous_and_remaps_enclosing() {
        let mut extraction = FileExtraction::new(ExtractorKind::Regex);
        extraction.definitions.push(Definition::new("", NodeKind::Function, 1));
        extraction.definitions.push(Definition::new("run", NodeKind::Function, 3));
        let mut call = CallSite::simple("helper", 4);
        call.enclosing = Some(1);
        extraction.calls.push(call);
        let mut orphan = CallSite::simple("other", 2);
        orphan.enclosing = Some(0);
        extraction.calls.push(orphan);

        let done = extraction.finish();
        assert_eq!(done.definitions.len(), 1, "anonymous definition must be dropped");
        assert_eq!(done.calls[0].enclosing, Some(0), "index must follow the kept definition");
        assert_eq!(done.calls[1].enclosing, None);
    }

    #[test]
    fn test_import_local_name_prefers_alias() {
        let plain = ImportInfo::new("a.py", "helper", "x", ImportKind::From, 1);
        assert_eq!(plain.local_name(), "helper");
        let aliased = plain.clone().with_alias(Some("h".to_owned()));
        assert_eq!(aliased.local_name(), "h");
        let empty = plain.with_alias(Some(String::new()));
        assert_eq!(empty.local_name(), "helper");
    }

    #[test]
    fn test_dispatch_without_tree_uses_regex() {
        let extraction = extract_file("a.rb", "def hello\nend\n", None, LanguageKind::Ruby);
        assert_eq!(extraction.extractor, ExtractorKind::Regex);
        assert_eq!(extraction.definitions[0].name, "hello");
    }
}
