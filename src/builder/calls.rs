use std::collections::{BTreeMap, BTreeSet};

use crate::graph::KnowledgeGraph;
use crate::graph::edge::{Relationship, RelationshipKind};
use crate::graph::node::NodeKind;
use crate::language::LanguageKind;
use crate::parser::{CallKind, CallSite, Definition, ImportInfo, ImportKind};
use crate::registry::{SymbolEntry, SymbolRegistry};

use super::FileRecord;
use super::builtins::is_builtin;
use super::modules::{is_relative, join_member, resolve_module};
use super::structure::{ensure_builtin, ensure_external, ensure_module, file_node_id};

/// Which step of the precedence chain resolved a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resolution {
    Builtin,
    Import,
    Local,
    MethodName,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Builtin => "builtin",
            Resolution::Import => "import",
            Resolution::Local => "local",
            Resolution::MethodName => "method-name",
        }
    }
}

/// A resolved call target.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    node_id: String,
    resolution: Resolution,
    confidence: f64,
}

impl Target {
    fn new(node_id: impl Into<String>, resolution: Resolution, confidence: f64) -> Self {
        Self {
            node_id: node_id.into(),
            resolution,
            confidence,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CallStats {
    /// Distinct CALLS edges added.
    pub resolved: usize,
    pub unresolved: usize,
    pub by_resolution: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub internal: usize,
    pub external: usize,
    pub unresolved: usize,
}

const SELF_RECEIVERS: &[&str] = &["self", "this", "cls", "Self"];

/// Kinds a call can land on.
fn is_callable(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Function | NodeKind::Method | NodeKind::Class | NodeKind::Enum
    )
}

/// Shared lookup state for one resolution pass.
struct Resolver<'a> {
    registry: &'a SymbolRegistry,
    files: &'a BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    fn resolve(&self, graph: &mut KnowledgeGraph, record: &FileRecord, call: &CallSite) -> Option<Target> {
        let caller = call
            .enclosing
            .and_then(|i| record.extraction.definitions.get(i));
        self.builtin(graph, record.language, call)
            .or_else(|| self.via_import(graph, record, call))
            .or_else(|| self.local(graph, record, call, caller))
            .or_else(|| self.method_by_name(record, call))
    }

    // -----------------------------------------------------------------------
    // 1. Builtins
    // -----------------------------------------------------------------------

    fn builtin(&self, graph: &mut KnowledgeGraph, language: LanguageKind, call: &CallSite) -> Option<Target> {
        match (call.kind, call.receiver.as_deref()) {
            (CallKind::Simple, _) if is_builtin(language, &call.callee) => Some(Target::new(
                ensure_builtin(graph, &call.callee),
                Resolution::Builtin,
                1.0,
            )),
            // `console.log`, `JSON.parse`, `str.join`
            (CallKind::Attribute, Some(receiver)) if is_builtin(language, receiver) => Some(Target::new(
                ensure_builtin(graph, &format!("{receiver}.{}", call.callee)),
                Resolution::Builtin,
                1.0,
            )),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // 2. Imports
    // -----------------------------------------------------------------------

    fn via_import(&self, graph: &mut KnowledgeGraph, record: &FileRecord, call: &CallSite) -> Option<Target> {
        let imports = &record.extraction.imports;
        let binding = match (call.kind, call.receiver.as_deref()) {
            (CallKind::Simple, _) => imports
                .iter()
                .find(|i| i.import_kind != ImportKind::Wildcard && i.local_name() == call.callee),
            (CallKind::Attribute, Some(receiver)) => imports
                .iter()
                .find(|i| i.import_kind != ImportKind::Wildcard && receiver_matches(receiver, i.local_name())),
            (CallKind::Attribute, None) => None,
        };

        let Some(binding) = binding else {
            return self.via_wildcard(record, call);
        };

        let (name, owner, specs) = import_lookup(record.language, binding, call);
        let mut resolved_any = false;
        for spec in &specs {
            let targets = resolve_module(record.language, &record.path, spec, self.files);
            resolved_any |= !targets.is_empty();
            for file in &targets {
                if let Some(found) = pick_in_file(self.registry, file, name, owner) {
                    return Some(Target::new(found.node_id, Resolution::Import, 0.9));
                }
            }
        }
        if resolved_any || is_relative(record.language, &binding.from_module) {
            // Internal module without that name; later steps may still find it.
            return None;
        }
        Some(Target::new(
            ensure_external(graph, &binding.from_module, name),
            Resolution::Import,
            0.9,
        ))
    }

    fn via_wildcard(&self, record: &FileRecord, call: &CallSite) -> Option<Target> {
        if call.kind != CallKind::Simple {
            return None;
        }
        record
            .extraction
            .imports
            .iter()
            .filter(|i| i.import_kind == ImportKind::Wildcard)
            .flat_map(|i| resolve_module(record.language, &record.path, &i.from_module, self.files))
            .find_map(|file| pick_in_file(self.registry, &file, &call.callee, None))
            .map(|found| Target::new(found.node_id, Resolution::Import, 0.9))
    }

    // -----------------------------------------------------------------------
    // 3. Same file
    // -----------------------------------------------------------------------

    fn local(
        &self,
        graph: &KnowledgeGraph,
        record: &FileRecord,
        call: &CallSite,
        caller: Option<&Definition>,
    ) -> Option<Target> {
        let caller_class = caller.and_then(|d| d.parent_class.as_deref());
        match (call.kind, call.receiver.as_deref()) {
            (CallKind::Attribute, Some(receiver)) if SELF_RECEIVERS.contains(&receiver) => {
                let class = caller_class?;
                if let Some(found) = self.method_in(&record.path, class, &call.callee) {
                    return Some(Target::new(found.node_id, Resolution::Local, 0.95));
                }
                self.inherited_method(graph, &record.path, class, &call.callee)
                    .map(|found| Target::new(found.node_id, Resolution::Local, 0.8))
            }
            (CallKind::Attribute, Some(receiver)) => {
                // `Type.method()` / `Type::method()` on a type of this file.
                let owner = receiver.rsplit(['.', ':']).next().unwrap_or(receiver);
                self.method_in(&record.path, owner, &call.callee)
                    .map(|found| Target::new(found.node_id, Resolution::Local, 0.95))
            }
            (CallKind::Attribute, None) => None,
            (CallKind::Simple, _) => self.local_simple(record, call, caller, caller_class),
        }
    }

    fn local_simple(
        &self,
        record: &FileRecord,
        call: &CallSite,
        caller: Option<&Definition>,
        caller_class: Option<&str>,
    ) -> Option<Target> {
        let candidates: Vec<SymbolEntry> = self
            .registry
            .find_in_file(&record.path, &call.callee)
            .into_iter()
            .filter(|e| match e.kind {
                NodeKind::Function | NodeKind::Class | NodeKind::Enum => true,
                // Implicit receiver (Ruby, Java-like fallbacks).
                NodeKind::Method => caller_class.is_some() && e.parent_class.as_deref() == caller_class,
                _ => false,
            })
            .collect();

        match candidates.len() {
            0 => self.same_package(record, call),
            1 => candidates
                .into_iter()
                .next()
                .map(|e| Target::new(e.node_id, Resolution::Local, 0.95)),
            _ => {
                let nested = caller.and_then(|def| {
                    let end = def.end_line?;
                    candidates
                        .iter()
                        .filter(|e| e.start_line > def.start_line && e.start_line <= end)
                        .min_by_key(|e| e.seq)
                        .map(|e| e.node_id.clone())
                });
                match nested {
                    Some(id) => Some(Target::new(id, Resolution::Local, 0.95)),
                    None => candidates
                        .into_iter()
                        .min_by_key(|e| e.seq)
                        .map(|e| Target::new(e.node_id, Resolution::Local, 0.8)),
                }
            }
        }
    }

    /// Go functions are visible across every file of their package directory.
    fn same_package(&self, record: &FileRecord, call: &CallSite) -> Option<Target> {
        if record.language != LanguageKind::Go {
            return None;
        }
        let dir = record.path.rsplit_once('/').map_or("", |(d, _)| d);
        self.registry
            .find_by_bare_name(&call.callee)
            .iter()
            .filter(|e| e.kind == NodeKind::Function && e.file_path != record.path)
            .filter(|e| e.file_path.rsplit_once('/').map_or("", |(d, _)| d) == dir)
            .min_by_key(|e| e.seq)
            .map(|e| Target::new(e.node_id.clone(), Resolution::Local, 0.8))
    }

    fn method_in(&self, file: &str, class: &str, name: &str) -> Option<SymbolEntry> {
        self.registry
            .find_in_file(file, name)
            .into_iter()
            .filter(|e| e.kind == NodeKind::Method && e.parent_class.as_deref() == Some(class))
            .min_by_key(|e| e.seq)
    }

    /// A method of the nearest base class of `class`, following INHERITS.
    fn inherited_method(&self, graph: &KnowledgeGraph, file: &str, class: &str, name: &str) -> Option<SymbolEntry> {
        let class_entry = self
            .registry
            .find_in_file(file, class)
            .into_iter()
            .find(|e| matches!(e.kind, NodeKind::Class | NodeKind::Enum))?;
        graph
            .outgoing(&class_entry.node_id)
            .filter(|(rel, _)| rel.kind == RelationshipKind::Inherits)
            .find_map(|(_, base)| {
                let base_file = base.file_path()?;
                self.method_in(base_file, base.name(), name)
            })
    }

    // -----------------------------------------------------------------------
    // 4. Any method with that name
    // -----------------------------------------------------------------------

    fn method_by_name(&self, record: &FileRecord, call: &CallSite) -> Option<Target> {
        if call.kind != CallKind::Attribute {
            return None;
        }
        let methods: Vec<SymbolEntry> = self
            .registry
            .find_by_bare_name(&call.callee)
            .iter()
            .filter(|e| e.kind == NodeKind::Method)
            .cloned()
            .collect();
        if let Some(same_file) = methods
            .iter()
            .filter(|e| e.file_path == record.path)
            .min_by_key(|e| e.seq)
        {
            return Some(Target::new(same_file.node_id.clone(), Resolution::MethodName, 0.6));
        }
        self.registry
            .rank_candidates(&record.path, methods)
            .into_iter()
            .next()
            .map(|e| Target::new(e.node_id, Resolution::MethodName, 0.4))
    }
}

/// `np.linalg.norm` is reached through `np`; `os.path.join` through `os.path`.
fn receiver_matches(receiver: &str, local: &str) -> bool {
    receiver == local
        || receiver
            .strip_prefix(local)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with("::"))
}

/// `(name to look up, owning type preference, module specifiers to try)` for
/// a call reached through `binding`.
fn import_lookup<'c>(
    language: LanguageKind,
    binding: &'c ImportInfo,
    call: &'c CallSite,
) -> (&'c str, Option<&'c str>, Vec<String>) {
    match call.kind {
        CallKind::Simple if binding.import_kind.binds_module() => {
            (call.callee.as_str(), None, vec![binding.from_module.clone()])
        }
        // `from x import helper as h; h()` looks up `helper`.
        CallKind::Simple => (
            binding.imported_name.as_str(),
            None,
            vec![binding.from_module.clone()],
        ),
        CallKind::Attribute if binding.import_kind.binds_module() => {
            (call.callee.as_str(), None, vec![binding.from_module.clone()])
        }
        // The binding is a member: a submodule, or a type whose method is called.
        CallKind::Attribute => (
            call.callee.as_str(),
            Some(binding.imported_name.as_str()),
            vec![
                join_member(language, &binding.from_module, &binding.imported_name),
                binding.from_module.clone(),
            ],
        ),
    }
}

/// Callable definition named `name` in `file`; methods of `owner` first,
/// then free definitions, then any other match.
fn pick_in_file(registry: &SymbolRegistry, file: &str, name: &str, owner: Option<&str>) -> Option<SymbolEntry> {
    registry
        .find_in_file(file, name)
        .into_iter()
        .filter(|e| is_callable(e.kind))
        .min_by_key(|e| {
            let rank = match (owner, e.parent_class.as_deref()) {
                (Some(o), Some(p)) if o == p => 0,
                (_, None) => 1,
                _ => 2,
            };
            (rank, e.seq)
        })
}

/// Resolve every call site and emit CALLS edges tagged with `resolution`,
/// `confidence` and `line`.
///
/// The caller is the enclosing function or method node, else the File node.
/// Calls that resolve nowhere are logged at debug level and produce no edge.
pub fn resolve_calls(
    graph: &mut KnowledgeGraph,
    registry: &SymbolRegistry,
    records: &[FileRecord],
    files: &BTreeSet<String>,
) -> CallStats {
    let resolver = Resolver { registry, files };
    let mut stats = CallStats::default();

    for record in records {
        for call in &record.extraction.calls {
            let caller_id = call
                .enclosing
                .and_then(|i| record.node_ids.get(i))
                .unwrap_or(&record.file_id)
                .clone();
            match resolver.resolve(graph, record, call) {
                Some(target) => {
                    let inserted = graph.add_relationship(
                        Relationship::new(RelationshipKind::Calls, &caller_id, &target.node_id)
                            .with("resolution", target.resolution.as_str())
                            .with("confidence", target.confidence)
                            .with("line", call.line),
                    );
                    if inserted {
                        stats.resolved += 1;
                        *stats.by_resolution.entry(target.resolution.as_str()).or_default() += 1;
                    }
                }
                None => {
                    tracing::debug!(
                        "unresolved call {}{} at {}:{}",
                        call.receiver.as_deref().map(|r| format!("{r}.")).unwrap_or_default(),
                        call.callee,
                        record.path,
                        call.line
                    );
                    stats.unresolved += 1;
                }
            }
        }
    }

    stats
}

/// IMPORTS edges: File → File for imports of indexed files, File → Module
/// for external modules.
pub fn link_imports(graph: &mut KnowledgeGraph, records: &[FileRecord], files: &BTreeSet<String>) -> ImportStats {
    let mut stats = ImportStats::default();

    for record in records {
        for import in &record.extraction.imports {
            let mut specs = Vec::with_capacity(2);
            if matches!(import.import_kind, ImportKind::From | ImportKind::Named | ImportKind::Use) {
                specs.push(join_member(record.language, &import.from_module, &import.imported_name));
            }
            specs.push(import.from_module.clone());

            let targets = specs
                .iter()
                .map(|s| resolve_module(record.language, &record.path, s, files))
                .find(|t| !t.is_empty())
                .unwrap_or_default();

            if !targets.is_empty() {
                let take = if record.language == LanguageKind::Go { targets.len() } else { 1 };
                for target in targets.iter().take(take).filter(|t| **t != record.path) {
                    let rel = Relationship::new(RelationshipKind::Imports, &record.file_id, &file_node_id(target))
                        .with("specifier", import.from_module.as_str());
                    graph.add_relationship(rel);
                }
                stats.internal += 1;
            } else if is_relative(record.language, &import.from_module) {
                tracing::debug!("unresolved import {} in {}", import.from_module, record.path);
                stats.unresolved += 1;
            } else {
                let module_id = ensure_module(graph, &import.from_module);
                let rel = Relationship::new(RelationshipKind::Imports, &record.file_id, &module_id)
                    .with("specifier", import.from_module.as_str());
                graph.add_relationship(rel);
                stats.external += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_matching() {
        assert!(receiver_matches("np", "np"));
        assert!(receiver_matches("np.linalg", "np"));
        assert!(receiver_matches("util::inner", "util"));
        assert!(!receiver_matches("numpy", "np"));
        assert!(!receiver_matches("npx", "np"));
    }

    #[test]
    fn test_import_lookup_uses_exported_name() {
        let binding = ImportInfo::new("a/main.py", "helper", "x", ImportKind::From, 1)
            .with_alias(Some("h".to_owned()));
        let call = CallSite::simple("h", 3);
        let (name, owner, specs) = import_lookup(LanguageKind::Python, &binding, &call);
        assert_eq!(name, "helper");
        assert_eq!(owner, None);
        assert_eq!(specs, vec!["x".to_owned()]);

        let member = ImportInfo::new("src/lib.rs", "Store", "crate::store", ImportKind::Use, 1);
        let call = CallSite::attribute("new", "Store", 4);
        let (name, owner, specs) = import_lookup(LanguageKind::Rust, &member, &call);
        assert_eq!(name, "new");
        assert_eq!(owner, Some("Store"));
        assert_eq!(specs[0], "crate::store::Store");
    }
}
