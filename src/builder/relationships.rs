use std::collections::HashMap;

use crate::graph::KnowledgeGraph;
use crate::graph::edge::{Relationship, RelationshipKind};
use crate::graph::node::{Node, NodeKind, PropertyValue};
use crate::language::LanguageKind;
use crate::parser::{Definition, DefinitionKey};
use crate::registry::{SymbolEntry, SymbolRegistry};

/// Edge counts produced by the type hierarchy pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyStats {
    pub inherits: usize,
    pub implements: usize,
    pub overrides: usize,
}

fn is_type(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::Class | NodeKind::Interface | NodeKind::Enum)
}

fn definition_node(def: &Definition, path: &str, language: LanguageKind) -> Node {
    let mut node = Node::new(def.kind, path, &def.name, def.start_line)
        .with("language", language.display_name());
    if let Some(end) = def.end_line {
        node.set("endLine", end);
    }
    if let Some(parent) = &def.parent_class {
        node.set("parentClass", parent.as_str());
    }
    if !def.decorators.is_empty() {
        node.set("decorators", def.decorators.clone());
    }
    if !def.base_types.is_empty() {
        node.set("baseTypes", def.base_types.clone());
    }
    if let Some(kind) = def.value_kind {
        node.set("valueKind", kind.as_str());
    }
    if let Some(import_path) = &def.import_path {
        node.set("importPath", import_path.as_str());
    }
    node
}

/// Pass 1 for one file: a node per definition, CONTAINS from the file (or
/// from the owning type when it is declared in the same file), DECORATES for
/// decorator applications, and registration in the symbol registry.
///
/// Returns the node id of every definition, parallel to `definitions`.
pub fn add_definitions(
    graph: &mut KnowledgeGraph,
    registry: &mut SymbolRegistry,
    file_id: &str,
    path: &str,
    language: LanguageKind,
    definitions: &[Definition],
) -> Vec<String> {
    let mut ids = Vec::with_capacity(definitions.len());
    for def in definitions {
        let node = definition_node(def, path, language);
        let id = node.id.clone();
        if !graph.contains_node(&id) {
            graph.add_node(node);
            registry.add_definition(SymbolEntry::new(
                &id,
                path,
                &def.name,
                def.kind,
                def.parent_class.as_deref(),
                def.start_line,
                def.end_line,
            ));
        }
        ids.push(id);
    }

    // Types by name, for method ownership.
    let mut types: HashMap<&str, Vec<usize>> = HashMap::new();
    // Decoration targets by key.
    let mut keys: HashMap<DefinitionKey, usize> = HashMap::new();
    for (i, def) in definitions.iter().enumerate() {
        if is_type(def.kind) {
            types.entry(def.name.as_str()).or_default().push(i);
        }
        if def.kind != NodeKind::Decorator {
            keys.entry(def.key()).or_insert(i);
        }
    }

    for (i, def) in definitions.iter().enumerate() {
        let owner = match (&def.parent_class, def.kind) {
            (Some(parent), NodeKind::Method) => owning_type(definitions, types.get(parent.as_str()), def),
            _ => None,
        };
        let container = owner.map_or(file_id, |o| ids[o].as_str());
        graph.connect(RelationshipKind::Contains, container, &ids[i]);

        if def.kind == NodeKind::Decorator
            && let Some(target) = def.decorates.as_ref().and_then(|k| keys.get(k))
        {
            graph.connect(RelationshipKind::Decorates, &ids[i], &ids[*target]);
        }
    }

    ids
}

/// The same-named type declared closest above `def`, else the first one.
fn owning_type(definitions: &[Definition], candidates: Option<&Vec<usize>>, def: &Definition) -> Option<usize> {
    let candidates = candidates?;
    candidates
        .iter()
        .copied()
        .filter(|&i| definitions[i].start_line <= def.start_line)
        .max_by_key(|&i| definitions[i].start_line)
        .or_else(|| candidates.first().copied())
}

/// Bare type name of a written base type: `models.Base` → `Base`,
/// `Repo<T>` → `Repo`, `io::Write` → `Write`.
fn bare_type_name(written: &str) -> &str {
    let without_args = written.split(['<', '[', '(']).next().unwrap_or(written).trim();
    without_args
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(without_args)
}

/// Resolve a base type named from `child`: same file first, then anywhere by
/// bare name ranked by import distance and declaration order.
fn resolve_base(registry: &SymbolRegistry, child_id: &str, child_file: &str, base: &str) -> Option<SymbolEntry> {
    let name = bare_type_name(base);
    if name.is_empty() {
        return None;
    }
    let local = registry
        .find_in_file(child_file, name)
        .into_iter()
        .filter(|e| is_type(e.kind) && e.node_id != child_id)
        .min_by_key(|e| e.seq);
    if local.is_some() {
        return local;
    }
    let global: Vec<SymbolEntry> = registry
        .find_by_bare_name(name)
        .iter()
        .filter(|e| is_type(e.kind) && e.node_id != child_id)
        .cloned()
        .collect();
    registry.rank_candidates(child_file, global).into_iter().next()
}

fn methods_of<'r>(registry: &'r SymbolRegistry, file: &str, owner: &str) -> impl Iterator<Item = &'r SymbolEntry> + use<'r> {
    let owner = owner.to_owned();
    registry
        .definitions_in_file(file)
        .iter()
        .filter(move |e| e.kind == NodeKind::Method && e.parent_class.as_deref() == Some(owner.as_str()))
}

struct TypeInfo {
    id: String,
    kind: NodeKind,
    name: String,
    file: String,
    bases: Vec<String>,
}

fn collect_types(graph: &KnowledgeGraph) -> Vec<TypeInfo> {
    graph
        .nodes()
        .filter(|n| is_type(n.kind))
        .filter_map(|n| {
            Some(TypeInfo {
                id: n.id.clone(),
                kind: n.kind,
                name: n.name().to_owned(),
                file: n.file_path()?.to_owned(),
                bases: n
                    .property("baseTypes")
                    .and_then(PropertyValue::as_list)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Pass 2, after every file: INHERITS, IMPLEMENTS and OVERRIDES from the
/// base types recorded on class, interface and enum nodes.
pub fn link_type_hierarchy(graph: &mut KnowledgeGraph, registry: &SymbolRegistry) -> HierarchyStats {
    let mut stats = HierarchyStats::default();
    let types = collect_types(graph);

    for child in &types {
        for base in &child.bases {
            let Some(target) = resolve_base(registry, &child.id, &child.file, base) else {
                tracing::debug!("unresolved base type {base} of {}", child.id);
                continue;
            };
            if target.kind == NodeKind::Interface && child.kind != NodeKind::Interface {
                if graph.connect(RelationshipKind::Implements, &child.id, &target.node_id) {
                    stats.implements += 1;
                }
                continue;
            }
            if graph.connect(RelationshipKind::Inherits, &child.id, &target.node_id) {
                stats.inherits += 1;
            }
            let base_methods: HashMap<&str, &str> = methods_of(registry, &target.file_path, &target.bare_name)
                .map(|e| (e.bare_name.as_str(), e.node_id.as_str()))
                .collect();
            for method in methods_of(registry, &child.file, &child.name) {
                if let Some(base_method) = base_methods.get(method.bare_name.as_str())
                    && graph.connect(RelationshipKind::Overrides, &method.node_id, base_method)
                {
                    stats.overrides += 1;
                }
            }
        }
    }

    // Classes naming an interface they resolve to implement it, whatever
    // order the hierarchy was walked in.
    for interface in types.iter().filter(|t| t.kind == NodeKind::Interface) {
        for class in types.iter().filter(|t| t.kind != NodeKind::Interface) {
            let names_it = class
                .bases
                .iter()
                .any(|b| bare_type_name(b) == interface.name);
            if !names_it {
                continue;
            }
            let resolves = resolve_base(registry, &class.id, &class.file, &interface.name)
                .is_some_and(|e| e.node_id == interface.id);
            if resolves
                && graph.add_relationship(Relationship::new(
                    RelationshipKind::Implements,
                    &class.id,
                    &interface.id,
                ))
            {
                stats.implements += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::structure::{FileFacts, FileType, add_file, add_project};

    fn setup(path: &str, defs: &[Definition], graph: &mut KnowledgeGraph, registry: &mut SymbolRegistry) -> Vec<String> {
        let project = add_project(graph, "demo");
        let facts = FileFacts::new(Some(LanguageKind::Python), 1, FileType::Source);
        let file = add_file(graph, &project, path, &facts);
        add_definitions(graph, registry, &file, path, LanguageKind::Python, defs)
    }

    fn class(name: &str, line: usize, bases: &[&str]) -> Definition {
        let mut def = Definition::new(name, NodeKind::Class, line);
        def.base_types = bases.iter().map(|b| b.to_string()).collect();
        def
    }

    fn method(name: &str, owner: &str, line: usize) -> Definition {
        let mut def = Definition::new(name, NodeKind::Method, line);
        def.parent_class = Some(owner.to_owned());
        def
    }

    #[test]
    fn test_methods_are_contained_by_their_class() {
        let mut graph = KnowledgeGraph::new();
        let mut registry = SymbolRegistry::new();
        let ids = setup(
            "m.py",
            &[class("A", 1, &[]), method("run", "A", 2), Definition::new("free", NodeKind::Function, 5)],
            &mut graph,
            &mut registry,
        );
        assert!(graph.has_relationship(RelationshipKind::Contains, &ids[0], &ids[1]));
        let file = crate::builder::structure::file_node_id("m.py");
        assert!(graph.has_relationship(RelationshipKind::Contains, &file, &ids[2]));
        assert!(!graph.has_relationship(RelationshipKind::Contains, &file, &ids[1]));
        assert_eq!(registry.len(), 3, "every definition is registered");
    }

    #[test]
    fn test_method_of_foreign_type_is_contained_by_file() {
        let mut graph = KnowledgeGraph::new();
        let mut registry = SymbolRegistry::new();
        let ids = setup("impls.rs", &[method("save", "Store", 3)], &mut graph, &mut registry);
        let file = crate::builder::structure::file_node_id("impls.rs");
        assert!(graph.has_relationship(RelationshipKind::Contains, &file, &ids[0]));
    }

    #[test]
    fn test_decorator_edges() {
        let mut graph = KnowledgeGraph::new();
        let mut registry = SymbolRegistry::new();
        let target = Definition::new("handler", NodeKind::Function, 2);
        let mut deco = Definition::new("route", NodeKind::Decorator, 1);
        deco.decorates = Some(target.key());
        let ids = setup("app.py", &[target, deco], &mut graph, &mut registry);
        assert!(graph.has_relationship(RelationshipKind::Decorates, &ids[1], &ids[0]));
        let file = crate::builder::structure::file_node_id("app.py");
        assert!(graph.has_relationship(RelationshipKind::Contains, &file, &ids[1]));
    }

    #[test]
    fn test_inherits_and_overrides() {
        let mut graph = KnowledgeGraph::new();
        let mut registry = SymbolRegistry::new();
        let ids = setup(
            "models.py",
            &[
                class("Base", 1, &[]),
                method("save", "Base", 2),
                method("load", "Base", 4),
                class("Child", 7, &["Base"]),
                method("save", "Child", 8),
            ],
            &mut graph,
            &mut registry,
        );
        let stats = link_type_hierarchy(&mut graph, &registry);
        assert_eq!(stats, HierarchyStats { inherits: 1, implements: 0, overrides: 1 });
        assert!(graph.has_relationship(RelationshipKind::Inherits, &ids[3], &ids[0]));
        assert!(graph.has_relationship(RelationshipKind::Overrides, &ids[4], &ids[1]));

        let again = link_type_hierarchy(&mut graph, &registry);
        assert_eq!(again, HierarchyStats::default(), "second pass inserts nothing new");
    }

    #[test]
    fn test_interface_base_yields_implements() {
        let mut graph = KnowledgeGraph::new();
        let mut registry = SymbolRegistry::new();
        let mut iface = Definition::new("Store", NodeKind::Interface, 1);
        iface.end_line = Some(3);
        let ids = setup(
            "store.ts",
            &[iface, class("MemoryStore", 5, &["Store"]), class("Cache", 9, &["pkg.Store"])],
            &mut graph,
            &mut registry,
        );
        let stats = link_type_hierarchy(&mut graph, &registry);
        assert_eq!(stats.implements, 2);
        assert_eq!(stats.inherits, 0);
        assert!(graph.has_relationship(RelationshipKind::Implements, &ids[1], &ids[0]));
        assert!(graph.has_relationship(RelationshipKind::Implements, &ids[2], &ids[0]));
    }

    #[test]
    fn test_bare_type_name() {
        assert_eq!(bare_type_name("models.Base"), "Base");
        assert_eq!(bare_type_name("Repo<T>"), "Repo");
        assert_eq!(bare_type_name("io::Write"), "Write");
        assert_eq!(bare_type_name("Generic[T]"), "Generic");
    }
}
