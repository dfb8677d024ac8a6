use crate::graph::KnowledgeGraph;
use crate::graph::edge::RelationshipKind;
use crate::graph::node::{Node, NodeKind};
use crate::language::LanguageKind;
use crate::parser::ExtractorKind;

/// Name of the module node that owns every builtin placeholder.
pub const BUILTINS_MODULE: &str = "builtins";

/// Whether a File node holds parseable source or a recognised config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Source,
    Config,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Source => "source",
            FileType::Config => "config",
        }
    }
}

/// Facts recorded on a File node.
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub language: Option<LanguageKind>,
    pub size: usize,
    pub file_type: FileType,
    pub extractor: Option<ExtractorKind>,
    pub generated: bool,
    pub parse_error: bool,
    pub syntax_errors: bool,
}

impl FileFacts {
    pub fn new(language: Option<LanguageKind>, size: usize, file_type: FileType) -> Self {
        Self {
            language,
            size,
            file_type,
            extractor: None,
            generated: false,
            parse_error: false,
            syntax_errors: false,
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Id of the File node for `path`.
pub fn file_node_id(path: &str) -> String {
    Node::node_id(NodeKind::File, path, file_name(path), 0)
}

/// Add the Project node. Returns its id.
pub fn add_project(graph: &mut KnowledgeGraph, name: &str) -> String {
    let node = Node::new(NodeKind::Project, "", name, 0);
    let id = node.id.clone();
    graph.add_node(node);
    id
}

/// Add the Folder chain above `path`, each folder contained by its parent and
/// the outermost by the project. Returns the id of the innermost container.
fn add_folders(graph: &mut KnowledgeGraph, project_id: &str, path: &str) -> String {
    let mut parent = project_id.to_owned();
    let Some((dir, _)) = path.rsplit_once('/') else {
        return parent;
    };
    let mut prefix = String::new();
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        let folder = Node::new(NodeKind::Folder, &prefix, segment, 0);
        let id = folder.id.clone();
        graph.add_node(folder);
        graph.connect(RelationshipKind::Contains, &parent, &id);
        parent = id;
    }
    parent
}

/// Add the File node for `path` under its folder chain. Returns its id.
pub fn add_file(graph: &mut KnowledgeGraph, project_id: &str, path: &str, facts: &FileFacts) -> String {
    let container = add_folders(graph, project_id, path);
    let mut node = Node::new(NodeKind::File, path, file_name(path), 0)
        .with("size", facts.size)
        .with("fileType", facts.file_type.as_str());
    if let Some(language) = facts.language {
        node.set("language", language.display_name());
    }
    if let Some(extractor) = facts.extractor {
        node.set("extractor", extractor.as_str());
    }
    for (flag, set) in [
        ("generated", facts.generated),
        ("parseError", facts.parse_error),
        ("syntaxErrors", facts.syntax_errors),
    ] {
        if set {
            node.set(flag, true);
        }
    }
    let id = node.id.clone();
    graph.add_node(node);
    graph.connect(RelationshipKind::Contains, &container, &id);
    id
}

/// Reuse or create the Module node for a non-indexed module.
pub fn ensure_module(graph: &mut KnowledgeGraph, module: &str) -> String {
    let mut node = Node::new(NodeKind::Module, "", module, 0);
    if module == BUILTINS_MODULE {
        node.set("isBuiltin", true);
    } else {
        node.set("isExternal", true);
    }
    let id = node.id.clone();
    graph.add_node(node);
    id
}

fn ensure_placeholder(graph: &mut KnowledgeGraph, module: &str, name: &str) -> String {
    let module_id = ensure_module(graph, module);
    let mut node = Node::new(NodeKind::Function, "", name, 0).with("sourceModule", module);
    node.id = Node::node_id(NodeKind::Function, &format!("<{module}>"), name, 0);
    if module == BUILTINS_MODULE {
        node.set("isBuiltin", true);
    } else {
        node.set("isExternal", true);
    }
    let id = node.id.clone();
    graph.add_node(node);
    graph.connect(RelationshipKind::Contains, &module_id, &id);
    id
}

/// Placeholder Function for a builtin, contained in the `builtins` module.
pub fn ensure_builtin(graph: &mut KnowledgeGraph, name: &str) -> String {
    ensure_placeholder(graph, BUILTINS_MODULE, name)
}

/// Placeholder Function for a member of an external module.
pub fn ensure_external(graph: &mut KnowledgeGraph, module: &str, name: &str) -> String {
    ensure_placeholder(graph, module, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_chain_is_shared() {
        let mut graph = KnowledgeGraph::new();
        let project = add_project(&mut graph, "demo");
        let facts = FileFacts::new(Some(LanguageKind::Python), 10, FileType::Source);
        let x = add_file(&mut graph, &project, "a/b/x.py", &facts);
        add_file(&mut graph, &project, "a/b/y.py", &facts);
        add_file(&mut graph, &project, "top.py", &facts);

        assert_eq!(graph.count_nodes(NodeKind::Folder), 2, "a and a/b are created once");
        assert_eq!(x, file_node_id("a/b/x.py"));
        let parents: Vec<_> = graph.incoming(&x).map(|(_, n)| n.name().to_owned()).collect();
        assert_eq!(parents, vec!["b".to_owned()]);
        let top_parent: Vec<_> = graph
            .incoming(&file_node_id("top.py"))
            .map(|(_, n)| n.kind)
            .collect();
        assert_eq!(top_parent, vec![NodeKind::Project]);
        let file = graph.node(&x).unwrap();
        assert_eq!(file.property("language").and_then(|v| v.as_str()), Some("python"));
        assert!(!file.flag("generated"));
    }

    #[test]
    fn test_placeholders_are_reused() {
        let mut graph = KnowledgeGraph::new();
        let a = ensure_builtin(&mut graph, "len");
        let b = ensure_builtin(&mut graph, "len");
        assert_eq!(a, b);
        let ext = ensure_external(&mut graph, "numpy", "len");
        assert_ne!(a, ext, "an external `len` is not the builtin one");

        let node = graph.node(&ext).unwrap();
        assert!(node.flag("isExternal"));
        assert_eq!(node.property("sourceModule").and_then(|v| v.as_str()), Some("numpy"));
        assert_eq!(graph.count_nodes(NodeKind::Module), 2);
        assert_eq!(graph.count_relationships(RelationshipKind::Contains), 2);
    }
}
